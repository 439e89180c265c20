use anyhow::{Result, anyhow};
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, Version,
    password_hash::{self, PasswordHasher as _, PasswordVerifier as _, SaltString, rand_core::OsRng},
};

/// One-way password hashing.
pub trait PasswordHasher: Send + Sync {
    /// Hash `password` into a self-describing string safe to store.
    fn hash(&self, password: &str) -> Result<String>;

    /// Check `password` against a stored hash. A mismatch is `Ok(false)`;
    /// `Err` means the stored hash itself could not be used.
    fn verify(&self, password: &str, stored: &str) -> Result<bool>;
}

/// Argon2id, stored in PHC string format.
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("argon2 hash error: {}", e))?;
        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, stored: &str) -> Result<bool> {
        let parsed = PasswordHash::new(stored).map_err(|e| anyhow!("corrupt password hash: {}", e))?;

        // Parameters come from the stored hash; the digest comparison is constant-time.
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(anyhow!("argon2 verify error: {}", e)),
        }
    }
}
