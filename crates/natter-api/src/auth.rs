use std::sync::{Arc, OnceLock};

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Duration;
use tracing::{debug, info, warn};

use natter_db::Database;
use natter_db::models::InsertOutcome;
use natter_types::api::{LoginRequest, LoginResponse, SignupRequest, WhoAmIResponse};

use crate::cities::CityDirectory;
use crate::error::{ApiError, AuthError, run_blocking};
use crate::messages::ChatSequencer;
use crate::middleware::AccessGate;
use crate::password::PasswordHasher;
use crate::session::{SessionManager, token_from_headers};

/// Usernames and passwords must be longer than this many characters.
pub const MIN_CREDENTIAL_CHARS: usize = 2;

/// Verified against when the username is unknown, so that path costs the
/// same hashing work as a wrong password.
const DUMMY_PASSWORD: &str = "natter-dummy-password";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub auth: AuthService,
    pub gate: AccessGate,
    pub chat: ChatSequencer,
    pub cities: CityDirectory,
    pub cookie_secure: bool,
}

impl AppStateInner {
    pub fn new(
        db: Arc<Database>,
        hasher: Arc<dyn PasswordHasher>,
        session_ttl: Duration,
        cookie_secure: bool,
    ) -> AppState {
        let sessions = SessionManager::new(db.clone(), session_ttl);
        Arc::new(Self {
            auth: AuthService::new(db.clone(), hasher, sessions.clone()),
            gate: AccessGate::new(sessions),
            chat: ChatSequencer::new(db.clone()),
            cities: CityDirectory::new(db),
            cookie_secure,
        })
    }
}

/// Signup, login and logout. Runs outside the access gate since these are
/// the operations that establish and end sessions.
pub struct AuthService {
    db: Arc<Database>,
    hasher: Arc<dyn PasswordHasher>,
    sessions: SessionManager,
    dummy_hash: OnceLock<Option<String>>,
}

impl AuthService {
    pub fn new(db: Arc<Database>, hasher: Arc<dyn PasswordHasher>, sessions: SessionManager) -> Self {
        Self {
            db,
            hasher,
            sessions,
            dummy_hash: OnceLock::new(),
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn signup(&self, username: &str, password: &str) -> Result<(), AuthError> {
        validate_credentials(username, password)?;

        let password_hash = self.hasher.hash(password).map_err(AuthError::StorageFailure)?;

        // The unique constraint decides, so two racing signups cannot both win.
        match self
            .db
            .insert_user(username, &password_hash)
            .map_err(AuthError::StorageFailure)?
        {
            InsertOutcome::Inserted => {
                info!("User '{}' signed up", username);
                Ok(())
            }
            InsertOutcome::Duplicate => Err(AuthError::AlreadyExists),
        }
    }

    /// Verify credentials and bind a session, returning its token.
    pub fn login(
        &self,
        username: &str,
        password: &str,
        presented: Option<&str>,
    ) -> Result<String, AuthError> {
        let Some(user) = self
            .db
            .get_user_by_username(username)
            .map_err(AuthError::StorageFailure)?
        else {
            self.verify_against_dummy(password);
            return Err(AuthError::NotFound);
        };

        if !self
            .hasher
            .verify(password, &user.password)
            .map_err(AuthError::StorageFailure)?
        {
            warn!("Failed login for '{}'", username);
            return Err(AuthError::BadCredential);
        }

        let token = self
            .sessions
            .bind(presented, &user.username)
            .map_err(AuthError::StorageFailure)?;

        info!("User '{}' logged in", user.username);
        Ok(token)
    }

    fn verify_against_dummy(&self, password: &str) {
        let dummy = self
            .dummy_hash
            .get_or_init(|| self.hasher.hash(DUMMY_PASSWORD).ok());
        if let Some(dummy) = dummy {
            let _ = self.hasher.verify(password, dummy);
        }
    }

    pub fn logout(&self, token: Option<&str>) -> Result<(), AuthError> {
        let token = token.ok_or(AuthError::NoSession)?;
        if self.sessions.invalidate(token).map_err(AuthError::StorageFailure)? {
            Ok(())
        } else {
            Err(AuthError::NoSession)
        }
    }
}

fn validate_credentials(username: &str, password: &str) -> Result<(), AuthError> {
    if username.chars().count() <= MIN_CREDENTIAL_CHARS
        || password.chars().count() <= MIN_CREDENTIAL_CHARS
    {
        return Err(AuthError::InvalidInput);
    }
    Ok(())
}

// -- Handlers --

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(move || Ok(state.auth.signup(&req.username, &req.password)?)).await?;
    Ok(StatusCode::CREATED)
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let presented = token_from_headers(&headers);
    let cookie_secure = state.cookie_secure;

    let svc = state.clone();
    let username = req.username.clone();
    let token = run_blocking(move || {
        Ok(svc.auth.login(&req.username, &req.password, presented.as_deref())?)
    })
    .await?;

    let cookie = state.auth.sessions().cookie(token.clone(), cookie_secure);
    Ok((jar.add(cookie), Json(LoginResponse { username, token })))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = token_from_headers(&headers);
    let outcome = run_blocking(move || match state.auth.logout(token.as_deref()) {
        Ok(()) => Ok(true),
        Err(AuthError::NoSession) => Ok(false),
        Err(e) => Err(e.into()),
    })
    .await?;

    // Logging out without a session is not an error for the caller.
    if !outcome {
        debug!("logout without an active session");
    }
    Ok((StatusCode::OK, "logged out"))
}

pub async fn whoami(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = token_from_headers(&headers);
    let username = run_blocking(move || state.gate.whoami(token.as_deref())).await?;
    Ok(Json(WhoAmIResponse { username }))
}
