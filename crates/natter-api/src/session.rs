use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use natter_db::Database;
use natter_db::models::SessionRow;
use natter_types::models::SessionState;

pub const SESSION_COOKIE: &str = "natter_session";

/// Fourteen days, the lifetime of a session since its last login or logout.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 14 * 24 * 60 * 60;

/// Session state keyed by opaque token, stored with a TTL.
///
/// State machine per token:
/// `Unset -> login -> Authenticated(user) -> logout -> LoggedOut`, and a new
/// login on a `LoggedOut` token re-enters `Authenticated`. Expiry returns any
/// state to `Unset`.
#[derive(Clone)]
pub struct SessionManager {
    db: Arc<Database>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(db: Arc<Database>, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current state of `token`. Pure read: never creates a session.
    pub fn get(&self, token: &str) -> Result<SessionState> {
        let now = Utc::now().timestamp();
        match self.db.get_session(token, now)? {
            Some(row) => state_from_row(row),
            None => Ok(SessionState::Unset),
        }
    }

    /// Bind a session to `username` and return its token.
    ///
    /// A presented token is reused only if it is logged out or already
    /// belongs to `username`. Unknown tokens and live sessions of other
    /// users get a freshly minted token instead.
    pub fn bind(&self, presented: Option<&str>, username: &str) -> Result<String> {
        let reusable = match presented {
            Some(token) => match self.get(token)? {
                SessionState::LoggedOut => true,
                SessionState::Authenticated(owner) => owner == username,
                SessionState::Unset => false,
            },
            None => false,
        };
        let token = match presented {
            Some(token) if reusable => token.to_string(),
            _ => generate_token(),
        };

        let now = Utc::now();
        self.db.upsert_authenticated_session(
            &token,
            username,
            now.timestamp(),
            self.expiry_from(now)?,
        )?;
        Ok(token)
    }

    /// Move a live session to `LoggedOut`. Returns false if there was none.
    pub fn invalidate(&self, token: &str) -> Result<bool> {
        let now = Utc::now();
        self.db
            .mark_session_logged_out(token, now.timestamp(), self.expiry_from(now)?)
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> Result<i64> {
        now.checked_add_signed(self.ttl)
            .map(|t| t.timestamp())
            .ok_or_else(|| anyhow!("session ttl {} overflows the clock", self.ttl))
    }

    /// Drop expired rows. Reads already treat them as unset; this only
    /// reclaims space.
    pub fn sweep_expired(&self) -> Result<usize> {
        self.db.delete_expired_sessions(Utc::now().timestamp())
    }

    /// Cookie carrying `token` back to the client.
    pub fn cookie(&self, token: String, secure: bool) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(secure)
            .build()
    }
}

fn state_from_row(row: SessionRow) -> Result<SessionState> {
    match (row.state.as_str(), row.username) {
        ("authenticated", Some(username)) => Ok(SessionState::Authenticated(username)),
        ("logged_out", None) => Ok(SessionState::LoggedOut),
        (state, _) => bail!("corrupt session row for state '{}'", state),
    }
}

/// 256 random bits, URL-safe base64.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Read the session token a request carries: the session cookie, or an
/// `Authorization: Bearer` header for non-browser clients.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    let bearer = headers.typed_get::<Authorization<Bearer>>()?;
    debug!("session token taken from bearer header");
    Some(bearer.token().to_string())
}
