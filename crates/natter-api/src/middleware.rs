use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use natter_types::models::{Identity, SessionState};

use crate::auth::AppState;
use crate::error::{ApiError, run_blocking};
use crate::session::{SessionManager, token_from_headers};

/// Policy evaluated in front of every protected operation: only an
/// `Authenticated` session gets through. `Unset` and `LoggedOut` are both
/// rejected with `Forbidden` before the operation runs.
#[derive(Clone)]
pub struct AccessGate {
    sessions: SessionManager,
}

impl AccessGate {
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }

    pub fn resolve(&self, token: Option<&str>) -> Result<Identity, ApiError> {
        let Some(token) = token else {
            debug!("gate: request carries no session token");
            return Err(ApiError::Forbidden);
        };

        match self.sessions.get(token).map_err(ApiError::StorageFailure)? {
            SessionState::Authenticated(username) => Ok(Identity { username }),
            state @ (SessionState::Unset | SessionState::LoggedOut) => {
                debug!("gate: rejected session in state {:?}", state);
                Err(ApiError::Forbidden)
            }
        }
    }

    /// Run `op` with the resolved identity, or fail without running it.
    pub fn wrap<T, F>(&self, token: Option<&str>, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(Identity) -> Result<T, ApiError>,
    {
        let identity = self.resolve(token)?;
        op(identity)
    }

    /// Username behind `token`, under the same check as every gated call.
    pub fn whoami(&self, token: Option<&str>) -> Result<String, ApiError> {
        self.wrap(token, |identity| Ok(identity.username))
    }
}

/// Resolve the session and insert the caller's `Identity` for the handler.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = token_from_headers(req.headers());
    let gate = state.gate.clone();

    let identity = run_blocking(move || gate.resolve(token.as_deref())).await?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
