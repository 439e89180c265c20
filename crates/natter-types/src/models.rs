use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message. Append-only: once stored it is never edited or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub author: String,
    pub body: String,
    /// Timestamp the client attached when posting, if any.
    pub client_time: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A city record. Every column but the id may be missing in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<i64>,
}

/// Server-held state behind a session token.
///
/// `LoggedOut` is its own variant rather than a reserved username, so no
/// real account can ever be mistaken for an invalidated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No live session: never created, or expired.
    Unset,
    Authenticated(String),
    LoggedOut,
}

impl SessionState {
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Authenticated(username) => Some(username),
            Self::Unset | Self::LoggedOut => None,
        }
    }
}

/// The caller identity resolved by the access gate and handed to protected
/// operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
}
