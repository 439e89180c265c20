use serde::{Deserialize, Serialize};

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub username: String,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WhoAmIResponse {
    pub username: String,
}

// -- Chat --

#[derive(Debug, Deserialize)]
pub struct PostChatRequest {
    pub contents: String,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostChatResponse {
    pub id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: u64,
    pub author: String,
    pub contents: String,
    pub time: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ThreadQuery {
    /// Cursor: only messages with an id greater than this are returned.
    pub after: Option<u64>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
