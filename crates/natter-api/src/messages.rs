use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use anyhow::anyhow;
use tracing::debug;

use natter_db::Database;
use natter_db::models::MessageRow;
use natter_types::api::{MessageResponse, PostChatRequest, PostChatResponse, ThreadQuery};
use natter_types::models::{Identity, Message};

use crate::auth::AppState;
use crate::error::{ApiError, ChatError, run_blocking};

/// Upper bound on a message body, in characters.
pub const MAX_MESSAGE_CHARS: usize = 200;

/// Largest page of the thread returned in one read.
pub const MAX_PAGE: u32 = 200;

/// Appends messages to the log and reads them back in id order.
///
/// Id allocation is left to the store, which hands out ids from its own
/// sequence inside the insert. There is no read-max-then-insert step, so
/// concurrent posts cannot derive the same id.
#[derive(Clone)]
pub struct ChatSequencer {
    db: Arc<Database>,
}

impl ChatSequencer {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn post(
        &self,
        identity: &Identity,
        body: &str,
        client_time: Option<&str>,
    ) -> Result<u64, ChatError> {
        validate_body(body)?;

        let id = self
            .db
            .append_message(&identity.username, body, client_time)
            .map_err(ChatError::StorageFailure)?;

        debug!("Message {} posted by '{}'", id, identity.username);
        Ok(id)
    }

    pub fn get_message(&self, id: u64) -> Result<Message, ChatError> {
        self.db
            .get_message(id)
            .map_err(ChatError::StorageFailure)?
            .ok_or(ChatError::NotFound)
            .and_then(message_from_row)
    }

    /// Up to `limit` messages after the `after` cursor, ascending by id.
    pub fn thread_page(&self, after: Option<u64>, limit: u32) -> Result<Vec<Message>, ChatError> {
        let rows = self
            .db
            .get_messages_after(after.unwrap_or(0), limit.clamp(1, MAX_PAGE))
            .map_err(ChatError::StorageFailure)?;
        rows.into_iter().map(message_from_row).collect()
    }

    /// The whole thread, ascending by id. Each call starts over from the
    /// first message.
    pub fn thread(&self) -> Result<Vec<Message>, ChatError> {
        let mut all = Vec::new();
        let mut cursor = None;
        loop {
            let page = self.thread_page(cursor, MAX_PAGE)?;
            let done = page.len() < MAX_PAGE as usize;
            cursor = page.last().map(|m| m.id).or(cursor);
            all.extend(page);
            if done {
                return Ok(all);
            }
        }
    }
}

fn validate_body(body: &str) -> Result<(), ChatError> {
    if body.is_empty() {
        return Err(ChatError::Empty);
    }
    if body.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ChatError::TooLong);
    }
    Ok(())
}

fn message_from_row(row: MessageRow) -> Result<Message, ChatError> {
    let id = u64::try_from(row.id)
        .map_err(|_| ChatError::StorageFailure(anyhow!("stored message id {} is negative", row.id)))?;

    let created_at = row
        .created_at
        .parse::<chrono::DateTime<chrono::Utc>>()
        .or_else(|_| {
            // SQLite stores datetime('now') as "YYYY-MM-DD HH:MM:SS" without timezone.
            chrono::NaiveDateTime::parse_from_str(&row.created_at, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| {
            ChatError::StorageFailure(anyhow!(
                "corrupt created_at '{}' on message {}: {}",
                row.created_at,
                row.id,
                e
            ))
        })?;

    Ok(Message {
        id,
        author: row.author,
        body: row.body,
        client_time: row.client_time,
        created_at,
    })
}

fn to_response(message: Message) -> MessageResponse {
    MessageResponse {
        id: message.id,
        author: message.author,
        contents: message.body,
        time: message.client_time,
        created_at: message.created_at,
    }
}

// -- Handlers --

pub async fn post_chat(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<PostChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = run_blocking(move || {
        Ok(state.chat.post(&identity, &req.contents, req.time.as_deref())?)
    })
    .await?;

    Ok(Json(PostChatResponse { id }))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<u64>,
    Extension(_identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let message = run_blocking(move || Ok(state.chat.get_message(message_id)?)).await?;
    Ok(Json(to_response(message)))
}

pub async fn get_thread(
    State(state): State<AppState>,
    Query(query): Query<ThreadQuery>,
    Extension(_identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let page = run_blocking(move || Ok(state.chat.thread_page(query.after, query.limit)?)).await?;
    Ok(Json(page.into_iter().map(to_response).collect::<Vec<_>>()))
}
