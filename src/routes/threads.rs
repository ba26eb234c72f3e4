//! Thread listing, detail, and sync endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_cookies::Cookies;

use crate::email::Mailer;
use crate::error::AppError;
use crate::gmail::GmailApi;
use crate::session;
use crate::state::AppState;
use crate::store::{Thread, ThreadId, ThreadMessage, ThreadStore, UserStore};
use crate::sync::{self, SyncReport};

#[derive(Serialize)]
pub struct ThreadSummary {
    pub id: String,
    pub participants: [String; 2],
    pub subject: String,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
    #[serde(rename = "messageCount")]
    pub message_count: usize,
    /// Preview of the most recent message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl From<Thread> for ThreadSummary {
    fn from(thread: Thread) -> Self {
        let snippet = thread
            .messages
            .iter()
            .max_by_key(|m| m.timestamp)
            .map(|m| m.snippet.clone().unwrap_or_else(|| preview(&m.content)));
        Self {
            id: thread.id.0,
            participants: thread.participants,
            subject: thread.subject,
            last_updated: thread.last_updated,
            message_count: thread.messages.len(),
            snippet,
        }
    }
}

fn preview(content: &str) -> String {
    content.chars().take(80).collect()
}

/// GET /api/threads
pub async fn list_threads<U, T, M, G>(
    State(state): State<Arc<AppState<U, T, M, G>>>,
    cookies: Cookies,
) -> Result<Json<Vec<ThreadSummary>>, AppError>
where
    U: UserStore,
    T: ThreadStore,
    M: Mailer,
    G: GmailApi,
{
    let auth = session::require_login(&cookies, &state.cookie_key)?;

    let threads = state.thread_store.list_threads(auth.user_id)?;
    Ok(Json(threads.into_iter().map(ThreadSummary::from).collect()))
}

#[derive(Serialize)]
pub struct ThreadDetail {
    pub id: String,
    pub participants: [String; 2],
    pub subject: String,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
    /// Sorted by timestamp, oldest first
    pub messages: Vec<ThreadMessage>,
}

/// GET /api/threads/{id}
pub async fn get_thread<U, T, M, G>(
    State(state): State<Arc<AppState<U, T, M, G>>>,
    cookies: Cookies,
    Path(id): Path<String>,
) -> Result<Json<ThreadDetail>, AppError>
where
    U: UserStore,
    T: ThreadStore,
    M: Mailer,
    G: GmailApi,
{
    let auth = session::require_login(&cookies, &state.cookie_key)?;

    let thread = state
        .thread_store
        .get_thread(auth.user_id, &ThreadId(id))?
        .ok_or(AppError::NotFound)?;

    Ok(Json(ThreadDetail {
        id: thread.id.0,
        participants: thread.participants,
        subject: thread.subject,
        last_updated: thread.last_updated,
        messages: thread.messages,
    }))
}

#[derive(Serialize)]
pub struct SyncResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: SyncReport,
}

/// POST /api/threads/sync
pub async fn sync_inbox<U, T, M, G>(
    State(state): State<Arc<AppState<U, T, M, G>>>,
    cookies: Cookies,
) -> Result<Json<SyncResponse>, AppError>
where
    U: UserStore,
    T: ThreadStore,
    M: Mailer,
    G: GmailApi,
{
    let auth = session::require_login(&cookies, &state.cookie_key)?;

    let user = state
        .user_store
        .get_user(auth.user_id)?
        .ok_or(AppError::NotFound)?;

    let report = sync::sync_inbox(
        state.user_store.as_ref(),
        state.thread_store.as_ref(),
        state.gmail.as_ref(),
        &user,
    )
    .await?;

    Ok(Json(SyncResponse {
        success: true,
        report,
    }))
}
