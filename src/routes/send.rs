//! Compose-and-send endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::email::{self, Mailer, OutgoingMessage};
use crate::error::AppError;
use crate::gmail::GmailApi;
use crate::session;
use crate::state::AppState;
use crate::store::{NewMessage, ThreadStore, UserStore};

#[derive(Deserialize)]
pub struct SendEmailRequest {
    pub to: String,
    pub subject: String,
    pub message: String,
    /// Override for the sender display name
    pub name: Option<String>,
    /// Override for the sender address
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct SendEmailResponse {
    pub message: String,
}

/// POST /api/send
///
/// Audit write, provider dispatch, and thread merge are three separate
/// steps; a failure between them leaves the earlier ones in place.
pub async fn send_email<U, T, M, G>(
    State(state): State<Arc<AppState<U, T, M, G>>>,
    cookies: Cookies,
    Json(req): Json<SendEmailRequest>,
) -> Result<Json<SendEmailResponse>, AppError>
where
    U: UserStore,
    T: ThreadStore,
    M: Mailer,
    G: GmailApi,
{
    let auth = session::require_login(&cookies, &state.cookie_key)?;

    // Reject blank fields before touching the store or the provider
    if req.to.trim().is_empty() {
        return Err(AppError::Validation("Recipient is required".into()));
    }
    if req.subject.trim().is_empty() {
        return Err(AppError::Validation("Subject is required".into()));
    }
    if req.message.trim().is_empty() {
        return Err(AppError::Validation("Message is required".into()));
    }

    let sender_name = req.name.clone().unwrap_or_else(|| {
        format!(
            "{} {}",
            auth.data.first_name.as_deref().unwrap_or_default(),
            auth.data.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    });
    let sender_email = req
        .email
        .clone()
        .or_else(|| auth.data.email.clone())
        .ok_or(AppError::Unauthorized)?;

    state
        .thread_store
        .record_outbound(auth.user_id, &req.message)?;

    let html_body = email::sanitize_body(&req.message);
    state
        .mailer
        .send_message(&OutgoingMessage {
            from_name: &sender_name,
            from_email: &sender_email,
            to: &req.to,
            subject: &req.subject,
            html_body: &html_body,
        })
        .map_err(AppError::Provider)?;

    // Thread the sent mail alongside received mail. The dispatch already
    // happened, so a merge failure is logged rather than surfaced.
    let merge = state.thread_store.merge_message(
        auth.user_id,
        &sender_email,
        &req.to,
        &req.subject,
        NewMessage {
            sender: crate::store::normalize_address(&sender_email),
            content: req.message.clone(),
            snippet: None,
            message_id: format!("sent-{}", Uuid::new_v4()),
            timestamp: Utc::now(),
        },
    );
    if let Err(e) = merge {
        tracing::warn!(user_id = auth.user_id.0, "Sent mail not threaded: {}", e);
    }

    Ok(Json(SendEmailResponse {
        message: format!("Email sent successfully to {}", req.to),
    }))
}
