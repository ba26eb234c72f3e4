//! Data models for storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// Unique thread identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

/// A local account
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub gmail_tokens: Option<GmailTokens>,
    pub created_at: DateTime<Utc>,
}

/// OAuth token bundle stored on a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GmailTokens {
    pub access_token: String,
    /// Only returned by Google on first consent; preserved across later exchanges
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
}

impl GmailTokens {
    /// Whether the access token needs a refresh before use
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry_date {
            Some(expiry) => now >= expiry,
            None => false,
        }
    }

    /// Fold a fresh token response into this bundle, keeping the stored
    /// refresh token when the response omits one.
    pub fn merged_with(&self, newer: GmailTokens) -> GmailTokens {
        GmailTokens {
            refresh_token: newer.refresh_token.or_else(|| self.refresh_token.clone()),
            ..newer
        }
    }
}

/// A one-time sign-in code
#[derive(Debug, Clone)]
pub struct VerificationToken {
    pub code: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A conversation between two participant addresses
#[derive(Debug, Clone)]
pub struct Thread {
    pub id: ThreadId,
    pub user_id: UserId,
    /// Normalized addresses, sorted; the unordered pair identifies the thread
    pub participants: [String; 2],
    pub subject: String,
    pub messages: Vec<ThreadMessage>,
    pub last_updated: DateTime<Utc>,
}

/// A message stored inside a thread
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadMessage {
    pub sender: String,
    pub content: String,
    pub snippet: Option<String>,
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
}

/// A message about to be merged into a thread
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender: String,
    pub content: String,
    pub snippet: Option<String>,
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of merging a message into the thread store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A new thread was created for the pair
    Created(ThreadId),
    /// The message was appended to an existing thread
    Appended(ThreadId),
    /// The message id was already present; nothing stored
    Duplicate(ThreadId),
}

impl MergeOutcome {
    pub fn thread_id(&self) -> &ThreadId {
        match self {
            MergeOutcome::Created(id)
            | MergeOutcome::Appended(id)
            | MergeOutcome::Duplicate(id) => id,
        }
    }
}

/// Audit record of an outbound message body
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub user_id: UserId,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Normalize a header address: extract the bracketed part of
/// `Name <addr>` forms, trim, and lowercase.
pub fn normalize_address(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = match (trimmed.rfind('<'), trimmed.rfind('>')) {
        (Some(start), Some(end)) if start < end => &trimmed[start + 1..end],
        _ => trimmed,
    };
    inner.trim().to_lowercase()
}

/// The canonical thread key for two addresses: normalized, unordered.
pub fn participant_pair(a: &str, b: &str) -> [String; 2] {
    let mut pair = [normalize_address(a), normalize_address(b)];
    pair.sort();
    pair
}
