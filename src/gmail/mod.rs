//! Gmail API access

pub mod client;
pub mod message;
pub mod oauth;

pub use client::GoogleClient;
pub use oauth::authorized_token;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::AppError;
use crate::store::GmailTokens;

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
    /// Lifetime of the access token in seconds
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    /// Convert into a storable bundle, anchoring the expiry at `now`
    pub fn into_tokens(self, now: DateTime<Utc>) -> GmailTokens {
        GmailTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            scope: self.scope,
            token_type: self.token_type,
            expiry_date: self.expires_in.map(|secs| now + chrono::Duration::seconds(secs)),
        }
    }
}

/// A fetched remote message, reduced to the fields the sync cares about
#[derive(Debug, Clone)]
pub struct RemoteMessage {
    pub id: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub snippet: Option<String>,
    /// Milliseconds since the epoch, as Gmail reports it
    pub internal_date: Option<i64>,
    pub body: Option<String>,
}

/// Trait for the Gmail/OAuth surface the service talks to
#[async_trait]
pub trait GmailApi: Send + Sync {
    /// Exchange an authorization code for tokens
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError>;

    /// Exchange a refresh token for a fresh access token
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError>;

    /// List message ids matching a query, capped at `max_results`
    async fn list_message_ids(
        &self,
        access_token: &str,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<String>, AppError>;

    /// Fetch one full message
    async fn get_message(&self, access_token: &str, id: &str) -> Result<RemoteMessage, AppError>;
}
