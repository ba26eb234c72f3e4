//! Google OAuth and Gmail REST client

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::message::{self, GmailMessage, MessagesListResponse};
use super::{GmailApi, RemoteMessage, TokenResponse};
use crate::config::GoogleConfig;
use crate::error::AppError;

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Scopes requested at consent: read-only mail plus the user's address
const SCOPES: &str =
    "https://www.googleapis.com/auth/gmail.readonly https://www.googleapis.com/auth/userinfo.email";

#[derive(Clone)]
pub struct GoogleClient {
    client: Client,
    config: GoogleConfig,
}

impl GoogleClient {
    pub fn new(config: GoogleConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self { client, config }
    }

    /// Build the consent-screen URL.
    ///
    /// `access_type=offline` asks for a refresh token; `prompt=consent`
    /// makes Google actually return one on reconnects.
    pub fn authorization_url(&self) -> String {
        let url = reqwest::Url::parse_with_params(
            AUTH_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .expect("auth url is valid");
        url.to_string()
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse, AppError> {
        let response = self
            .client
            .post(TOKEN_URL)
            .form(params)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Provider(format!(
                "Token endpoint returned HTTP {}: {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to parse token response: {}", e)))
    }
}

#[async_trait]
impl GmailApi for GoogleClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("code", code),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
            ("redirect_uri", &self.config.redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("refresh_token", refresh_token),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn list_message_ids(
        &self,
        access_token: &str,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<String>, AppError> {
        let url = format!("{}/users/me/messages", GMAIL_API_BASE);
        let max_results = max_results.to_string();

        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("q", query), ("maxResults", &max_results)])
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to list messages: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Provider(format!(
                "Failed to list messages: HTTP {} - {}",
                status, error_text
            )));
        }

        let list: MessagesListResponse = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to parse message list: {}", e)))?;

        Ok(list
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.id)
            .collect())
    }

    async fn get_message(&self, access_token: &str, id: &str) -> Result<RemoteMessage, AppError> {
        let url = format!("{}/users/me/messages/{}", GMAIL_API_BASE, id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("format", "full")])
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to get message {}: {}", id, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Provider(format!(
                "Failed to get message {}: HTTP {} - {}",
                id, status, error_text
            )));
        }

        let msg: GmailMessage = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to parse message {}: {}", id, e)))?;

        let (from, to, subject, body) = match &msg.payload {
            Some(payload) => (
                message::header_value(payload, "From"),
                message::header_value(payload, "To"),
                message::header_value(payload, "Subject"),
                message::extract_body(payload),
            ),
            None => (None, None, None, None),
        };

        Ok(RemoteMessage {
            id: msg.id,
            from,
            to,
            subject,
            snippet: msg.snippet,
            internal_date: msg.internal_date.and_then(|s| s.parse().ok()),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GoogleClient {
        GoogleClient::new(GoogleConfig {
            client_id: "client-id".into(),
            client_secret: "client-secret".into(),
            redirect_uri: "http://localhost:3000/api/google-auth/callback".into(),
        })
    }

    #[test]
    fn test_authorization_url_shape() {
        let url = client().authorization_url();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("gmail.readonly"));
    }
}
