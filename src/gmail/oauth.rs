//! Stored-token management
//!
//! Access tokens live on the user record and are refreshed synchronously,
//! within the request that found them expired. Two requests racing to
//! refresh the same token both succeed; the later write wins.

use chrono::Utc;

use super::GmailApi;
use crate::error::AppError;
use crate::store::{User, UserStore};

/// Produce a usable access token for a user, refreshing if needed.
///
/// Fails with `GmailNotConnected` when the user has no token bundle, or
/// when the bundle is expired and carries no refresh token (re-consent
/// is the only way forward).
pub async fn authorized_token<U, G>(
    user_store: &U,
    gmail: &G,
    user: &User,
) -> Result<String, AppError>
where
    U: UserStore,
    G: GmailApi,
{
    let tokens = user
        .gmail_tokens
        .clone()
        .ok_or(AppError::GmailNotConnected)?;

    let now = Utc::now();
    if !tokens.is_expired(now) {
        return Ok(tokens.access_token);
    }

    let refresh_token = match &tokens.refresh_token {
        Some(token) => token.clone(),
        None => {
            tracing::warn!(user_id = user.id.0, "Access token expired with no refresh token");
            return Err(AppError::GmailNotConnected);
        }
    };

    tracing::debug!(user_id = user.id.0, "Refreshing expired access token");
    let response = gmail.refresh_access_token(&refresh_token).await?;
    let refreshed = tokens.merged_with(response.into_tokens(Utc::now()));

    user_store.set_gmail_tokens(user.id, refreshed.clone())?;

    Ok(refreshed.access_token)
}
