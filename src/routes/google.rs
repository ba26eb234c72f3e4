//! Google OAuth endpoints

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Redirect;
use chrono::Utc;
use serde::Deserialize;
use tower_cookies::Cookies;

use crate::email::Mailer;
use crate::error::AppError;
use crate::gmail::{GmailApi, GoogleClient};
use crate::session::{self, SessionData};
use crate::state::AppState;
use crate::store::{ThreadStore, UserStore};

/// GET /api/google-auth/redirect-uri
///
/// Sends the browser to Google's consent screen.
pub async fn redirect_uri<U, T, M, G>(
    State(state): State<Arc<AppState<U, T, M, G>>>,
) -> Redirect
where
    U: UserStore,
    T: ThreadStore,
    M: Mailer,
    G: GmailApi,
{
    let client = GoogleClient::new(state.config.google.clone());
    Redirect::temporary(&client.authorization_url())
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
}

/// GET /api/google-auth/callback?code=
///
/// Exchanges the authorization code, stores the tokens on the signed-in
/// user, and bounces back to the app.
pub async fn callback<U, T, M, G>(
    State(state): State<Arc<AppState<U, T, M, G>>>,
    cookies: Cookies,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect, AppError>
where
    U: UserStore,
    T: ThreadStore,
    M: Mailer,
    G: GmailApi,
{
    let auth = session::require_login(&cookies, &state.cookie_key)?;
    let user_id = auth.user_id;

    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::Validation("No code provided".into()))?;

    let response = state.gmail.exchange_code(&code).await?;
    let tokens = response.into_tokens(Utc::now());

    let user = state
        .user_store
        .get_user(user_id)?
        .ok_or(AppError::NotFound)?;

    // A reconnect may omit the refresh token; keep the stored one
    let tokens = match &user.gmail_tokens {
        Some(existing) => existing.merged_with(tokens),
        None => tokens,
    };
    state.user_store.set_gmail_tokens(user_id, tokens)?;

    // Refresh the session so the connection state is visible immediately
    let user = state
        .user_store
        .get_user(user_id)?
        .ok_or(AppError::NotFound)?;
    session::establish(&cookies, &state.cookie_key, &SessionData::for_user(&user));

    tracing::info!(user_id = user_id.0, "Gmail account connected");

    Ok(Redirect::to("/"))
}
