//! Sign-in endpoints
//!
//! Passwordless flow: a 5-digit code is emailed to the address, then
//! exchanged for a session. Only existing users can sign in; there is
//! no self-registration path.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use crate::email::Mailer;
use crate::error::AppError;
use crate::gmail::GmailApi;
use crate::session::{self, SessionData};
use crate::state::AppState;
use crate::store::{ThreadStore, UserStore, VerificationToken};

/// How long a sign-in code stays valid
const CODE_TTL_MINUTES: i64 = 5;

/// Generate a random 5-digit sign-in code (leading zeros allowed)
fn generate_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..100_000);
    format!("{:05}", code)
}

#[derive(Deserialize)]
pub struct RequestCodeRequest {
    pub email: String,
}

#[derive(Serialize)]
pub struct RequestCodeResponse {
    pub success: bool,
}

/// POST /api/auth/request-code
///
/// Always answers with a success flag; failures are logged, never
/// surfaced as an error status.
pub async fn request_code<U, T, M, G>(
    State(state): State<Arc<AppState<U, T, M, G>>>,
    Json(req): Json<RequestCodeRequest>,
) -> Json<RequestCodeResponse>
where
    U: UserStore,
    T: ThreadStore,
    M: Mailer,
    G: GmailApi,
{
    let success = match issue_code(&state, &req.email) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(email = %req.email, "Failed to issue sign-in code: {}", e);
            false
        }
    };

    Json(RequestCodeResponse { success })
}

fn issue_code<U, T, M, G>(
    state: &AppState<U, T, M, G>,
    email: &str,
) -> Result<(), AppError>
where
    U: UserStore,
    T: ThreadStore,
    M: Mailer,
    G: GmailApi,
{
    let code = generate_code();
    let now = Utc::now();

    // Replaces any previously issued code for this address
    state.user_store.create_verification(VerificationToken {
        code: code.clone(),
        email: email.to_string(),
        created_at: now,
        expires_at: now + Duration::minutes(CODE_TTL_MINUTES),
    })?;

    state
        .mailer
        .send_verification(email, &code)
        .map_err(AppError::Provider)?;

    Ok(())
}

#[derive(Deserialize)]
pub struct VerifyCodeRequest {
    pub code: String,
}

#[derive(Serialize)]
pub struct VerifyCodeResponse {
    pub success: bool,
}

/// POST /api/auth/verify
pub async fn verify_code<U, T, M, G>(
    State(state): State<Arc<AppState<U, T, M, G>>>,
    cookies: Cookies,
    Json(req): Json<VerifyCodeRequest>,
) -> Result<Json<VerifyCodeResponse>, AppError>
where
    U: UserStore,
    T: ThreadStore,
    M: Mailer,
    G: GmailApi,
{
    let token = state
        .user_store
        .get_verification(&req.code)?
        .ok_or(AppError::InvalidCode)?;

    // Expired codes are removed on the failed attempt
    if Utc::now() > token.expires_at {
        state.user_store.delete_verification(&req.code)?;
        return Err(AppError::CodeExpired);
    }

    // Sign-in requires an existing account
    let user = state
        .user_store
        .get_user_by_email(&token.email)?
        .ok_or(AppError::Unauthorized)?;

    session::establish(&cookies, &state.cookie_key, &SessionData::for_user(&user));

    // Consume the code; a second verify with it fails as invalid
    state.user_store.delete_verification(&req.code)?;

    tracing::info!(user_id = user.id.0, "User signed in");

    Ok(Json(VerifyCodeResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_is_five_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 5);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
