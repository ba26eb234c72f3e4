//! Session data carried in an encrypted cookie
//!
//! The whole `SessionData` value travels in one private (encrypted and
//! authenticated) http-only cookie. Reads fall back to the signed-out
//! default when the cookie is absent or fails authentication; writes
//! replace the full value, never individual fields.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies, Key};

use crate::error::AppError;
use crate::store::{User, UserId};

pub const SESSION_COOKIE: &str = "mailbridge_session";

/// The signed-in user's identity and connection state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub is_gmail_connected: bool,
    #[serde(default)]
    pub is_logged_in: bool,
}

impl Default for SessionData {
    fn default() -> Self {
        Self {
            user_id: None,
            email: None,
            first_name: None,
            last_name: None,
            is_gmail_connected: false,
            is_logged_in: false,
        }
    }
}

impl SessionData {
    /// Build a logged-in session for a user
    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: Some(user.id.0),
            email: Some(user.email.clone()),
            first_name: Some(user.first_name.clone()),
            last_name: Some(user.last_name.clone()),
            is_gmail_connected: user.gmail_tokens.is_some(),
            is_logged_in: true,
        }
    }
}

/// Derive the cookie encryption key from the configured secret
pub fn cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

/// Read the current session, defaulting to signed-out
pub fn current(cookies: &Cookies, key: &Key) -> SessionData {
    cookies
        .private(key)
        .get(SESSION_COOKIE)
        .and_then(|c| serde_json::from_str(c.value()).ok())
        .unwrap_or_default()
}

/// A session proven to belong to a signed-in user
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user_id: UserId,
    pub data: SessionData,
}

/// Read the current session, failing unless signed in
pub fn require_login(cookies: &Cookies, key: &Key) -> Result<Authenticated, AppError> {
    let data = current(cookies, key);
    match (data.is_logged_in, data.user_id) {
        (true, Some(id)) => Ok(Authenticated {
            user_id: UserId(id),
            data,
        }),
        _ => Err(AppError::Unauthorized),
    }
}

/// Write a session as one atomic cookie replacement
pub fn establish(cookies: &Cookies, key: &Key, data: &SessionData) {
    let value = serde_json::to_string(data).expect("session data serializes");
    let cookie = Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    cookies.private(key).add(cookie);
}
