//! Session endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tower_cookies::Cookies;

use crate::email::Mailer;
use crate::gmail::GmailApi;
use crate::session::{self, SessionData};
use crate::state::AppState;
use crate::store::{ThreadStore, UserStore};

/// GET /api/session
///
/// Returns the default signed-out shape when no valid cookie is present.
pub async fn get_session<U, T, M, G>(
    State(state): State<Arc<AppState<U, T, M, G>>>,
    cookies: Cookies,
) -> Json<SessionData>
where
    U: UserStore,
    T: ThreadStore,
    M: Mailer,
    G: GmailApi,
{
    Json(session::current(&cookies, &state.cookie_key))
}
