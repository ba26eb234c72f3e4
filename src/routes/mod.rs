//! HTTP routes

mod auth;
mod google;
mod send;
mod session;
mod threads;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

use crate::email::Mailer;
use crate::gmail::GmailApi;
use crate::state::AppState;
use crate::store::{ThreadStore, UserStore};

/// Create the router with all routes
pub fn create_router<U, T, M, G>(state: Arc<AppState<U, T, M, G>>) -> Router
where
    U: UserStore + 'static,
    T: ThreadStore + 'static,
    M: Mailer + 'static,
    G: GmailApi + 'static,
{
    Router::new()
        .route("/api/auth/request-code", post(auth::request_code))
        .route("/api/auth/verify", post(auth::verify_code))
        .route("/api/session", get(session::get_session))
        .route("/api/google-auth/redirect-uri", get(google::redirect_uri))
        .route("/api/google-auth/callback", get(google::callback))
        .route("/api/threads", get(threads::list_threads))
        .route("/api/threads/sync", post(threads::sync_inbox))
        .route("/api/threads/{id}", get(threads::get_thread))
        .route("/api/send", post(send::send_email))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
