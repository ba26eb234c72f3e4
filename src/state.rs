//! Application state

use std::sync::Arc;

use tower_cookies::Key;

use crate::config::Config;
use crate::email::Mailer;
use crate::gmail::GmailApi;
use crate::session;
use crate::store::{ThreadStore, UserStore};

/// Shared state handed to every route handler
pub struct AppState<U, T, M, G> {
    pub config: Config,
    /// Key the session cookie is encrypted with
    pub cookie_key: Key,
    pub user_store: Arc<U>,
    pub thread_store: Arc<T>,
    pub mailer: Arc<M>,
    pub gmail: Arc<G>,
}

impl<U, T, M, G> AppState<U, T, M, G>
where
    U: UserStore,
    T: ThreadStore,
    M: Mailer,
    G: GmailApi,
{
    pub fn new(config: Config, user_store: U, thread_store: T, mailer: M, gmail: G) -> Self {
        let cookie_key = session::cookie_key(&config.session_secret);
        Self {
            config,
            cookie_key,
            user_store: Arc::new(user_store),
            thread_store: Arc::new(thread_store),
            mailer: Arc::new(mailer),
            gmail: Arc::new(gmail),
        }
    }
}
