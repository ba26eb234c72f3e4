//! mailbridge
//!
//! Email-sending web service: passwordless sign-in with one-time emailed
//! codes, Gmail OAuth connection, inbox-to-thread synchronization, and
//! outbound mail through a transactional SMTP provider.

pub mod config;
pub mod email;
pub mod error;
pub mod gmail;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod sync;

pub use config::{Config, GoogleConfig, SmtpConfig};
pub use email::{ConsoleMailer, Mailer, SmtpMailer};
pub use error::AppError;
pub use gmail::{GmailApi, GoogleClient};
pub use session::SessionData;
pub use state::AppState;
pub use store::{
    InMemoryThreadStore, InMemoryUserStore, SqliteStore, ThreadStore, UserStore,
};
