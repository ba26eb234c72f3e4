//! Storage abstractions

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::{InMemoryThreadStore, InMemoryUserStore};
pub use models::*;
pub use sqlite::SqliteStore;

use std::sync::Arc;

use crate::error::AppError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, AppError>;

/// Trait for user and verification token storage
pub trait UserStore: Send + Sync {
    /// Create a new user
    fn create_user(&self, email: &str, first_name: &str, last_name: &str) -> StoreResult<UserId>;

    /// Get a user by ID
    fn get_user(&self, user_id: UserId) -> StoreResult<Option<User>>;

    /// Get a user by email address
    fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Store or replace a user's Gmail token bundle
    fn set_gmail_tokens(&self, user_id: UserId, tokens: GmailTokens) -> StoreResult<()>;

    /// Store a verification token, replacing any previously issued
    /// token for the same email
    fn create_verification(&self, token: VerificationToken) -> StoreResult<()>;

    /// Get a verification token by code value
    fn get_verification(&self, code: &str) -> StoreResult<Option<VerificationToken>>;

    /// Delete a verification token
    fn delete_verification(&self, code: &str) -> StoreResult<()>;

    /// Delete all verification tokens past their expiry
    fn cleanup_expired_verifications(&self) -> StoreResult<u64>;
}

/// Trait for thread and outbound-audit storage
pub trait ThreadStore: Send + Sync {
    /// Merge a message into the thread for the unordered pair `(a, b)`.
    ///
    /// Atomic find-or-create: creates the thread if the pair is new,
    /// appends if `message_id` is unseen, reports a duplicate otherwise.
    /// `last_updated` advances on create and append.
    fn merge_message(
        &self,
        user_id: UserId,
        a: &str,
        b: &str,
        subject: &str,
        message: NewMessage,
    ) -> StoreResult<MergeOutcome>;

    /// List a user's threads, most recently updated first
    fn list_threads(&self, user_id: UserId) -> StoreResult<Vec<Thread>>;

    /// Get one thread with its messages sorted by timestamp
    fn get_thread(&self, user_id: UserId, thread_id: &ThreadId) -> StoreResult<Option<Thread>>;

    /// Append an outbound message body to the audit log
    fn record_outbound(&self, user_id: UserId, message: &str) -> StoreResult<()>;

    /// List a user's audit records, oldest first
    fn list_outbound(&self, user_id: UserId) -> StoreResult<Vec<OutboundEmail>>;
}

impl<T: UserStore + ?Sized> UserStore for Arc<T> {
    fn create_user(&self, email: &str, first_name: &str, last_name: &str) -> StoreResult<UserId> {
        (**self).create_user(email, first_name, last_name)
    }

    fn get_user(&self, user_id: UserId) -> StoreResult<Option<User>> {
        (**self).get_user(user_id)
    }

    fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        (**self).get_user_by_email(email)
    }

    fn set_gmail_tokens(&self, user_id: UserId, tokens: GmailTokens) -> StoreResult<()> {
        (**self).set_gmail_tokens(user_id, tokens)
    }

    fn create_verification(&self, token: VerificationToken) -> StoreResult<()> {
        (**self).create_verification(token)
    }

    fn get_verification(&self, code: &str) -> StoreResult<Option<VerificationToken>> {
        (**self).get_verification(code)
    }

    fn delete_verification(&self, code: &str) -> StoreResult<()> {
        (**self).delete_verification(code)
    }

    fn cleanup_expired_verifications(&self) -> StoreResult<u64> {
        (**self).cleanup_expired_verifications()
    }
}

impl<T: ThreadStore + ?Sized> ThreadStore for Arc<T> {
    fn merge_message(
        &self,
        user_id: UserId,
        a: &str,
        b: &str,
        subject: &str,
        message: NewMessage,
    ) -> StoreResult<MergeOutcome> {
        (**self).merge_message(user_id, a, b, subject, message)
    }

    fn list_threads(&self, user_id: UserId) -> StoreResult<Vec<Thread>> {
        (**self).list_threads(user_id)
    }

    fn get_thread(&self, user_id: UserId, thread_id: &ThreadId) -> StoreResult<Option<Thread>> {
        (**self).get_thread(user_id, thread_id)
    }

    fn record_outbound(&self, user_id: UserId, message: &str) -> StoreResult<()> {
        (**self).record_outbound(user_id, message)
    }

    fn list_outbound(&self, user_id: UserId) -> StoreResult<Vec<OutboundEmail>> {
        (**self).list_outbound(user_id)
    }
}
