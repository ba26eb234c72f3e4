//! In-memory storage implementations

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use super::{
    participant_pair, GmailTokens, MergeOutcome, NewMessage, OutboundEmail, StoreResult, Thread,
    ThreadId, ThreadMessage, ThreadStore, User, UserId, UserStore, VerificationToken,
};
use crate::error::AppError;

/// In-memory user store
pub struct InMemoryUserStore {
    users: RwLock<HashMap<UserId, User>>,
    tokens: RwLock<HashMap<String, VerificationToken>>,
    next_user_id: AtomicU64,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            tokens: RwLock::new(HashMap::new()),
            next_user_id: AtomicU64::new(1),
        }
    }

    /// Rewrite a token's expiry (for testing purposes)
    pub fn backdate_verification(
        &self,
        code: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> StoreResult<()> {
        let mut tokens = self.tokens.write().unwrap();
        if let Some(token) = tokens.get_mut(code) {
            token.expires_at = expires_at;
            Ok(())
        } else {
            Err(AppError::InvalidCode)
        }
    }

    /// Number of live tokens for an email (for testing purposes)
    pub fn verification_count(&self, email: &str) -> usize {
        let normalized = email.to_lowercase();
        self.tokens
            .read()
            .unwrap()
            .values()
            .filter(|t| t.email == normalized)
            .count()
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore for InMemoryUserStore {
    fn create_user(&self, email: &str, first_name: &str, last_name: &str) -> StoreResult<UserId> {
        let normalized = email.to_lowercase();
        let mut users = self.users.write().unwrap();
        if users.values().any(|u| u.email == normalized) {
            return Err(AppError::Validation("Email already exists".into()));
        }
        let id = UserId(self.next_user_id.fetch_add(1, Ordering::SeqCst));
        users.insert(
            id,
            User {
                id,
                email: normalized,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                gmail_tokens: None,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    fn get_user(&self, user_id: UserId) -> StoreResult<Option<User>> {
        Ok(self.users.read().unwrap().get(&user_id).cloned())
    }

    fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let normalized = email.to_lowercase();
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .find(|u| u.email == normalized)
            .cloned())
    }

    fn set_gmail_tokens(&self, user_id: UserId, tokens: GmailTokens) -> StoreResult<()> {
        let mut users = self.users.write().unwrap();
        match users.get_mut(&user_id) {
            Some(user) => {
                user.gmail_tokens = Some(tokens);
                Ok(())
            }
            None => Err(AppError::NotFound),
        }
    }

    fn create_verification(&self, token: VerificationToken) -> StoreResult<()> {
        let mut tokens = self.tokens.write().unwrap();
        let normalized = token.email.to_lowercase();
        tokens.retain(|_, t| t.email != normalized);
        tokens.insert(
            token.code.clone(),
            VerificationToken {
                email: normalized,
                ..token
            },
        );
        Ok(())
    }

    fn get_verification(&self, code: &str) -> StoreResult<Option<VerificationToken>> {
        Ok(self.tokens.read().unwrap().get(code).cloned())
    }

    fn delete_verification(&self, code: &str) -> StoreResult<()> {
        self.tokens.write().unwrap().remove(code);
        Ok(())
    }

    fn cleanup_expired_verifications(&self) -> StoreResult<u64> {
        let now = Utc::now();
        let mut tokens = self.tokens.write().unwrap();
        let before = tokens.len();
        tokens.retain(|_, t| t.expires_at >= now);
        Ok((before - tokens.len()) as u64)
    }
}

/// In-memory thread store
pub struct InMemoryThreadStore {
    threads: RwLock<HashMap<ThreadId, Thread>>,
    outbound: RwLock<Vec<OutboundEmail>>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
            outbound: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryThreadStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadStore for InMemoryThreadStore {
    fn merge_message(
        &self,
        user_id: UserId,
        a: &str,
        b: &str,
        subject: &str,
        message: NewMessage,
    ) -> StoreResult<MergeOutcome> {
        let pair = participant_pair(a, b);

        // Find-or-create under a single write lock
        let mut threads = self.threads.write().unwrap();

        if let Some(thread) = threads
            .values_mut()
            .find(|t| t.user_id == user_id && t.participants == pair)
        {
            if thread.messages.iter().any(|m| m.message_id == message.message_id) {
                return Ok(MergeOutcome::Duplicate(thread.id.clone()));
            }
            thread.messages.push(ThreadMessage {
                sender: message.sender,
                content: message.content,
                snippet: message.snippet,
                message_id: message.message_id,
                timestamp: message.timestamp,
            });
            thread.last_updated = Utc::now();
            return Ok(MergeOutcome::Appended(thread.id.clone()));
        }

        let id = ThreadId(Uuid::new_v4().to_string());
        threads.insert(
            id.clone(),
            Thread {
                id: id.clone(),
                user_id,
                participants: pair,
                subject: subject.to_string(),
                messages: vec![ThreadMessage {
                    sender: message.sender,
                    content: message.content,
                    snippet: message.snippet,
                    message_id: message.message_id,
                    timestamp: message.timestamp,
                }],
                last_updated: Utc::now(),
            },
        );
        Ok(MergeOutcome::Created(id))
    }

    fn list_threads(&self, user_id: UserId) -> StoreResult<Vec<Thread>> {
        let threads = self.threads.read().unwrap();
        let mut out: Vec<Thread> = threads
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|x, y| y.last_updated.cmp(&x.last_updated));
        Ok(out)
    }

    fn get_thread(&self, user_id: UserId, thread_id: &ThreadId) -> StoreResult<Option<Thread>> {
        let threads = self.threads.read().unwrap();
        let mut thread = match threads.get(thread_id) {
            Some(t) if t.user_id == user_id => t.clone(),
            _ => return Ok(None),
        };
        thread.messages.sort_by_key(|m| m.timestamp);
        Ok(Some(thread))
    }

    fn record_outbound(&self, user_id: UserId, message: &str) -> StoreResult<()> {
        self.outbound.write().unwrap().push(OutboundEmail {
            user_id,
            message: message.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    fn list_outbound(&self, user_id: UserId) -> StoreResult<Vec<OutboundEmail>> {
        Ok(self
            .outbound
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn msg(id: &str, sender: &str) -> NewMessage {
        NewMessage {
            sender: sender.to_string(),
            content: format!("body of {}", id),
            snippet: None,
            message_id: id.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_verification_token_replaced_per_email() {
        let store = InMemoryUserStore::new();
        let now = Utc::now();

        for code in ["11111", "22222"] {
            store
                .create_verification(VerificationToken {
                    code: code.to_string(),
                    email: "a@example.com".into(),
                    created_at: now,
                    expires_at: now + Duration::minutes(5),
                })
                .unwrap();
        }

        // The first code is gone, only the newest survives
        assert!(store.get_verification("11111").unwrap().is_none());
        assert!(store.get_verification("22222").unwrap().is_some());
        assert_eq!(store.verification_count("a@example.com"), 1);
    }

    #[test]
    fn test_cleanup_expired_verifications() {
        let store = InMemoryUserStore::new();
        let now = Utc::now();

        store
            .create_verification(VerificationToken {
                code: "11111".into(),
                email: "a@example.com".into(),
                created_at: now - Duration::minutes(10),
                expires_at: now - Duration::minutes(5),
            })
            .unwrap();
        store
            .create_verification(VerificationToken {
                code: "22222".into(),
                email: "b@example.com".into(),
                created_at: now,
                expires_at: now + Duration::minutes(5),
            })
            .unwrap();

        assert_eq!(store.cleanup_expired_verifications().unwrap(), 1);
        assert!(store.get_verification("22222").unwrap().is_some());
    }

    #[test]
    fn test_merge_creates_then_appends() {
        let store = InMemoryThreadStore::new();
        let user = UserId(1);

        let first = store
            .merge_message(user, "a@x.com", "b@y.com", "Hello", msg("m1", "a@x.com"))
            .unwrap();
        let id = match first {
            MergeOutcome::Created(id) => id,
            other => panic!("expected Created, got {:?}", other),
        };

        let second = store
            .merge_message(user, "a@x.com", "b@y.com", "Hello", msg("m2", "b@y.com"))
            .unwrap();
        assert_eq!(second, MergeOutcome::Appended(id.clone()));

        let thread = store.get_thread(user, &id).unwrap().unwrap();
        assert_eq!(thread.messages.len(), 2);
    }

    #[test]
    fn test_merge_is_idempotent_on_message_id() {
        let store = InMemoryThreadStore::new();
        let user = UserId(1);

        store
            .merge_message(user, "a@x.com", "b@y.com", "Hi", msg("m1", "a@x.com"))
            .unwrap();
        let outcome = store
            .merge_message(user, "a@x.com", "b@y.com", "Hi", msg("m1", "a@x.com"))
            .unwrap();

        assert!(matches!(outcome, MergeOutcome::Duplicate(_)));
        let threads = store.list_threads(user).unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].messages.len(), 1);
    }

    #[test]
    fn test_merge_direction_lands_in_same_thread() {
        let store = InMemoryThreadStore::new();
        let user = UserId(1);

        store
            .merge_message(user, "Ada <a@x.com>", "b@y.com", "Hi", msg("m1", "a@x.com"))
            .unwrap();
        store
            .merge_message(user, "b@y.com", "A@X.COM", "Hi", msg("m2", "b@y.com"))
            .unwrap();

        let threads = store.list_threads(user).unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].messages.len(), 2);
    }

    #[test]
    fn test_threads_are_per_user() {
        let store = InMemoryThreadStore::new();

        store
            .merge_message(UserId(1), "a@x.com", "b@y.com", "Hi", msg("m1", "a@x.com"))
            .unwrap();
        store
            .merge_message(UserId(2), "a@x.com", "b@y.com", "Hi", msg("m1", "a@x.com"))
            .unwrap();

        assert_eq!(store.list_threads(UserId(1)).unwrap().len(), 1);
        assert_eq!(store.list_threads(UserId(2)).unwrap().len(), 1);

        // A user cannot read another user's thread
        let other = store.list_threads(UserId(2)).unwrap();
        assert!(store.get_thread(UserId(1), &other[0].id).unwrap().is_none());
    }

    #[test]
    fn test_messages_sorted_by_timestamp_on_read() {
        let store = InMemoryThreadStore::new();
        let user = UserId(1);
        let now = Utc::now();

        let late = NewMessage {
            timestamp: now,
            ..msg("m-late", "a@x.com")
        };
        let early = NewMessage {
            timestamp: now - Duration::hours(1),
            ..msg("m-early", "b@y.com")
        };

        // Arrival order does not match timestamp order
        let id = store
            .merge_message(user, "a@x.com", "b@y.com", "Hi", late)
            .unwrap()
            .thread_id()
            .clone();
        store
            .merge_message(user, "a@x.com", "b@y.com", "Hi", early)
            .unwrap();

        let thread = store.get_thread(user, &id).unwrap().unwrap();
        assert_eq!(thread.messages[0].message_id, "m-early");
        assert_eq!(thread.messages[1].message_id, "m-late");
    }
}
