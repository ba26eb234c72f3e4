//! SQLite-based storage implementation

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{
    participant_pair, GmailTokens, MergeOutcome, NewMessage, OutboundEmail, StoreResult, Thread,
    ThreadId, ThreadMessage, ThreadStore, User, UserId, UserStore, VerificationToken,
};
use crate::error::AppError;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// SQLite-based store implementing both UserStore and ThreadStore
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: &str) -> Result<Self, AppError> {
        let conn = Connection::open(path).map_err(internal)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(internal)?;

        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run database migrations
    fn migrate(conn: &Connection) -> Result<(), AppError> {
        let current_version = Self::get_schema_version(conn)?;

        if current_version < SCHEMA_VERSION {
            tracing::info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );

            if current_version < 1 {
                Self::migrate_v1(conn)?;
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(internal)?;

            tracing::info!("Database migrations complete");
        }

        Ok(())
    }

    /// Get current schema version (0 if no schema exists)
    fn get_schema_version(conn: &Connection) -> Result<i32, AppError> {
        let table_exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
                [],
                |row| row.get(0),
            )
            .map_err(internal)?;

        if !table_exists {
            return Ok(0);
        }

        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
        })
        .map_err(internal)
    }

    /// Migration to version 1: initial schema
    fn migrate_v1(conn: &Connection) -> Result<(), AppError> {
        conn.execute_batch(
            r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- Users
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                gmail_access_token TEXT,
                gmail_refresh_token TEXT,
                gmail_scope TEXT,
                gmail_token_type TEXT,
                gmail_token_expiry TEXT
            );

            -- One-time sign-in codes
            CREATE TABLE IF NOT EXISTS verification_tokens (
                code TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_verification_email ON verification_tokens(email);

            -- Threads, one per (user, unordered participant pair)
            CREATE TABLE IF NOT EXISTS threads (
                id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                participant_a TEXT NOT NULL,
                participant_b TEXT NOT NULL,
                subject TEXT NOT NULL,
                last_updated TEXT NOT NULL,
                UNIQUE(user_id, participant_a, participant_b)
            );
            CREATE INDEX IF NOT EXISTS idx_threads_user_id ON threads(user_id);

            -- Messages embedded in threads
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_id TEXT NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
                sender TEXT NOT NULL,
                content TEXT NOT NULL,
                snippet TEXT,
                message_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                UNIQUE(thread_id, message_id)
            );
            CREATE INDEX IF NOT EXISTS idx_messages_thread_id ON messages(thread_id);

            -- Outbound audit log
            CREATE TABLE IF NOT EXISTS emails (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(internal)?;

        Ok(())
    }

    fn load_messages(conn: &Connection, thread_id: &str) -> Result<Vec<ThreadMessage>, AppError> {
        let mut stmt = conn
            .prepare(
                "SELECT sender, content, snippet, message_id, timestamp
                 FROM messages WHERE thread_id = ?1 ORDER BY timestamp ASC",
            )
            .map_err(internal)?;

        let messages = stmt
            .query_map(params![thread_id], |row| {
                let sender: String = row.get(0)?;
                let content: String = row.get(1)?;
                let snippet: Option<String> = row.get(2)?;
                let message_id: String = row.get(3)?;
                let timestamp: String = row.get(4)?;
                Ok(ThreadMessage {
                    sender,
                    content,
                    snippet,
                    message_id,
                    timestamp: parse_timestamp(&timestamp),
                })
            })
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;

        Ok(messages)
    }
}

fn internal(e: impl std::fmt::Display) -> AppError {
    AppError::Internal(e.to_string())
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id: i64 = row.get(0)?;
    let email: String = row.get(1)?;
    let first_name: String = row.get(2)?;
    let last_name: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let access_token: Option<String> = row.get(5)?;
    let refresh_token: Option<String> = row.get(6)?;
    let scope: Option<String> = row.get(7)?;
    let token_type: Option<String> = row.get(8)?;
    let token_expiry: Option<String> = row.get(9)?;

    let gmail_tokens = access_token.map(|access_token| GmailTokens {
        access_token,
        refresh_token,
        scope,
        token_type,
        expiry_date: token_expiry.map(|s| parse_timestamp(&s)),
    });

    Ok(User {
        id: UserId(id as u64),
        email,
        first_name,
        last_name,
        gmail_tokens,
        created_at: parse_timestamp(&created_at),
    })
}

const USER_COLUMNS: &str = "id, email, first_name, last_name, created_at, \
     gmail_access_token, gmail_refresh_token, gmail_scope, gmail_token_type, gmail_token_expiry";

impl UserStore for SqliteStore {
    fn create_user(&self, email: &str, first_name: &str, last_name: &str) -> StoreResult<UserId> {
        let normalized = email.to_lowercase();
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO users (email, first_name, last_name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![normalized, first_name, last_name, now],
        )
        .map_err(|e| {
            if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                if err.code == rusqlite::ErrorCode::ConstraintViolation {
                    return AppError::Validation("Email already exists".into());
                }
            }
            internal(e)
        })?;

        Ok(UserId(conn.last_insert_rowid() as u64))
    }

    fn get_user(&self, user_id: UserId) -> StoreResult<Option<User>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![user_id.0 as i64],
            row_to_user,
        )
        .optional()
        .map_err(internal)
    }

    fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let normalized = email.to_lowercase();
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![normalized],
            row_to_user,
        )
        .optional()
        .map_err(internal)
    }

    fn set_gmail_tokens(&self, user_id: UserId, tokens: GmailTokens) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        let rows_affected = conn
            .execute(
                "UPDATE users SET gmail_access_token = ?1, gmail_refresh_token = ?2,
                 gmail_scope = ?3, gmail_token_type = ?4, gmail_token_expiry = ?5
                 WHERE id = ?6",
                params![
                    tokens.access_token,
                    tokens.refresh_token,
                    tokens.scope,
                    tokens.token_type,
                    tokens.expiry_date.map(|dt| dt.to_rfc3339()),
                    user_id.0 as i64,
                ],
            )
            .map_err(internal)?;

        if rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    fn create_verification(&self, token: VerificationToken) -> StoreResult<()> {
        let normalized = token.email.to_lowercase();
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(internal)?;

        // One active code per email
        tx.execute(
            "DELETE FROM verification_tokens WHERE email = ?1",
            params![normalized],
        )
        .map_err(internal)?;

        tx.execute(
            "INSERT INTO verification_tokens (code, email, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                token.code,
                normalized,
                token.created_at.to_rfc3339(),
                token.expires_at.to_rfc3339(),
            ],
        )
        .map_err(internal)?;

        tx.commit().map_err(internal)
    }

    fn get_verification(&self, code: &str) -> StoreResult<Option<VerificationToken>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT code, email, created_at, expires_at FROM verification_tokens WHERE code = ?1",
            params![code],
            |row| {
                let code: String = row.get(0)?;
                let email: String = row.get(1)?;
                let created_at: String = row.get(2)?;
                let expires_at: String = row.get(3)?;
                Ok(VerificationToken {
                    code,
                    email,
                    created_at: parse_timestamp(&created_at),
                    expires_at: parse_timestamp(&expires_at),
                })
            },
        )
        .optional()
        .map_err(internal)
    }

    fn delete_verification(&self, code: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "DELETE FROM verification_tokens WHERE code = ?1",
            params![code],
        )
        .map_err(internal)?;

        Ok(())
    }

    fn cleanup_expired_verifications(&self) -> StoreResult<u64> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        let rows_deleted = conn
            .execute(
                "DELETE FROM verification_tokens WHERE expires_at < ?1",
                params![now],
            )
            .map_err(internal)?;

        Ok(rows_deleted as u64)
    }
}

impl ThreadStore for SqliteStore {
    fn merge_message(
        &self,
        user_id: UserId,
        a: &str,
        b: &str,
        subject: &str,
        message: NewMessage,
    ) -> StoreResult<MergeOutcome> {
        let [pa, pb] = participant_pair(a, b);
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(internal)?;
        let now = Utc::now().to_rfc3339();

        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM threads
                 WHERE user_id = ?1 AND participant_a = ?2 AND participant_b = ?3",
                params![user_id.0 as i64, pa, pb],
                |row| row.get(0),
            )
            .optional()
            .map_err(internal)?;

        let outcome = match existing {
            Some(thread_id) => {
                // UNIQUE(thread_id, message_id) makes the insert the dedup point
                let inserted = tx
                    .execute(
                        "INSERT OR IGNORE INTO messages
                         (thread_id, sender, content, snippet, message_id, timestamp)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            thread_id,
                            message.sender,
                            message.content,
                            message.snippet,
                            message.message_id,
                            message.timestamp.to_rfc3339(),
                        ],
                    )
                    .map_err(internal)?;

                if inserted == 0 {
                    MergeOutcome::Duplicate(ThreadId(thread_id))
                } else {
                    tx.execute(
                        "UPDATE threads SET last_updated = ?1 WHERE id = ?2",
                        params![now, thread_id],
                    )
                    .map_err(internal)?;
                    MergeOutcome::Appended(ThreadId(thread_id))
                }
            }
            None => {
                let thread_id = Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO threads (id, user_id, participant_a, participant_b, subject, last_updated)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![thread_id, user_id.0 as i64, pa, pb, subject, now],
                )
                .map_err(internal)?;
                tx.execute(
                    "INSERT INTO messages
                     (thread_id, sender, content, snippet, message_id, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        thread_id,
                        message.sender,
                        message.content,
                        message.snippet,
                        message.message_id,
                        message.timestamp.to_rfc3339(),
                    ],
                )
                .map_err(internal)?;
                MergeOutcome::Created(ThreadId(thread_id))
            }
        };

        tx.commit().map_err(internal)?;
        Ok(outcome)
    }

    fn list_threads(&self, user_id: UserId) -> StoreResult<Vec<Thread>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, participant_a, participant_b, subject, last_updated
                 FROM threads WHERE user_id = ?1 ORDER BY last_updated DESC",
            )
            .map_err(internal)?;

        let rows = stmt
            .query_map(params![user_id.0 as i64], |row| {
                let id: String = row.get(0)?;
                let uid: i64 = row.get(1)?;
                let pa: String = row.get(2)?;
                let pb: String = row.get(3)?;
                let subject: String = row.get(4)?;
                let last_updated: String = row.get(5)?;
                Ok(Thread {
                    id: ThreadId(id),
                    user_id: UserId(uid as u64),
                    participants: [pa, pb],
                    subject,
                    messages: Vec::new(),
                    last_updated: parse_timestamp(&last_updated),
                })
            })
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;

        let mut threads = Vec::with_capacity(rows.len());
        for mut thread in rows {
            thread.messages = Self::load_messages(&conn, &thread.id.0)?;
            threads.push(thread);
        }

        Ok(threads)
    }

    fn get_thread(&self, user_id: UserId, thread_id: &ThreadId) -> StoreResult<Option<Thread>> {
        let conn = self.conn.lock().unwrap();

        let thread = conn
            .query_row(
                "SELECT id, user_id, participant_a, participant_b, subject, last_updated
                 FROM threads WHERE id = ?1 AND user_id = ?2",
                params![thread_id.0, user_id.0 as i64],
                |row| {
                    let id: String = row.get(0)?;
                    let uid: i64 = row.get(1)?;
                    let pa: String = row.get(2)?;
                    let pb: String = row.get(3)?;
                    let subject: String = row.get(4)?;
                    let last_updated: String = row.get(5)?;
                    Ok(Thread {
                        id: ThreadId(id),
                        user_id: UserId(uid as u64),
                        participants: [pa, pb],
                        subject,
                        messages: Vec::new(),
                        last_updated: parse_timestamp(&last_updated),
                    })
                },
            )
            .optional()
            .map_err(internal)?;

        match thread {
            Some(mut thread) => {
                thread.messages = Self::load_messages(&conn, &thread.id.0)?;
                Ok(Some(thread))
            }
            None => Ok(None),
        }
    }

    fn record_outbound(&self, user_id: UserId, message: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO emails (user_id, message, created_at) VALUES (?1, ?2, ?3)",
            params![user_id.0 as i64, message, Utc::now().to_rfc3339()],
        )
        .map_err(internal)?;

        Ok(())
    }

    fn list_outbound(&self, user_id: UserId) -> StoreResult<Vec<OutboundEmail>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT user_id, message, created_at FROM emails
                 WHERE user_id = ?1 ORDER BY created_at ASC",
            )
            .map_err(internal)?;

        let emails = stmt
            .query_map(params![user_id.0 as i64], |row| {
                let uid: i64 = row.get(0)?;
                let message: String = row.get(1)?;
                let created_at: String = row.get(2)?;
                Ok(OutboundEmail {
                    user_id: UserId(uid as u64),
                    message,
                    created_at: parse_timestamp(&created_at),
                })
            })
            .map_err(internal)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;

        Ok(emails)
    }
}
