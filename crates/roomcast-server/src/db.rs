//! SQLite persistence for chat memberships and messages.
//!
//! Tables:
//! - `users`: known user ids
//! - `chats_users`: which user belongs to which chat
//! - `messages`: every relayed message with its id and timestamps
//!
//! All queries run on the blocking pool behind one connection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use roomcast_core::{MembershipStore, MessageStore, NewMessage, RoomId, StoreError};
use roomcast_protocol::StoredMessage;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// SQLite-backed membership and message store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl SqliteStore {
    /// Open (or create) the database at `path` and make sure the schema
    /// exists. `:memory:` opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the file cannot be opened and
    /// [`StoreError::Backend`] if the schema cannot be created.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        conn.busy_timeout(Duration::from_secs(10)).map_err(backend)?;
        conn.pragma_update(None, "journal_mode", "WAL").map_err(backend)?;
        initialize_schema(&conn).map_err(backend)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open the database, retrying up to `retries` times.
    ///
    /// The pause starts at `pause` and grows by `pause` after every failed
    /// attempt.
    ///
    /// # Errors
    ///
    /// Returns the last open error once the retries are used up.
    pub async fn connect(path: &str, retries: u32, pause: Duration) -> Result<Self, StoreError> {
        let mut attempt = 0;
        let mut wait = pause;
        loop {
            match Self::open(path) {
                Ok(store) => {
                    info!(path = %path, "Database opened");
                    return Ok(store);
                }
                Err(e) if attempt < retries => {
                    attempt += 1;
                    warn!(
                        path = %path,
                        attempt,
                        retry_in_ms = wait.as_millis() as u64,
                        error = %e,
                        "Failed to open database, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    wait += pause;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Register a user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the insert fails.
    pub fn add_user(&self, user_id: &str) -> Result<(), StoreError> {
        self.conn
            .lock()
            .execute(
                "INSERT OR IGNORE INTO users (id) VALUES (?1)",
                params![user_id],
            )
            .map_err(backend)?;
        Ok(())
    }

    /// Add `user_id` to `chat_id`, registering the user if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if an insert fails.
    pub fn add_member(&self, chat_id: &str, user_id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO users (id) VALUES (?1)",
            params![user_id],
        )
        .map_err(backend)?;
        conn.execute(
            "INSERT OR IGNORE INTO chats_users (chat_id, user_id) VALUES (?1, ?2)",
            params![chat_id, user_id],
        )
        .map_err(backend)?;
        Ok(())
    }

    /// Messages stored for `chat_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the query fails.
    pub fn messages_in(&self, chat_id: &str) -> Result<Vec<StoredMessage>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, created_at, updated_at, content, iv, chat_id, sender_id
                 FROM messages WHERE chat_id = ?1 ORDER BY created_at, rowid",
            )
            .map_err(backend)?;

        let rows = stmt
            .query_map(params![chat_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .map_err(backend)?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, created_at, updated_at, content, iv, chat_id, sender_id) =
                row.map_err(backend)?;
            messages.push(StoredMessage {
                id,
                created_at: parse_timestamp(&created_at)?,
                updated_at: parse_timestamp(&updated_at)?,
                content,
                iv,
                chat_id,
                sender_id,
            });
        }
        Ok(messages)
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || f(&conn.lock()))
            .await
            .map_err(|e| StoreError::Backend(format!("Blocking task failed: {}", e)))?
    }
}

fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS chats_users (
            chat_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            PRIMARY KEY (chat_id, user_id)
        );
        CREATE INDEX IF NOT EXISTS idx_chats_users_user ON chats_users(user_id);
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            content TEXT NOT NULL,
            iv TEXT NOT NULL,
            chat_id TEXT NOT NULL,
            sender_id TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id, created_at);",
    )
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("Bad timestamp {:?}: {}", value, e)))
}

#[async_trait]
impl MembershipStore for SqliteStore {
    async fn chats_for_user(&self, user_id: &str) -> Result<Vec<RoomId>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let known = conn
                .query_row(
                    "SELECT id FROM users WHERE id = ?1",
                    params![user_id],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .map_err(backend)?;
            if known.is_none() {
                return Err(StoreError::UserNotFound(user_id));
            }

            let mut stmt = conn
                .prepare("SELECT chat_id FROM chats_users WHERE user_id = ?1 ORDER BY chat_id")
                .map_err(backend)?;
            let chats = stmt
                .query_map(params![user_id], |row| row.get::<_, String>(0))
                .map_err(backend)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(backend)?;
            Ok(chats)
        })
        .await
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn create(&self, message: NewMessage) -> Result<StoredMessage, StoreError> {
        self.with_conn(move |conn| {
            let now = Utc::now();
            let stored = StoredMessage {
                id: Uuid::new_v4().to_string(),
                created_at: now,
                updated_at: now,
                content: message.content,
                iv: message.iv,
                chat_id: message.room,
                sender_id: message.sender,
            };
            let timestamp = now.to_rfc3339();
            conn.execute(
                "INSERT INTO messages (id, created_at, updated_at, content, iv, chat_id, sender_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    stored.id,
                    timestamp,
                    timestamp,
                    stored.content,
                    stored.iv,
                    stored.chat_id,
                    stored.sender_id
                ],
            )
            .map_err(backend)?;
            Ok(stored)
        })
        .await
    }
}
