//! Store contracts consumed by the hub.
//!
//! The relay does not own chat data. It asks a [`MembershipStore`] which rooms
//! a user belongs to and hands every message to a [`MessageStore`] before it
//! is fanned out. [`MemoryStore`] implements both in memory.

use crate::message::NewMessage;
use crate::room::RoomId;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use roomcast_protocol::StoredMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;
use uuid::Uuid;

/// An authenticated user identifier.
pub type UserId = String;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The user does not exist.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The store cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the operation.
    #[error("Database error: {0}")]
    Backend(String),
}

/// Looks up room memberships.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Return the ids of every chat `user_id` belongs to.
    async fn chats_for_user(&self, user_id: &str) -> Result<Vec<RoomId>, StoreError>;
}

/// Persists chat messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message and return it with its id and timestamps.
    async fn create(&self, message: NewMessage) -> Result<StoredMessage, StoreError>;
}

/// In-memory implementation of both stores.
///
/// Outages can be simulated with [`MemoryStore::fail_reads`] and
/// [`MemoryStore::fail_writes`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    members: RwLock<HashMap<UserId, Vec<RoomId>>>,
    messages: Mutex<Vec<StoredMessage>>,
    create_calls: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with no chats.
    pub fn add_user(&self, user_id: impl Into<UserId>) {
        self.members.write().entry(user_id.into()).or_default();
    }

    /// Add `user_id` to `room`, creating the user if needed.
    pub fn add_member(&self, user_id: impl Into<UserId>, room: impl Into<RoomId>) {
        let room = room.into();
        let mut members = self.members.write();
        let rooms = members.entry(user_id.into()).or_default();
        if !rooms.contains(&room) {
            rooms.push(room);
        }
    }

    /// Make membership lookups fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make message persistence fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Every message persisted so far.
    #[must_use]
    pub fn messages(&self) -> Vec<StoredMessage> {
        self.messages.lock().clone()
    }

    /// Number of `create` calls, failed ones included.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn chats_for_user(&self, user_id: &str) -> Result<Vec<RoomId>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("membership lookups disabled".into()));
        }
        self.members
            .read()
            .get(user_id)
            .cloned()
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create(&self, message: NewMessage) -> Result<StoredMessage, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("message writes disabled".into()));
        }

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
        self.messages.lock().push(stored.clone());
        Ok(stored)
    }
}
