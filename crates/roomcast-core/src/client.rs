//! Client handles.
//!
//! A connected client is split in two when it is created:
//!
//! - [`ClientHandle`] goes to the hub. It holds the only strong sender of the
//!   client's outbound queue, so dropping it closes the queue.
//! - [`ClientEndpoint`] stays with the connection. Its write task drains the
//!   queue and its read task checks the shared [`RoomSet`].

use crate::room::RoomId;
use crate::store::UserId;
use dashmap::DashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

/// A serialized frame waiting in an outbound queue.
///
/// One allocation is shared by every queue a broadcast is fanned out to.
pub type OutboundFrame = Arc<str>;

/// Unique identifier for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Create a client ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random client ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("conn_{}", Uuid::new_v4().simple()))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The rooms a client is subscribed to.
///
/// Written by the hub while it subscribes and unsubscribes the client, read
/// by the client's read task to authorize inbound frames.
#[derive(Debug, Clone, Default)]
pub struct RoomSet(Arc<DashSet<RoomId>>);

impl RoomSet {
    /// Create an empty room set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether the client may write into `room`.
    #[must_use]
    pub fn contains(&self, room: &str) -> bool {
        self.0.contains(room)
    }

    /// Number of subscribed rooms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the client is subscribed to nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of the current room ids.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RoomId> {
        self.0.iter().map(|room| room.key().clone()).collect()
    }

    pub(crate) fn insert(&self, room: RoomId) -> bool {
        self.0.insert(room)
    }

    pub(crate) fn remove(&self, room: &str) -> bool {
        self.0.remove(room).is_some()
    }
}

/// The hub's view of a connected client.
///
/// Deliberately not `Clone`: the registry entry owns the queue's only strong
/// sender.
#[derive(Debug)]
pub struct ClientHandle {
    id: ClientId,
    user_id: UserId,
    sender: mpsc::Sender<OutboundFrame>,
    rooms: RoomSet,
}

impl ClientHandle {
    /// Create a connected client with an outbound queue of `capacity` frames.
    ///
    /// Returns the hub-side handle and the connection-side endpoint.
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, capacity: usize) -> (Self, ClientEndpoint) {
        Self::with_id(ClientId::generate(), user_id, capacity)
    }

    /// Like [`ClientHandle::new`] with a caller-chosen id.
    #[must_use]
    pub fn with_id(
        id: ClientId,
        user_id: impl Into<UserId>,
        capacity: usize,
    ) -> (Self, ClientEndpoint) {
        let user_id = user_id.into();
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let rooms = RoomSet::new();

        let endpoint = ClientEndpoint {
            id: id.clone(),
            user_id: user_id.clone(),
            rooms: rooms.clone(),
            outbound: receiver,
            replies: sender.downgrade(),
        };

        let handle = Self {
            id,
            user_id,
            sender,
            rooms,
        };

        (handle, endpoint)
    }

    /// Get the client id.
    #[must_use]
    pub fn id(&self) -> &ClientId {
        &self.id
    }

    /// Get the authenticated user.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Get the client's room set.
    #[must_use]
    pub fn rooms(&self) -> &RoomSet {
        &self.rooms
    }

    /// Enqueue a frame without waiting.
    ///
    /// # Errors
    ///
    /// Fails if the queue is full or the write task is gone.
    pub fn try_send(&self, frame: OutboundFrame) -> Result<(), TrySendError<OutboundFrame>> {
        self.sender.try_send(frame)
    }
}

/// The connection's side of a client.
#[derive(Debug)]
pub struct ClientEndpoint {
    /// Client id, shared with the hub handle.
    pub id: ClientId,
    /// Authenticated user.
    pub user_id: UserId,
    /// Rooms the hub has subscribed this client to.
    pub rooms: RoomSet,
    /// Outbound queue drained by the write task.
    pub outbound: mpsc::Receiver<OutboundFrame>,
    /// Weak sender for replies produced by the read task; it does not keep
    /// the queue open once the hub drops the client.
    pub replies: mpsc::WeakSender<OutboundFrame>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_generation() {
        let id1 = ClientId::generate();
        let id2 = ClientId::generate();
        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with("conn_"));
    }

    #[test]
    fn test_room_set_shared_between_halves() {
        let (handle, endpoint) = ClientHandle::new("user-1", 4);
        assert!(handle.rooms().insert("c1".to_string()));
        assert!(endpoint.rooms.contains("c1"));

        assert!(handle.rooms().remove("c1"));
        assert!(!endpoint.rooms.contains("c1"));
        assert!(endpoint.rooms.is_empty());
    }

    #[tokio::test]
    async fn test_dropping_handle_closes_queue() {
        let (handle, mut endpoint) = ClientHandle::new("user-1", 4);
        handle.try_send(Arc::from("hello")).unwrap();
        drop(handle);

        assert_eq!(endpoint.outbound.recv().await.as_deref(), Some("hello"));
        assert!(endpoint.outbound.recv().await.is_none());
        assert!(endpoint.replies.upgrade().is_none());
    }

    #[test]
    fn test_try_send_reports_full_queue() {
        let (handle, _endpoint) = ClientHandle::new("user-1", 1);
        handle.try_send(Arc::from("one")).unwrap();
        assert!(matches!(
            handle.try_send(Arc::from("two")),
            Err(TrySendError::Full(_))
        ));
    }
}
