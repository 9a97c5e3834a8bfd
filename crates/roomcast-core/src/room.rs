//! Room abstraction for Roomcast.
//!
//! A room is the set of connections currently subscribed to one chat. Rooms
//! live only in the hub's index and disappear with their last subscriber.

use crate::client::ClientId;
use std::collections::HashSet;
use tracing::debug;

/// A room identifier (the chat id).
pub type RoomId = String;

/// A fan-out target for one chat.
#[derive(Debug)]
pub struct Room {
    /// Room name.
    id: RoomId,
    /// Subscribed connections.
    subscribers: HashSet<ClientId>,
}

impl Room {
    /// Create a new, empty room.
    #[must_use]
    pub fn new(id: impl Into<RoomId>) -> Self {
        Self {
            id: id.into(),
            subscribers: HashSet::new(),
        }
    }

    /// Get the room id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Check if a connection is subscribed.
    #[must_use]
    pub fn is_subscribed(&self, client: &ClientId) -> bool {
        self.subscribers.contains(client)
    }

    /// Add a subscriber.
    ///
    /// Returns `true` if the connection was not already subscribed.
    pub fn subscribe(&mut self, client: ClientId) -> bool {
        let added = self.subscribers.insert(client);
        if added {
            debug!(room = %self.id, subscribers = self.subscribers.len(), "Client joined room");
        }
        added
    }

    /// Remove a subscriber.
    ///
    /// Returns `true` if the connection was subscribed.
    pub fn unsubscribe(&mut self, client: &ClientId) -> bool {
        let removed = self.subscribers.remove(client);
        if removed {
            debug!(room = %self.id, subscribers = self.subscribers.len(), "Client left room");
        }
        removed
    }

    /// Iterate over subscriber ids.
    pub fn subscribers(&self) -> impl Iterator<Item = &ClientId> {
        self.subscribers.iter()
    }

    /// Check if the room has no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
