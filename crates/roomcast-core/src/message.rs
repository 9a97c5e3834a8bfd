//! Internal message types for Roomcast.
//!
//! These types carry a chat message from a client's read task to the hub.

use crate::client::ClientId;
use crate::room::RoomId;
use crate::store::UserId;
use roomcast_protocol::ChatFrame;

/// A chat message that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Target room.
    pub room: RoomId,
    /// Authenticated sender.
    pub sender: UserId,
    /// Opaque content.
    pub content: String,
    /// Opaque initialization vector.
    pub iv: String,
}

impl NewMessage {
    /// Create a new message.
    #[must_use]
    pub fn new(
        room: impl Into<RoomId>,
        sender: impl Into<UserId>,
        content: impl Into<String>,
        iv: impl Into<String>,
    ) -> Self {
        Self {
            room: room.into(),
            sender: sender.into(),
            content: content.into(),
            iv: iv.into(),
        }
    }

    /// Tag a decoded frame with its sender.
    #[must_use]
    pub fn from_frame(frame: ChatFrame, sender: impl Into<UserId>) -> Self {
        Self {
            room: frame.room,
            sender: sender.into(),
            content: frame.data,
            iv: frame.iv,
        }
    }
}

/// A broadcast request handed to the hub.
#[derive(Debug, Clone)]
pub struct Broadcast {
    /// Connection the message came from; errors are reported here only.
    pub origin: ClientId,
    /// The message to persist and fan out.
    pub message: NewMessage,
}

impl Broadcast {
    /// Create a new broadcast request.
    #[must_use]
    pub fn new(origin: ClientId, message: NewMessage) -> Self {
        Self { origin, message }
    }
}
