//! Frame types for the Roomcast protocol.
//!
//! The relay never looks inside `data` or `iv`: they carry ciphertext and its
//! initialization vector, and are persisted and forwarded byte for byte.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A chat message sent by a client into one of its rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFrame {
    /// Target room (chat) id.
    pub room: String,
    /// Opaque message content.
    pub data: String,
    /// Opaque initialization vector.
    pub iv: String,
}

impl ChatFrame {
    /// Create a new chat frame.
    #[must_use]
    pub fn new(room: impl Into<String>, data: impl Into<String>, iv: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            data: data.into(),
            iv: iv.into(),
        }
    }
}

/// A message as persisted by the message store.
///
/// This is the frame every subscriber of `chat_id` receives once the store
/// has accepted the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    /// Store-generated message id.
    pub id: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Opaque message content.
    pub content: String,
    /// Opaque initialization vector.
    pub iv: String,
    /// Room the message was sent to.
    pub chat_id: String,
    /// Authenticated sender.
    pub sender_id: String,
}

/// Error categories reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The frame could not be decoded.
    #[serde(rename = "Bad Request")]
    BadRequest,
    /// The frame exceeded the maximum message size.
    #[serde(rename = "Payload Too Large")]
    PayloadTooLarge,
    /// The client wrote into a room it is not a member of.
    #[serde(rename = "Unauthorized")]
    Unauthorized,
    /// Room memberships could not be loaded for the user.
    #[serde(rename = "User not found")]
    UserNotFound,
    /// Persistence or another server-side step failed.
    #[serde(rename = "Internal Server Error")]
    Internal,
}

impl ErrorKind {
    /// The category string sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "Bad Request",
            ErrorKind::PayloadTooLarge => "Payload Too Large",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::UserNotFound => "User not found",
            ErrorKind::Internal => "Internal Server Error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error response sent to a single client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    /// Error category.
    pub error: ErrorKind,
    /// Optional human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorFrame {
    /// Create an error frame without details.
    #[must_use]
    pub fn new(error: ErrorKind) -> Self {
        Self {
            error,
            details: None,
        }
    }

    /// Attach a detail message.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// A `Bad Request` frame for input that failed to decode.
    #[must_use]
    pub fn bad_request(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest).with_details(details)
    }

    /// A `Payload Too Large` frame.
    #[must_use]
    pub fn too_large(size: usize, max: usize) -> Self {
        Self::new(ErrorKind::PayloadTooLarge)
            .with_details(format!("Message of {size} bytes exceeds the {max} byte limit"))
    }

    /// An `Unauthorized` frame for a write into a foreign room.
    #[must_use]
    pub fn unauthorized(room: &str) -> Self {
        Self::new(ErrorKind::Unauthorized)
            .with_details(format!("You cannot write into room: {room}"))
    }

    /// A `User not found` frame for a failed membership lookup.
    #[must_use]
    pub fn user_not_found(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::UserNotFound).with_details(details)
    }

    /// An `Internal Server Error` frame.
    #[must_use]
    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_details(details)
    }
}

/// Any frame the server may send.
///
/// Used by clients (tests, load tools) to tell records from errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    /// A persisted chat message.
    Message(StoredMessage),
    /// An error report.
    Error(ErrorFrame),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_kind_wire_names() {
        for kind in [
            ErrorKind::BadRequest,
            ErrorKind::PayloadTooLarge,
            ErrorKind::Unauthorized,
            ErrorKind::UserNotFound,
            ErrorKind::Internal,
        ] {
            let value = serde_json::to_value(kind).unwrap();
            assert_eq!(value, json!(kind.as_str()));
        }
    }

    #[test]
    fn test_error_frame_omits_empty_details() {
        let value = serde_json::to_value(ErrorFrame::new(ErrorKind::Internal)).unwrap();
        assert_eq!(value, json!({"error": "Internal Server Error"}));

        let value = serde_json::to_value(ErrorFrame::unauthorized("c2")).unwrap();
        assert_eq!(
            value,
            json!({"error": "Unauthorized", "details": "You cannot write into room: c2"})
        );
    }

    #[test]
    fn test_stored_message_uses_camel_case() {
        let now = Utc::now();
        let message = StoredMessage {
            id: "m1".into(),
            created_at: now,
            updated_at: now,
            content: "Y2lwaGVy".into(),
            iv: "aXZ2YWx1ZQ==".into(),
            chat_id: "c1".into(),
            sender_id: "u1".into(),
        };

        let value = serde_json::to_value(&message).unwrap();
        let object = value.as_object().unwrap();
        for key in ["id", "createdAt", "updatedAt", "content", "iv", "chatId", "senderId"] {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert_eq!(object.len(), 7);
    }

    #[test]
    fn test_server_frame_distinguishes_errors() {
        let frame: ServerFrame =
            serde_json::from_str(r#"{"error":"Bad Request","details":"nope"}"#).unwrap();
        assert_eq!(frame, ServerFrame::Error(ErrorFrame::bad_request("nope")));
    }
}
