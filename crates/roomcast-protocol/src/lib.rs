//! # roomcast-protocol
//!
//! Wire protocol definitions for the Roomcast chat relay.
//!
//! Every frame on the socket is a JSON text message. Clients send one kind of
//! frame, the [`ChatFrame`]; the server answers with either a persisted
//! [`StoredMessage`] or an [`ErrorFrame`].
//!
//! ## Frame Types
//!
//! - `ChatFrame` - `{"room", "data", "iv"}` sent by a client
//! - `StoredMessage` - the persisted record fanned out to a room
//! - `ErrorFrame` - `{"error", "details"}` reported to a single client
//!
//! ## Example
//!
//! ```rust
//! use roomcast_protocol::{codec, ChatFrame};
//!
//! let frame = codec::decode(br#"{"room":"c1","data":"Y2lwaGVy","iv":"aXY="}"#).unwrap();
//! assert_eq!(frame, ChatFrame::new("c1", "Y2lwaGVy", "aXY="));
//! ```

pub mod codec;
pub mod frames;

pub use codec::{decode, encode, FrameCodec, ProtocolError, MAX_FRAME_SIZE};
pub use frames::{ChatFrame, ErrorFrame, ErrorKind, ServerFrame, StoredMessage};
