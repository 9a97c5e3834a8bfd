//! Codec for encoding and decoding Roomcast frames.
//!
//! Frames are plain JSON documents, one per WebSocket message. Inbound frames
//! are size-checked before they are parsed.

use serde::Serialize;
use thiserror::Error;

use crate::frames::{ChatFrame, ServerFrame};

/// Default maximum inbound frame size (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {size} exceeds maximum {max}")]
    FrameTooLarge {
        /// Size of the offending frame.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode any outbound frame as a JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode<T: Serialize>(frame: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode an inbound chat frame using the default size limit.
///
/// # Errors
///
/// Returns an error if the data is too large or is not a valid chat frame.
pub fn decode(data: &[u8]) -> Result<ChatFrame, ProtocolError> {
    FrameCodec::default().decode(data)
}

/// Decode a frame sent by the server.
///
/// # Errors
///
/// Returns an error if the text is neither a stored message nor an error frame.
pub fn decode_server(text: &str) -> Result<ServerFrame, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// Codec carrying the per-connection frame size limit.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a codec with a custom size limit.
    #[must_use]
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// The configured size limit.
    #[must_use]
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Check a raw frame against the size limit.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FrameTooLarge`] if `len` exceeds the limit.
    pub fn check_size(&self, len: usize) -> Result<(), ProtocolError> {
        if len > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }

    /// Decode an inbound chat frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is too large, is not JSON, or lacks one
    /// of `room`, `data` and `iv`.
    pub fn decode(&self, data: &[u8]) -> Result<ChatFrame, ProtocolError> {
        self.check_size(data.len())?;
        Ok(serde_json::from_slice(data)?)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}
