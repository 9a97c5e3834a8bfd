//! Transport errors.

use roomcast_core::HubError;
use thiserror::Error;

/// Reasons a client connection ends.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No frame arrived within the idle deadline.
    #[error("Connection timed out")]
    Timeout,

    /// A write did not complete within the write deadline.
    #[error("Write timed out")]
    WriteTimeout,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// The hub is gone.
    #[error("Hub error: {0}")]
    Hub(#[from] HubError),
}

impl TransportError {
    /// Short label for metrics and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Timeout => "idle_timeout",
            TransportError::WriteTimeout => "write_timeout",
            TransportError::SendFailed(_) => "send",
            TransportError::ReceiveFailed(_) => "receive",
            TransportError::Hub(_) => "hub",
        }
    }
}
