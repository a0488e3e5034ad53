use std::time::Duration;

use serialcomm_frame::FrameError;
use serialcomm_transport::TransportError;

/// Errors that can occur in link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The message payload field is not valid base64.
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Every send attempt ended without an `OK`.
    #[error("delivery failed after {attempts} attempts: {last}")]
    DeliveryFailed { attempts: u32, last: AttemptFailure },

    /// The receiver worker thread could not be started.
    #[error("failed to spawn receiver worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The receiver worker thread panicked.
    #[error("receiver worker panicked")]
    WorkerPanicked,
}

/// Why a single send attempt did not end in `OK`.
#[derive(Debug, thiserror::Error)]
pub enum AttemptFailure {
    /// The receiver answered `RETRY`.
    #[error("peer requested retransmission")]
    Rejected,

    /// The receiver answered with bytes that are not a feedback token.
    #[error("unrecognized feedback {0:?}")]
    Unrecognized(String),

    /// Nothing came back within the feedback timeout.
    #[error("no feedback within {0:?}")]
    TimedOut(Duration),

    /// Writing the frame or reading the feedback failed.
    #[error("transport failure: {0}")]
    Transport(#[from] FrameError),
}

pub type Result<T> = std::result::Result<T, LinkError>;
