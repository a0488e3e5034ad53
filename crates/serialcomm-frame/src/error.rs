use std::time::Duration;

/// Boxed error produced by a payload [`crate::Decoder`].
pub type DecodeError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during frame encoding, reassembly and writing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The length prefix is zero or above the configured maximum.
    #[error("invalid frame length {length} (must be 1..={max})")]
    InvalidLength { length: u32, max: u32 },

    /// The checksum carried by the frame does not match its payload.
    #[error("checksum mismatch (received {received:#06x}, computed {computed:#06x})")]
    ChecksumMismatch { received: u16, computed: u16 },

    /// The byte following the checksum is not the frame terminator.
    #[error("missing frame terminator (found {found:#04x})")]
    MissingTerminator { found: u8 },

    /// The payload passed integrity checks but could not be decoded.
    #[error("payload decode failed: {0}")]
    Decode(#[source] DecodeError),

    /// A partial frame sat in the buffer longer than the inactivity timeout.
    #[error("inactivity timeout after {idle:?} with {buffered} bytes pending")]
    InactivityTimeout { idle: Duration, buffered: usize },

    /// Refused to send an empty payload.
    #[error("empty payload")]
    EmptyPayload,

    /// The payload exceeds the configured maximum frame length.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: u32 },

    /// An I/O error occurred while writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream accepted zero bytes mid-frame.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Short machine-friendly label, used in log fields.
    pub fn label(&self) -> &'static str {
        match self {
            FrameError::InvalidLength { .. } => "invalid_length",
            FrameError::ChecksumMismatch { .. } => "checksum_mismatch",
            FrameError::MissingTerminator { .. } => "missing_terminator",
            FrameError::Decode(_) => "decode_failed",
            FrameError::InactivityTimeout { .. } => "inactivity_timeout",
            FrameError::EmptyPayload => "empty_payload",
            FrameError::PayloadTooLarge { .. } => "payload_too_large",
            FrameError::Io(_) => "io",
            FrameError::ConnectionClosed => "connection_closed",
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
