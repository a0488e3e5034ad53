use std::path::PathBuf;
use std::time::Duration;

use serialcomm_frame::{
    FrameConfig, DEFAULT_CHUNK_DELAY, DEFAULT_CHUNK_SIZE, DEFAULT_INACTIVITY_TIMEOUT,
    DEFAULT_MAX_FRAME_LENGTH,
};
use serialcomm_transport::DEFAULT_BAUD_RATE;

use crate::error::{LinkError, Result};

/// Default serial device.
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Everything one end of a link needs to know.
///
/// The delivery callback is passed alongside this when a receiver is started.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Serial device path.
    pub port: PathBuf,
    /// Line rate in bits per second. Default: 115200.
    pub baud_rate: u32,
    /// Upper bound on a single transport read. Default: 300 ms.
    pub read_timeout: Duration,
    /// Upper bound on a single transport write, feedback tokens included. Default: 1 s.
    pub write_timeout: Duration,
    /// Largest payload accepted or sent. Default: 4 KiB.
    pub max_frame_length: u32,
    /// Age at which a partial frame is abandoned. Default: 5 s.
    pub inactivity_timeout: Duration,
    /// Payload bytes per written chunk. Default: 20.
    pub chunk_size: usize,
    /// Pause between written chunks. Default: 50 ms.
    pub chunk_delay: Duration,
    /// Frame transmissions before giving up. Default: 3.
    pub max_send_attempts: u32,
    /// How long the sender waits for a token after each attempt. Default: 3 s.
    pub feedback_timeout: Duration,
    /// Receiver back-off after a read that produced no data. Default: 10 ms.
    pub idle_tick: Duration,
    /// Require the `\n` terminator after the checksum. Default: true.
    pub require_terminator: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: PathBuf::from(DEFAULT_PORT),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(300),
            write_timeout: Duration::from_secs(1),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay: DEFAULT_CHUNK_DELAY,
            max_send_attempts: 3,
            feedback_timeout: Duration::from_secs(3),
            idle_tick: Duration::from_millis(10),
            require_terminator: true,
        }
    }
}

impl LinkConfig {
    /// Reject values the protocol cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_length == 0 {
            return Err(LinkError::InvalidConfig(
                "max_frame_length must be greater than zero".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(LinkError::InvalidConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.max_send_attempts == 0 {
            return Err(LinkError::InvalidConfig(
                "max_send_attempts must be at least 1".to_string(),
            ));
        }
        if self.read_timeout.is_zero() || self.write_timeout.is_zero() {
            return Err(LinkError::InvalidConfig(
                "read and write timeouts must be greater than zero".to_string(),
            ));
        }
        if self.feedback_timeout.is_zero() {
            return Err(LinkError::InvalidConfig(
                "feedback_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The framing subset of this configuration.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_frame_length: self.max_frame_length,
            require_terminator: self.require_terminator,
            chunk_size: self.chunk_size,
            chunk_delay: self.chunk_delay,
            inactivity_timeout: self.inactivity_timeout,
        }
    }
}
