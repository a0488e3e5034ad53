use std::time::Duration;

use bytes::{BufMut, BytesMut};

use crate::checksum::checksum;
use crate::error::{FrameError, Result};

/// Length prefix: 4-byte big-endian payload length.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Trailing CRC-16/MODBUS, big-endian.
pub const CHECKSUM_SIZE: usize = 2;

/// Marker byte written right after the checksum.
pub const TERMINATOR: u8 = b'\n';

/// Default maximum payload length accepted on either side: 4 KiB.
pub const DEFAULT_MAX_FRAME_LENGTH: u32 = 4 * 1024;

/// Default payload slice written per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 20;

/// Default pause between payload chunks.
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(50);

/// Default age after which a partial frame is abandoned.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Total bytes a payload of `payload_len` occupies on the wire.
pub fn wire_size(payload_len: usize) -> usize {
    LENGTH_PREFIX_SIZE + payload_len + CHECKSUM_SIZE + 1
}

/// Validate a payload length against `max_frame_length` and return it as the wire prefix.
pub fn check_payload_len(len: usize, max_frame_length: u32) -> Result<u32> {
    if len == 0 {
        return Err(FrameError::EmptyPayload);
    }
    match u32::try_from(len) {
        Ok(length) if length <= max_frame_length => Ok(length),
        _ => Err(FrameError::PayloadTooLarge {
            size: len,
            max: max_frame_length,
        }),
    }
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬─────────────────┬──────────────┬────────────┐
/// │ Length       │ Payload         │ CRC-16       │ Terminator │
/// │ (4B BE)      │ (Length bytes)  │ MODBUS (2B)  │ 0x0A       │
/// └──────────────┴─────────────────┴──────────────┴────────────┘
/// ```
///
/// The checksum covers the payload alone.
pub fn encode_frame(payload: &[u8], max_frame_length: u32, dst: &mut BytesMut) -> Result<()> {
    let length = check_payload_len(payload.len(), max_frame_length)?;
    dst.reserve(wire_size(payload.len()));
    dst.put_u32(length);
    dst.put_slice(payload);
    dst.put_u16(checksum(payload));
    dst.put_u8(TERMINATOR);
    Ok(())
}

/// Configuration shared by the frame writer and the reassembler.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest payload accepted or sent. Default: 4 KiB.
    pub max_frame_length: u32,
    /// Whether the reassembler insists on [`TERMINATOR`] after the checksum. Default: true.
    pub require_terminator: bool,
    /// Payload bytes written per chunk. Default: 20.
    pub chunk_size: usize,
    /// Pause between chunks, for receivers with small UART buffers. Default: 50 ms.
    pub chunk_delay: Duration,
    /// How long a partial frame may wait for more bytes. Default: 5 s.
    pub inactivity_timeout: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            require_terminator: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay: DEFAULT_CHUNK_DELAY,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
        }
    }
}
