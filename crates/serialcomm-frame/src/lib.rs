//! Length-prefixed, checksummed framing for serial links.
//!
//! Every payload travels as:
//! - a 4-byte big-endian payload length
//! - the payload itself
//! - a 2-byte big-endian CRC-16/MODBUS of the payload
//! - a `\n` terminator
//!
//! The receiving side is an explicit state machine ([`Reassembler`]) that is
//! fed raw bytes and reports one verdict per frame attempt. Each verdict maps
//! to a feedback token (`OK` / `RETRY`) for the sender.

pub mod checksum;
pub mod codec;
pub mod error;
pub mod feedback;
pub mod reassembler;
pub mod writer;

pub use checksum::{checksum, Crc16Modbus};
pub use codec::{
    encode_frame, wire_size, FrameConfig, CHECKSUM_SIZE, DEFAULT_CHUNK_DELAY, DEFAULT_CHUNK_SIZE,
    DEFAULT_INACTIVITY_TIMEOUT, DEFAULT_MAX_FRAME_LENGTH, LENGTH_PREFIX_SIZE, TERMINATOR,
};
pub use error::{DecodeError, FrameError, Result};
pub use feedback::{Feedback, TokenMatch};
pub use reassembler::{Decoder, RawDecoder, Reassembler, State, Verdict};
pub use writer::FrameWriter;
