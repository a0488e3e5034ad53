//! Acknowledged JSON event delivery over serial links.
//!
//! serialcomm moves JSON device events across a UART (or anything that looks
//! like one) as length-prefixed, CRC-16/MODBUS checked frames. The receiver
//! answers every frame with `OK` or `RETRY`; the sender retransmits until it
//! sees `OK` or runs out of attempts.
//!
//! # Crate Structure
//!
//! - [`transport`]: tty devices and socket pairs with bounded reads and writes
//! - [`frame`]: checksum, wire codec, feedback tokens and the reassembly state machine
//! - [`link`]: message schema, receiver and sender (behind the `link` feature)

/// Re-export transport types.
pub mod transport {
    pub use serialcomm_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use serialcomm_frame::*;
}

/// Re-export link types (requires `link` feature).
#[cfg(feature = "link")]
pub mod link {
    pub use serialcomm_link::*;
}
