//! Byte-stream transport for serial links.
//!
//! Provides one stream type over the two endpoints the link layer runs on:
//! - tty devices (`/dev/ttyUSB0`, `/dev/ttyS1`, ...) configured raw 8N1 via termios
//! - in-process socket pairs, used for loopback runs and tests
//!
//! This is the lowest layer of serialcomm. Reads are timeout-bounded and may
//! legitimately return zero bytes; everything above treats that as "no data yet".

#[cfg(not(unix))]
compile_error!("serialcomm-transport drives termios devices and Unix socket pairs; only Unix targets are supported");

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod tty;

pub use error::{Result, TransportError};
pub use traits::{SerialIo, SerialStream};

#[cfg(unix)]
pub use tty::{speed_for, DEFAULT_BAUD_RATE, SUPPORTED_BAUD_RATES};
