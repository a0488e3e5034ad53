//! Acknowledged JSON event delivery over a framed serial link.
//!
//! Builds on `serialcomm-frame` and `serialcomm-transport`:
//! - [`Receiver`] / [`ReceiveLoop`]: reassemble frames, deliver each accepted
//!   [`Message`] exactly once, and answer every frame attempt with `OK` or `RETRY`
//! - [`Sender`]: transmit a payload in paced chunks and retransmit until `OK`
//!   or the attempt budget is spent
//!
//! ```no_run
//! use serialcomm_link::{LinkConfig, Message, Receiver, Sender};
//!
//! # fn main() -> serialcomm_link::Result<()> {
//! let config = LinkConfig {
//!     port: "/dev/ttyUSB0".into(),
//!     ..LinkConfig::default()
//! };
//!
//! let receiver = Receiver::start(&config, |msg: Message| println!("{}", msg.correlation_id))?;
//!
//! let mut sender = Sender::open(&LinkConfig {
//!     port: "/dev/ttyUSB1".into(),
//!     ..config
//! })?;
//! let report = sender.send_message(&Message::sample())?;
//! println!("delivered after {} attempt(s)", report.attempts);
//!
//! receiver.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod deliver;
pub mod error;
pub mod message;
pub mod observe;
pub mod port;
pub mod receiver;
pub mod sender;

pub use config::{LinkConfig, DEFAULT_PORT};
pub use deliver::{ChannelDelivery, Deliver};
pub use error::{AttemptFailure, LinkError, Result};
pub use message::{Event, JsonDecoder, Message, MessageDecoder, Payload, Reading};
pub use observe::{LinkObserver, NoopObserver, TracingObserver};
pub use port::open_port;
pub use receiver::{ReceiveLoop, Receiver};
pub use sender::{SendReport, Sender};
