use std::convert::Infallible;
use std::time::Instant;

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

use crate::checksum::checksum;
use crate::codec::{FrameConfig, CHECKSUM_SIZE, LENGTH_PREFIX_SIZE, TERMINATOR};
use crate::error::{DecodeError, FrameError};
use crate::feedback::Feedback;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Turns a checked payload into an application item.
pub trait Decoder {
    type Item;
    type Error: Into<DecodeError>;

    fn decode(&self, payload: Bytes) -> Result<Self::Item, Self::Error>;
}

/// Passes payload bytes through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDecoder;

impl Decoder for RawDecoder {
    type Item = Bytes;
    type Error = Infallible;

    fn decode(&self, payload: Bytes) -> Result<Bytes, Infallible> {
        Ok(payload)
    }
}

/// Where the reassembler is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Waiting for the 4-byte length prefix.
    WaitLength,
    /// Length known; waiting for payload, checksum and terminator.
    WaitPayload { expected_length: u32 },
}

/// Outcome of a terminal transition.
#[derive(Debug)]
pub enum Verdict<T> {
    /// A frame passed every check and decoded.
    Accept(T),
    /// The pending bytes were discarded.
    Reject(FrameError),
}

impl<T> Verdict<T> {
    /// The token the peer should receive for this outcome.
    pub fn feedback(&self) -> Feedback {
        match self {
            Verdict::Accept(_) => Feedback::Ok,
            Verdict::Reject(_) => Feedback::Retry,
        }
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept(_))
    }
}

/// Receive-side frame state machine.
///
/// Bytes go in through [`feed`](Self::feed); [`advance`](Self::advance) and
/// [`idle_check`](Self::idle_check) report at most one terminal [`Verdict`]
/// per call. Every rejection empties the buffer. An accepted frame removes
/// only its own bytes, so a following frame that arrived in the same read
/// stays buffered.
///
/// No I/O happens here: the caller writes the feedback token for each verdict.
#[derive(Debug)]
pub struct Reassembler<D = RawDecoder> {
    buf: BytesMut,
    expected_length: Option<u32>,
    last_activity: Instant,
    config: FrameConfig,
    decoder: D,
}

impl Reassembler<RawDecoder> {
    /// Reassembler yielding raw payload bytes.
    pub fn new(config: FrameConfig) -> Self {
        Self::with_decoder(config, RawDecoder)
    }
}

impl<D: Decoder> Reassembler<D> {
    pub fn with_decoder(config: FrameConfig, decoder: D) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            expected_length: None,
            last_activity: Instant::now(),
            config,
            decoder,
        }
    }

    /// Append received bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.feed_at(bytes, Instant::now());
    }

    /// Append received bytes that arrived at `now`.
    pub fn feed_at(&mut self, bytes: &[u8], now: Instant) {
        if bytes.is_empty() {
            return;
        }
        self.buf.extend_from_slice(bytes);
        self.last_activity = now;
    }

    /// Make as much progress as buffered bytes allow.
    ///
    /// Returns `None` when more input is needed, otherwise the first terminal
    /// verdict reached. Call again after an `Accept` to pick up a frame that
    /// followed in the same read.
    pub fn advance(&mut self) -> Option<Verdict<D::Item>> {
        loop {
            let Some(expected_length) = self.expected_length else {
                if self.buf.len() < LENGTH_PREFIX_SIZE {
                    return None;
                }
                let length = self.buf.get_u32();
                if length == 0 || length > self.config.max_frame_length {
                    return Some(self.reject(FrameError::InvalidLength {
                        length,
                        max: self.config.max_frame_length,
                    }));
                }
                trace!(length, "frame length prefix");
                self.expected_length = Some(length);
                continue;
            };

            let length = expected_length as usize;
            let needed = length + CHECKSUM_SIZE + usize::from(self.config.require_terminator);
            if self.buf.len() < needed {
                return None;
            }

            let payload = self.buf.split_to(length).freeze();
            let received = self.buf.get_u16();
            let computed = checksum(&payload);
            if received != computed {
                return Some(self.reject(FrameError::ChecksumMismatch { received, computed }));
            }

            if self.config.require_terminator {
                let found = self.buf.get_u8();
                if found != TERMINATOR {
                    return Some(self.reject(FrameError::MissingTerminator { found }));
                }
            }

            return Some(match self.decoder.decode(payload) {
                Ok(item) => {
                    self.expected_length = None;
                    Verdict::Accept(item)
                }
                Err(err) => self.reject(FrameError::Decode(err.into())),
            });
        }
    }

    /// Abandon a partial frame that has not grown for longer than the inactivity timeout.
    pub fn idle_check(&mut self, now: Instant) -> Option<Verdict<D::Item>> {
        if !self.has_partial_frame() {
            return None;
        }
        let idle = now.saturating_duration_since(self.last_activity);
        if idle <= self.config.inactivity_timeout {
            return None;
        }
        let buffered = self.pending_bytes();
        Some(self.reject(FrameError::InactivityTimeout { idle, buffered }))
    }

    /// Whether any bytes of an unfinished frame are held.
    pub fn has_partial_frame(&self) -> bool {
        !self.buf.is_empty() || self.expected_length.is_some()
    }

    pub fn state(&self) -> State {
        match self.expected_length {
            None => State::WaitLength,
            Some(expected_length) => State::WaitPayload { expected_length },
        }
    }

    /// Bytes currently buffered (the length prefix of a frame in `WaitPayload` is already consumed).
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn expected_length(&self) -> Option<u32> {
        self.expected_length
    }

    /// Drop everything buffered and return to `WaitLength`.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.expected_length = None;
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    fn pending_bytes(&self) -> usize {
        let prefix = if self.expected_length.is_some() {
            LENGTH_PREFIX_SIZE
        } else {
            0
        };
        self.buf.len() + prefix
    }

    fn reject(&mut self, err: FrameError) -> Verdict<D::Item> {
        trace!(reason = err.label(), pending = self.pending_bytes(), "frame rejected");
        self.reset();
        Verdict::Reject(err)
    }
}
