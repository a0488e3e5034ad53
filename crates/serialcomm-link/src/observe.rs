//! Link event observation.
//!
//! The receive loop and the sender report what happens on the link through a
//! [`LinkObserver`]. [`TracingObserver`] turns events into `tracing` records
//! and is the default.

use std::io;
use std::time::Duration;

use serialcomm_frame::{Feedback, FrameError};
use tracing::{debug, info, warn};

use crate::error::AttemptFailure;

/// Observer of link events. Every method defaults to a no-op.
pub trait LinkObserver: Send {
    /// A frame passed every check and was delivered.
    fn frame_accepted(&mut self) {}

    /// A frame attempt was discarded.
    fn frame_rejected(&mut self, reason: &FrameError) {
        let _ = reason;
    }

    /// A feedback token was written.
    fn feedback_sent(&mut self, token: Feedback) {
        let _ = token;
    }

    /// A feedback token could not be written.
    fn feedback_failed(&mut self, token: Feedback, err: &FrameError) {
        let _ = (token, err);
    }

    /// A transport read failed.
    fn transport_error(&mut self, err: &io::Error) {
        let _ = err;
    }

    /// A send attempt is starting.
    fn send_attempt(&mut self, attempt: u32, max_attempts: u32, payload_len: usize) {
        let _ = (attempt, max_attempts, payload_len);
    }

    /// A send attempt ended without `OK`.
    fn attempt_failed(&mut self, attempt: u32, failure: &AttemptFailure) {
        let _ = (attempt, failure);
    }

    /// The sender read back a token.
    fn feedback_received(&mut self, token: Feedback, elapsed: Duration) {
        let _ = (token, elapsed);
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl LinkObserver for NoopObserver {}

/// Emits every event as a `tracing` record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl LinkObserver for TracingObserver {
    fn frame_accepted(&mut self) {
        debug!("frame accepted");
    }

    fn frame_rejected(&mut self, reason: &FrameError) {
        warn!(reason = reason.label(), error = %reason, "frame rejected");
    }

    fn feedback_sent(&mut self, token: Feedback) {
        debug!(%token, "feedback sent");
    }

    fn feedback_failed(&mut self, token: Feedback, err: &FrameError) {
        warn!(%token, error = %err, "failed to write feedback");
    }

    fn transport_error(&mut self, err: &io::Error) {
        warn!(error = %err, "transport read failed");
    }

    fn send_attempt(&mut self, attempt: u32, max_attempts: u32, payload_len: usize) {
        info!(attempt, max_attempts, payload_len, "sending frame");
    }

    fn attempt_failed(&mut self, attempt: u32, failure: &AttemptFailure) {
        warn!(attempt, error = %failure, "send attempt failed");
    }

    fn feedback_received(&mut self, token: Feedback, elapsed: Duration) {
        debug!(%token, elapsed_ms = elapsed.as_millis() as u64, "feedback received");
    }
}

impl<O: LinkObserver + ?Sized> LinkObserver for Box<O> {
    fn frame_accepted(&mut self) {
        (**self).frame_accepted()
    }

    fn frame_rejected(&mut self, reason: &FrameError) {
        (**self).frame_rejected(reason)
    }

    fn feedback_sent(&mut self, token: Feedback) {
        (**self).feedback_sent(token)
    }

    fn feedback_failed(&mut self, token: Feedback, err: &FrameError) {
        (**self).feedback_failed(token, err)
    }

    fn transport_error(&mut self, err: &io::Error) {
        (**self).transport_error(err)
    }

    fn send_attempt(&mut self, attempt: u32, max_attempts: u32, payload_len: usize) {
        (**self).send_attempt(attempt, max_attempts, payload_len)
    }

    fn attempt_failed(&mut self, attempt: u32, failure: &AttemptFailure) {
        (**self).attempt_failed(attempt, failure)
    }

    fn feedback_received(&mut self, token: Feedback, elapsed: Duration) {
        (**self).feedback_received(token, elapsed)
    }
}
