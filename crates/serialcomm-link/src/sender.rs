use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use serialcomm_frame::codec::check_payload_len;
use serialcomm_frame::{Feedback, FrameError, FrameWriter, TokenMatch};
use serialcomm_transport::SerialIo;
use tracing::{debug, info};

use crate::config::LinkConfig;
use crate::error::{AttemptFailure, LinkError, Result};
use crate::message::Message;
use crate::observe::{LinkObserver, TracingObserver};
use crate::port::{open_port, prepare};

const FEEDBACK_READ_SIZE: usize = 64;
const FEEDBACK_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of a delivered payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    /// Transmissions used, including the one that was acknowledged.
    pub attempts: u32,
    /// Time from the first byte written to the `OK` read back.
    pub elapsed: Duration,
}

/// The transmit side of a link.
///
/// Sends one frame at a time and waits for its feedback token before
/// returning. A frame answered with `RETRY`, with unrecognised bytes, or not
/// at all is transmitted again, up to `max_send_attempts` times in total.
pub struct Sender<T, O = TracingObserver> {
    writer: FrameWriter<T>,
    observer: O,
    max_attempts: u32,
    feedback_timeout: Duration,
}

impl<T: SerialIo> Sender<T> {
    /// Wrap `transport`, applying the configured read and write timeouts.
    ///
    /// The feedback wait only checks its deadline between reads, so the
    /// transport must not block indefinitely.
    pub fn new(mut transport: T, config: &LinkConfig) -> Result<Self> {
        prepare(&mut transport, config)?;
        Ok(Self {
            writer: FrameWriter::with_config(transport, config.frame_config()),
            observer: TracingObserver,
            max_attempts: config.max_send_attempts.max(1),
            feedback_timeout: config.feedback_timeout,
        })
    }
}

impl Sender<serialcomm_transport::SerialStream> {
    /// Open the configured port for sending.
    pub fn open(config: &LinkConfig) -> Result<Self> {
        config.validate()?;
        Self::new(open_port(config)?, config)
    }
}

impl<T: SerialIo, O: LinkObserver> Sender<T, O> {
    /// Replace the observer.
    pub fn with_observer<O2: LinkObserver>(self, observer: O2) -> Sender<T, O2> {
        Sender {
            writer: self.writer,
            observer,
            max_attempts: self.max_attempts,
            feedback_timeout: self.feedback_timeout,
        }
    }

    /// Serialize `message` as JSON and send it.
    pub fn send_message(&mut self, message: &Message) -> Result<SendReport> {
        let payload = message.to_json()?;
        self.send(&payload)
    }

    /// Send `payload` until it is acknowledged or attempts run out.
    ///
    /// An empty or oversized payload fails immediately without touching the
    /// transport.
    pub fn send(&mut self, payload: &[u8]) -> Result<SendReport> {
        check_payload_len(payload.len(), self.writer.config().max_frame_length)?;

        let started = Instant::now();
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.observer
                .send_attempt(attempt, self.max_attempts, payload.len());

            let failure = match self.attempt(payload) {
                Ok(()) => {
                    let report = SendReport {
                        attempts: attempt,
                        elapsed: started.elapsed(),
                    };
                    info!(
                        attempts = report.attempts,
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        "payload delivered"
                    );
                    return Ok(report);
                }
                Err(failure) => failure,
            };

            self.observer.attempt_failed(attempt, &failure);
            if attempt >= self.max_attempts {
                return Err(LinkError::DeliveryFailed {
                    attempts: attempt,
                    last: failure,
                });
            }
        }
    }

    pub fn get_ref(&self) -> &T {
        self.writer.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.writer.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.writer.into_inner()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn attempt(&mut self, payload: &[u8]) -> std::result::Result<(), AttemptFailure> {
        // A late token or garbled leftovers from an earlier exchange must not
        // be read as the answer to this frame.
        if let Err(err) = self.writer.get_mut().discard_input() {
            debug!(error = %err, "failed to discard input before sending");
        }
        self.writer.send(payload)?;
        match self.await_feedback()? {
            Feedback::Ok => Ok(()),
            Feedback::Retry => Err(AttemptFailure::Rejected),
        }
    }

    /// Read until the accumulated bytes form a token, stop being a token
    /// prefix, or the feedback timeout elapses.
    fn await_feedback(&mut self) -> std::result::Result<Feedback, AttemptFailure> {
        let started = Instant::now();
        let deadline = started + self.feedback_timeout;
        let mut received = Vec::with_capacity(FEEDBACK_READ_SIZE);
        let mut chunk = [0u8; FEEDBACK_READ_SIZE];

        while Instant::now() < deadline {
            let n = match self.writer.get_mut().read(&mut chunk) {
                Ok(n) => n,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => 0,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(AttemptFailure::Transport(FrameError::Io(err))),
            };
            if n == 0 {
                std::thread::sleep(FEEDBACK_POLL_INTERVAL);
                continue;
            }

            received.extend_from_slice(&chunk[..n]);
            match Feedback::classify(&received) {
                TokenMatch::Complete(token) => {
                    self.observer.feedback_received(token, started.elapsed());
                    return Ok(token);
                }
                TokenMatch::Partial => {}
                TokenMatch::Unrecognized => {
                    return Err(AttemptFailure::Unrecognized(
                        String::from_utf8_lossy(&received).into_owned(),
                    ));
                }
            }
        }
        Err(AttemptFailure::TimedOut(self.feedback_timeout))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{self, Read, Write};

    use serialcomm_frame::{Reassembler, Verdict};
    use serialcomm_transport::SerialStream;

    use super::*;
    use crate::receiver::ReceiveLoop;

    fn fast_config() -> LinkConfig {
        LinkConfig {
            chunk_delay: Duration::ZERO,
            feedback_timeout: Duration::from_millis(50),
            ..LinkConfig::default()
        }
    }

    /// Peer double: each frame written pops the next scripted reply.
    #[derive(Default)]
    struct ScriptedPeer {
        replies: VecDeque<Option<&'static str>>,
        pending: VecDeque<u8>,
        frames: usize,
        written: Vec<u8>,
        discards: usize,
        fail_writes: bool,
    }

    impl ScriptedPeer {
        fn replying(replies: Vec<Option<&'static str>>) -> Self {
            Self {
                replies: replies.into(),
                ..Self::default()
            }
        }
    }

    impl Write for ScriptedPeer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::Error::new(ErrorKind::BrokenPipe, "cable pulled"));
            }
            self.written.extend_from_slice(buf);
            // the checksum and terminator go out as one 3-byte write
            if buf.len() == 3 && buf[2] == serialcomm_frame::TERMINATOR {
                self.frames += 1;
                if let Some(Some(reply)) = self.replies.pop_front() {
                    self.pending.extend(reply.bytes());
                }
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Read for ScriptedPeer {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pending.is_empty() {
                return Err(io::Error::from(ErrorKind::WouldBlock));
            }
            // one byte at a time exercises token accumulation
            buf[0] = self.pending.pop_front().unwrap_or_default();
            Ok(1)
        }
    }

    impl SerialIo for ScriptedPeer {
        fn discard_input(&mut self) -> io::Result<()> {
            self.discards += 1;
            self.pending.clear();
            Ok(())
        }
    }

    #[test]
    fn ok_on_first_attempt() {
        let peer = ScriptedPeer::replying(vec![Some("OK")]);
        let mut sender = Sender::new(peer, &fast_config()).unwrap();
        let report = sender.send(br#"{"a":1}"#).unwrap();
        assert_eq!(report.attempts, 1);
        assert_eq!(sender.get_ref().frames, 1);
    }

    #[test]
    fn ok_on_second_attempt() {
        let peer = ScriptedPeer::replying(vec![Some("RETRY"), Some("OK")]);
        let mut sender = Sender::new(peer, &fast_config()).unwrap();
        let report = sender.send(b"payload").unwrap();
        assert_eq!(report.attempts, 2);
        assert_eq!(sender.get_ref().frames, 2);
        assert_eq!(sender.get_ref().discards, 2);
    }

    #[test]
    fn retransmits_identical_frames() {
        let peer = ScriptedPeer::replying(vec![Some("RETRY"), Some("OK")]);
        let mut sender = Sender::new(peer, &fast_config()).unwrap();
        sender.send(b"same bytes").unwrap();

        let written = &sender.get_ref().written;
        let (first, second) = written.split_at(written.len() / 2);
        assert_eq!(first, second);
    }

    #[test]
    fn all_retry_exhausts_attempts() {
        let peer = ScriptedPeer::replying(vec![Some("RETRY"); 3]);
        let mut sender = Sender::new(peer, &fast_config()).unwrap();
        let err = sender.send(b"payload").unwrap_err();
        assert!(matches!(
            err,
            LinkError::DeliveryFailed {
                attempts: 3,
                last: AttemptFailure::Rejected
            }
        ));
        assert_eq!(sender.get_ref().frames, 3);
    }

    #[test]
    fn silence_times_out_each_attempt() {
        let peer = ScriptedPeer::replying(vec![None, None, None]);
        let mut sender = Sender::new(peer, &fast_config()).unwrap();

        let started = Instant::now();
        let err = sender.send(b"payload").unwrap_err();
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert!(matches!(
            err,
            LinkError::DeliveryFailed {
                attempts: 3,
                last: AttemptFailure::TimedOut(_)
            }
        ));
    }

    #[test]
    fn stale_token_is_not_taken_as_acknowledgement() {
        // An OK left over from an earlier exchange, and no answer to this frame.
        let mut peer = ScriptedPeer::replying(vec![None]);
        peer.pending.extend(b"OK");
        let config = LinkConfig {
            max_send_attempts: 1,
            ..fast_config()
        };
        let mut sender = Sender::new(peer, &config).unwrap();

        let err = sender.send(br#"{"new":1}"#).unwrap_err();
        assert!(matches!(
            err,
            LinkError::DeliveryFailed {
                attempts: 1,
                last: AttemptFailure::TimedOut(_)
            }
        ));
        assert_eq!(sender.get_ref().discards, 1);
    }

    #[test]
    fn feedback_wait_bounded_on_fresh_socket_pair() {
        let config = LinkConfig {
            read_timeout: Duration::from_millis(20),
            max_send_attempts: 1,
            ..fast_config()
        };
        // Neither end has a read timeout until the sender applies one.
        let (near, far) = SerialStream::pair().unwrap();
        let mut sender = Sender::new(near, &config).unwrap();
        assert_eq!(sender.get_ref().read_timeout(), Some(config.read_timeout));

        let started = Instant::now();
        let err = sender.send(b"payload").unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(matches!(
            err,
            LinkError::DeliveryFailed {
                attempts: 1,
                last: AttemptFailure::TimedOut(_)
            }
        ));
        drop(far);
    }

    #[test]
    fn garbage_feedback_consumes_an_attempt() {
        let peer = ScriptedPeer::replying(vec![Some("NAK"), Some("OK")]);
        let mut sender = Sender::new(peer, &fast_config()).unwrap();
        assert_eq!(sender.send(b"payload").unwrap().attempts, 2);
    }

    #[test]
    fn write_failure_consumes_an_attempt() {
        let mut peer = ScriptedPeer::default();
        peer.fail_writes = true;
        let config = LinkConfig {
            max_send_attempts: 2,
            ..fast_config()
        };
        let mut sender = Sender::new(peer, &config).unwrap();
        let err = sender.send(b"payload").unwrap_err();
        assert!(matches!(
            err,
            LinkError::DeliveryFailed {
                attempts: 2,
                last: AttemptFailure::Transport(FrameError::Io(_))
            }
        ));
    }

    #[test]
    fn invalid_payload_is_not_retried() {
        let config = LinkConfig {
            max_frame_length: 8,
            ..fast_config()
        };
        let mut sender = Sender::new(ScriptedPeer::default(), &config).unwrap();

        let err = sender.send(b"").unwrap_err();
        assert!(matches!(err, LinkError::Frame(FrameError::EmptyPayload)));
        let err = sender.send(b"more than eight").unwrap_err();
        assert!(matches!(
            err,
            LinkError::Frame(FrameError::PayloadTooLarge { size: 15, max: 8 })
        ));
        assert!(sender.get_ref().written.is_empty());
    }

    #[test]
    fn send_message_writes_json_frame() {
        let peer = ScriptedPeer::replying(vec![Some("OK")]);
        let mut sender = Sender::new(peer, &fast_config()).unwrap();
        let sample = Message::sample();
        sender.send_message(&sample).unwrap();

        let mut reassembler =
            Reassembler::with_decoder(fast_config().frame_config(), crate::MessageDecoder);
        reassembler.feed(&sender.get_ref().written);
        match reassembler.advance() {
            Some(Verdict::Accept(message)) => assert_eq!(message, sample),
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn end_to_end_over_socket_pair() {
        let config = LinkConfig {
            read_timeout: Duration::from_millis(20),
            feedback_timeout: Duration::from_secs(2),
            idle_tick: Duration::from_millis(1),
            ..fast_config()
        };
        let (near, far) = SerialStream::pair().unwrap();

        let (delivery, rx) = crate::ChannelDelivery::channel();
        let receiver = crate::Receiver::spawn(
            ReceiveLoop::new(far, crate::MessageDecoder, delivery, &config).unwrap(),
        )
        .unwrap();

        let mut sender = Sender::new(near, &config).unwrap();
        for n in 0..3 {
            let message = Message {
                request_id: format!("req-{n}"),
                ..Message::sample()
            };
            assert_eq!(sender.send_message(&message).unwrap().attempts, 1);
            assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), message);
        }
        receiver.close().unwrap();
    }
}
