use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serialcomm_frame::writer::write_all;
use serialcomm_frame::{Decoder, Feedback, FrameError, Reassembler, Verdict};
use serialcomm_transport::SerialIo;
use tracing::{debug, info};

use crate::config::LinkConfig;
use crate::deliver::Deliver;
use crate::error::{LinkError, Result};
use crate::message::{Message, MessageDecoder};
use crate::observe::{LinkObserver, TracingObserver};
use crate::port::{open_port, prepare};

const READ_CHUNK_SIZE: usize = 1024;
const WORKER_THREAD_NAME: &str = "serialcomm-receiver";

/// The receive side of a link: read, reassemble, deliver, acknowledge.
///
/// Each iteration reads once from the transport, feeds the bytes to the
/// [`Reassembler`], handles every verdict that became available, then runs
/// the idle check. Every verdict produces exactly one feedback token; every
/// accepted frame is delivered exactly once, before its `OK` is written.
pub struct ReceiveLoop<T, D: Decoder, Dl, O = TracingObserver> {
    transport: T,
    reassembler: Reassembler<D>,
    delivery: Dl,
    observer: O,
    idle_tick: Duration,
    read_buf: Box<[u8]>,
}

impl<T, D, Dl> ReceiveLoop<T, D, Dl>
where
    T: SerialIo,
    D: Decoder,
    Dl: Deliver<D::Item>,
{
    /// Wrap `transport`, applying the configured read and write timeouts so
    /// a silent line still lets the loop observe its stop flag.
    pub fn new(mut transport: T, decoder: D, delivery: Dl, config: &LinkConfig) -> Result<Self> {
        prepare(&mut transport, config)?;
        Ok(Self {
            transport,
            reassembler: Reassembler::with_decoder(config.frame_config(), decoder),
            delivery,
            observer: TracingObserver,
            idle_tick: config.idle_tick,
            read_buf: vec![0u8; READ_CHUNK_SIZE].into_boxed_slice(),
        })
    }
}

impl<T, D, Dl, O> ReceiveLoop<T, D, Dl, O>
where
    T: SerialIo,
    D: Decoder,
    Dl: Deliver<D::Item>,
    O: LinkObserver,
{
    /// Replace the observer.
    pub fn with_observer<O2: LinkObserver>(self, observer: O2) -> ReceiveLoop<T, D, Dl, O2> {
        ReceiveLoop {
            transport: self.transport,
            reassembler: self.reassembler,
            delivery: self.delivery,
            observer,
            idle_tick: self.idle_tick,
            read_buf: self.read_buf,
        }
    }

    /// Run one read/feed/advance/idle-check iteration.
    ///
    /// Returns the number of verdicts handled.
    pub fn run_once(&mut self) -> usize {
        match self.transport.read(&mut self.read_buf) {
            Ok(0) => std::thread::sleep(self.idle_tick),
            Ok(n) => self.reassembler.feed(&self.read_buf[..n]),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                std::thread::sleep(self.idle_tick)
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => {
                self.observer.transport_error(&err);
                std::thread::sleep(self.idle_tick);
            }
        }

        let mut handled = 0;
        while let Some(verdict) = self.reassembler.advance() {
            self.handle(verdict);
            handled += 1;
        }
        if let Some(verdict) = self.reassembler.idle_check(Instant::now()) {
            self.handle(verdict);
            handled += 1;
        }
        handled
    }

    /// Iterate until `stop` is set.
    pub fn run(&mut self, stop: &AtomicBool) {
        info!("receive loop started");
        while !stop.load(Ordering::Acquire) {
            self.run_once();
        }
        info!("receive loop stopped");
    }

    pub fn reassembler(&self) -> &Reassembler<D> {
        &self.reassembler
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn handle(&mut self, verdict: Verdict<D::Item>) {
        let token = verdict.feedback();
        match verdict {
            Verdict::Accept(item) => {
                self.delivery.deliver(item);
                self.observer.frame_accepted();
            }
            Verdict::Reject(reason) => {
                self.observer.frame_rejected(&reason);
                if let Err(err) = self.transport.discard_input() {
                    self.observer.transport_error(&err);
                }
            }
        }
        self.send_feedback(token);
    }

    fn send_feedback(&mut self, token: Feedback) {
        let written = write_all(&mut self.transport, token.as_bytes()).and_then(|()| {
            self.transport.flush().map_err(FrameError::Io)
        });
        match written {
            Ok(()) => self.observer.feedback_sent(token),
            Err(err) => self.observer.feedback_failed(token, &err),
        }
    }
}

/// Handle to a receive loop running on its own thread.
///
/// Dropping the handle stops the loop and joins the thread.
#[derive(Debug)]
pub struct Receiver {
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Receiver {
    /// Open the configured port and deliver every accepted [`Message`] to `delivery`.
    pub fn start<Dl>(config: &LinkConfig, delivery: Dl) -> Result<Self>
    where
        Dl: Deliver<Message> + 'static,
    {
        config.validate()?;
        let transport = open_port(config)?;
        Self::spawn(ReceiveLoop::new(transport, MessageDecoder, delivery, config)?)
    }

    /// Run `receive_loop` on a new worker thread.
    pub fn spawn<T, D, Dl, O>(mut receive_loop: ReceiveLoop<T, D, Dl, O>) -> Result<Self>
    where
        T: SerialIo + Send + 'static,
        D: Decoder + Send + 'static,
        Dl: Deliver<D::Item> + 'static,
        O: LinkObserver + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let worker = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || receive_loop.run(&worker_stop))
            .map_err(LinkError::Spawn)?;
        debug!(thread = WORKER_THREAD_NAME, "receiver worker spawned");
        Ok(Self {
            stop,
            worker: Some(worker),
        })
    }

    /// Whether the worker thread is still running.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// Stop the loop and wait for the worker to exit.
    ///
    /// Returns within about one read timeout.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| LinkError::WorkerPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
