use std::io::{ErrorKind, Write};

use bytes::{BufMut, BytesMut};
use tracing::debug;

use crate::checksum::Crc16Modbus;
use crate::codec::{check_payload_len, FrameConfig, CHECKSUM_SIZE, LENGTH_PREFIX_SIZE, TERMINATOR};
use crate::error::{FrameError, Result};
use crate::feedback::Feedback;

/// Writes frames to any `Write` stream, pacing the payload in chunks.
///
/// The length prefix goes out first, then the payload in `chunk_size`
/// pieces with `chunk_delay` between them, then the checksum of the whole
/// payload and the terminator. Slow UARTs with small receive FIFOs keep up
/// this way.
pub struct FrameWriter<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Encode and send one payload as a frame (blocking, paced).
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        let length = check_payload_len(payload.len(), self.config.max_frame_length)?;

        write_all(&mut self.inner, &length.to_be_bytes())?;

        let chunk_size = self.config.chunk_size.max(1);
        let mut digest = Crc16Modbus::new();
        for (index, chunk) in payload.chunks(chunk_size).enumerate() {
            if index > 0 && !self.config.chunk_delay.is_zero() {
                std::thread::sleep(self.config.chunk_delay);
            }
            write_all(&mut self.inner, chunk)?;
            self.flush()?;
            digest.update(chunk);
        }

        let mut trailer = BytesMut::with_capacity(CHECKSUM_SIZE + 1);
        trailer.put_u16(digest.finish());
        trailer.put_u8(TERMINATOR);
        write_all(&mut self.inner, &trailer)?;
        self.flush()?;

        debug!(
            length,
            chunks = payload.len().div_ceil(chunk_size),
            wire_bytes = LENGTH_PREFIX_SIZE + payload.len() + trailer.len(),
            "frame written"
        );
        Ok(())
    }

    /// Write a feedback token (raw, unframed).
    pub fn send_feedback(&mut self, feedback: Feedback) -> Result<()> {
        write_all(&mut self.inner, feedback.as_bytes())?;
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

/// Write every byte of `buf`, retrying interrupted writes.
///
/// `WouldBlock` and `TimedOut` are returned as errors: on a stream with a
/// write timeout they mean the timeout elapsed.
pub fn write_all<W: Write + ?Sized>(out: &mut W, buf: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < buf.len() {
        match out.write(&buf[offset..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}
