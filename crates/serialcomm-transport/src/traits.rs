use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// A link endpoint the frame layer can read from and write to.
///
/// `discard_input` drops whatever the peer sent that has not been read yet.
/// The receive loop calls it after rejecting a frame so the retransmission
/// starts on a clean line.
///
/// `set_timeouts` bounds every later read and write. Implementations whose
/// reads never block may keep the default no-op.
pub trait SerialIo: Read + Write {
    /// Discard bytes received but not yet read.
    fn discard_input(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    /// Bound blocking reads and writes.
    fn set_timeouts(&mut self, _read: Option<Duration>, _write: Option<Duration>) -> Result<()> {
        Ok(())
    }
}

/// A connected serial stream implementing `Read` and `Write`.
///
/// On a tty device, a read that sees no data within the read timeout returns
/// `Ok(0)`. On a socket pair it fails with `WouldBlock` or `TimedOut`. Both
/// mean "nothing arrived yet".
pub struct SerialStream {
    inner: SerialStreamInner,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

enum SerialStreamInner {
    #[cfg(unix)]
    Tty(std::fs::File),
    #[cfg(unix)]
    Socket(std::os::unix::net::UnixStream),
}

impl Read for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty(file) => {
                use std::os::fd::AsRawFd;

                if !crate::tty::wait_ready(file.as_raw_fd(), libc::POLLIN, self.read_timeout)? {
                    return Ok(0);
                }
                file.read(buf)
            }
            #[cfg(unix)]
            SerialStreamInner::Socket(stream) => stream.read(buf),
        }
    }
}

impl Write for SerialStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty(file) => {
                use std::os::fd::AsRawFd;

                if !crate::tty::wait_ready(file.as_raw_fd(), libc::POLLOUT, self.write_timeout)? {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "serial write timed out",
                    ));
                }
                file.write(buf)
            }
            #[cfg(unix)]
            SerialStreamInner::Socket(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty(file) => file.flush(),
            #[cfg(unix)]
            SerialStreamInner::Socket(stream) => stream.flush(),
        }
    }
}

impl SerialIo for SerialStream {
    fn discard_input(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty(file) => {
                use std::os::fd::AsRawFd;

                crate::tty::flush_queue(file.as_raw_fd(), libc::TCIFLUSH)
            }
            #[cfg(unix)]
            SerialStreamInner::Socket(stream) => drain_socket(stream),
        }
    }

    fn set_timeouts(&mut self, read: Option<Duration>, write: Option<Duration>) -> Result<()> {
        self.set_read_timeout(read)?;
        self.set_write_timeout(write)
    }
}

impl SerialStream {
    /// Open a tty device and configure it raw 8N1 at `baud_rate`.
    ///
    /// Bytes left in the device queues from an earlier session are discarded.
    #[cfg(unix)]
    pub fn open(path: impl AsRef<Path>, baud_rate: u32) -> Result<Self> {
        let file = crate::tty::open_device(path.as_ref(), baud_rate)?;
        Ok(Self::from_inner(SerialStreamInner::Tty(file)))
    }

    /// Create two connected endpoints that behave like the two ends of a null-modem cable.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_socket(left), Self::from_socket(right)))
    }

    /// Wrap a connected Unix stream (for example one end of a `socat` bridge).
    #[cfg(unix)]
    pub fn from_socket(stream: std::os::unix::net::UnixStream) -> Self {
        Self::from_inner(SerialStreamInner::Socket(stream))
    }

    fn from_inner(inner: SerialStreamInner) -> Self {
        Self {
            inner,
            read_timeout: None,
            write_timeout: None,
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty(_) => {}
            #[cfg(unix)]
            SerialStreamInner::Socket(stream) => stream.set_read_timeout(timeout)?,
        }
        self.read_timeout = timeout;
        Ok(())
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty(_) => {}
            #[cfg(unix)]
            SerialStreamInner::Socket(stream) => stream.set_write_timeout(timeout)?,
        }
        self.write_timeout = timeout;
        Ok(())
    }

    /// Current read timeout.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Current write timeout.
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty(file) => SerialStreamInner::Tty(file.try_clone()?),
            #[cfg(unix)]
            SerialStreamInner::Socket(stream) => SerialStreamInner::Socket(stream.try_clone()?),
        };
        Ok(Self {
            inner,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        })
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            SerialStreamInner::Tty(_) => "tty",
            #[cfg(unix)]
            SerialStreamInner::Socket(_) => "socket-pair",
        }
    }
}

#[cfg(unix)]
fn drain_socket(stream: &mut std::os::unix::net::UnixStream) -> std::io::Result<()> {
    stream.set_nonblocking(true)?;
    let mut scratch = [0u8; 256];
    let result = loop {
        match stream.read(&mut scratch) {
            Ok(0) => break Ok(()),
            Ok(_) => continue,
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => break Err(err),
        }
    };
    stream.set_nonblocking(false)?;
    result
}

impl std::fmt::Debug for SerialStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialStream")
            .field("type", &self.transport_name())
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}
