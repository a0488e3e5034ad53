use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Bit rate used when none is configured.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Bit rates accepted by [`crate::SerialStream::open`].
pub const SUPPORTED_BAUD_RATES: [u32; 9] = [
    1_200, 2_400, 4_800, 9_600, 19_200, 38_400, 57_600, 115_200, 230_400,
];

/// Map a numeric bit rate onto its termios speed constant.
pub fn speed_for(baud_rate: u32) -> Option<libc::speed_t> {
    let speed = match baud_rate {
        1_200 => libc::B1200,
        2_400 => libc::B2400,
        4_800 => libc::B4800,
        9_600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        _ => return None,
    };
    Some(speed)
}

/// Open `path` as a raw 8N1 serial line at `baud_rate`.
///
/// The device is opened non-blocking so a missing carrier cannot hang the
/// open call; blocking mode is restored once termios is configured. Pending
/// input and output are flushed before the handle is returned.
pub(crate) fn open_device(path: &Path, baud_rate: u32) -> Result<File> {
    let speed = speed_for(baud_rate).ok_or(TransportError::UnsupportedBaudRate(baud_rate))?;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(path)
        .map_err(|e| TransportError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;

    configure(file.as_raw_fd(), speed).map_err(|e| TransportError::Configure {
        path: path.to_path_buf(),
        source: e,
    })?;

    info!(?path, baud_rate, "opened serial device");
    Ok(file)
}

fn configure(fd: RawFd, speed: libc::speed_t) -> std::io::Result<()> {
    // SAFETY: termios is a plain C struct; an all-zero value is a valid
    // destination for tcgetattr to fill in.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };

    // SAFETY: `fd` is an open descriptor owned by the caller and `tio` is a
    // valid, writable termios.
    if unsafe { libc::tcgetattr(fd, &mut tio) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    // SAFETY: `tio` was initialised by tcgetattr above.
    unsafe { libc::cfmakeraw(&mut tio) };
    tio.c_cflag &= !(libc::PARENB | libc::CSTOPB | libc::CSIZE);
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        tio.c_cflag &= !libc::CRTSCTS;
    }
    tio.c_cflag |= libc::CS8 | libc::CLOCAL | libc::CREAD;
    // Reads never wait inside the driver; timeouts are enforced with poll(2).
    tio.c_cc[libc::VMIN] = 0;
    tio.c_cc[libc::VTIME] = 0;

    // SAFETY: `tio` is a valid termios and `speed` comes from the libc constants.
    let rc = unsafe {
        libc::cfsetispeed(&mut tio, speed) | libc::cfsetospeed(&mut tio, speed)
    };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }

    // SAFETY: `fd` is open and `tio` is fully initialised.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    set_blocking(fd)?;
    flush_queue(fd, libc::TCIOFLUSH)?;
    debug!(fd, "serial line configured raw 8N1");
    Ok(())
}

fn set_blocking(fd: RawFd) -> std::io::Result<()> {
    // SAFETY: F_GETFL/F_SETFL only read and update the descriptor's status flags.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: see above.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Discard queued data (`TCIFLUSH`, `TCOFLUSH` or `TCIOFLUSH`).
pub(crate) fn flush_queue(fd: RawFd, queue: libc::c_int) -> std::io::Result<()> {
    // SAFETY: tcflush takes an open descriptor and a queue selector.
    if unsafe { libc::tcflush(fd, queue) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Wait until `fd` is ready for `events`.
///
/// Returns `Ok(false)` when the timeout elapsed first. `None` waits forever.
pub(crate) fn wait_ready(
    fd: RawFd,
    events: libc::c_short,
    timeout: Option<Duration>,
) -> std::io::Result<bool> {
    let timeout_ms: libc::c_int = match timeout {
        None => -1,
        Some(t) if t.is_zero() => 0,
        Some(t) => t.as_millis().clamp(1, libc::c_int::MAX as u128) as libc::c_int,
    };

    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    // SAFETY: `pfd` is a single valid pollfd and the count passed is 1.
    let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(rc > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SerialStream;

    #[test]
    fn every_supported_rate_maps_to_a_speed() {
        for rate in SUPPORTED_BAUD_RATES {
            assert!(speed_for(rate).is_some(), "{rate} should be supported");
        }
        assert!(speed_for(DEFAULT_BAUD_RATE).is_some());
    }

    #[test]
    fn unsupported_baud_rate_rejected_before_open() {
        let err = SerialStream::open("/definitely/not/a/device", 12_345).unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedBaudRate(12_345)));
    }

    #[test]
    fn missing_device_reports_open_error() {
        let err = SerialStream::open("/definitely/not/a/device", 115_200).unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
    }

    #[test]
    fn regular_file_is_not_a_tty() {
        let path = std::env::temp_dir().join(format!(
            "serialcomm-not-a-tty-{}",
            std::process::id()
        ));
        std::fs::write(&path, b"plain file").unwrap();

        let err = SerialStream::open(&path, 9_600).unwrap_err();
        assert!(matches!(err, TransportError::Configure { .. }));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn pseudo_terminal_roundtrip() {
        use std::io::{Read, Write};
        use std::os::fd::FromRawFd;

        // SAFETY: standard pty allocation sequence; every return value is checked.
        let master_fd = unsafe { libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY) };
        assert!(master_fd >= 0, "posix_openpt failed");
        assert_eq!(unsafe { libc::grantpt(master_fd) }, 0);
        assert_eq!(unsafe { libc::unlockpt(master_fd) }, 0);

        let mut name = [0 as libc::c_char; 128];
        assert_eq!(
            unsafe { libc::ptsname_r(master_fd, name.as_mut_ptr(), name.len()) },
            0
        );
        let slave_path = unsafe { std::ffi::CStr::from_ptr(name.as_ptr()) }
            .to_str()
            .unwrap()
            .to_string();

        // SAFETY: `master_fd` is a freshly opened descriptor we own.
        let mut master = unsafe { File::from_raw_fd(master_fd) };
        let mut port = SerialStream::open(&slave_path, 115_200).unwrap();
        port.set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();
        assert_eq!(port.transport_name(), "tty");

        // Nothing written yet: the timeout elapses with zero bytes.
        let mut buf = [0u8; 16];
        port.set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        assert_eq!(port.read(&mut buf).unwrap(), 0);

        port.set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();
        master.write_all(b"ping").unwrap();
        let mut received = Vec::new();
        while received.len() < 4 {
            let n = port.read(&mut buf).unwrap();
            assert!(n > 0, "expected data before timeout");
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, b"ping");

        port.write_all(b"OK").unwrap();
        let mut reply = [0u8; 2];
        master.read_exact(&mut reply).unwrap();
        assert_eq!(&reply, b"OK");
    }
}
