use serialcomm_transport::{SerialIo, SerialStream};
use tracing::info;

use crate::config::LinkConfig;
use crate::error::Result;

/// Open and configure the serial device named in `config`.
///
/// The returned stream carries the configured read and write timeouts.
pub fn open_port(config: &LinkConfig) -> Result<SerialStream> {
    let mut stream = SerialStream::open(&config.port, config.baud_rate)?;
    prepare(&mut stream, config)?;
    info!(
        port = %config.port.display(),
        baud_rate = config.baud_rate,
        "serial port opened"
    );
    Ok(stream)
}

/// Apply the configured timeouts to an already-open transport.
pub fn prepare<T: SerialIo + ?Sized>(transport: &mut T, config: &LinkConfig) -> Result<()> {
    transport.set_timeouts(Some(config.read_timeout), Some(config.write_timeout))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::LinkError;
    use serialcomm_transport::TransportError;

    #[test]
    fn missing_device_fails_to_open() {
        let config = LinkConfig {
            port: "/dev/serialcomm-does-not-exist".into(),
            ..LinkConfig::default()
        };
        let err = open_port(&config).unwrap_err();
        assert!(matches!(
            err,
            LinkError::Transport(TransportError::Open { .. })
        ));
    }

    #[test]
    fn unsupported_baud_rate() {
        let config = LinkConfig {
            baud_rate: 12_345,
            ..LinkConfig::default()
        };
        let err = open_port(&config).unwrap_err();
        assert!(matches!(
            err,
            LinkError::Transport(TransportError::UnsupportedBaudRate(12_345))
        ));
    }

    #[test]
    fn prepare_applies_timeouts() {
        let (mut stream, _peer) = SerialStream::pair().unwrap();
        let config = LinkConfig {
            read_timeout: Duration::from_millis(40),
            write_timeout: Duration::from_millis(70),
            ..LinkConfig::default()
        };
        prepare(&mut stream, &config).unwrap();
        assert_eq!(stream.read_timeout(), Some(Duration::from_millis(40)));
        assert_eq!(stream.write_timeout(), Some(Duration::from_millis(70)));
    }
}
