use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use serialcomm_link::{LinkConfig, DEFAULT_PORT};

use crate::exit::{link_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod loopback;
pub mod receive;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Receive frames and print each delivered message.
    Receive(ReceiveArgs),
    /// Send one message and wait for it to be acknowledged.
    Send(SendArgs),
    /// Run a receiver and a sender over an in-process socket pair.
    Loopback(LoopbackArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Receive(args) => receive::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Loopback(args) => loopback::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Which device to open.
#[derive(Args, Debug, Clone)]
pub struct PortArgs {
    /// Serial device path.
    #[arg(long, short = 'p', env = "SERIALCOMM_PORT", default_value = DEFAULT_PORT)]
    pub port: PathBuf,
    /// Line rate in bits per second.
    #[arg(long, short = 'b', env = "SERIALCOMM_BAUD", default_value_t = 115_200)]
    pub baud: u32,
}

/// Framing, pacing and retry settings shared by every link command.
#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// Upper bound on a single read (e.g. 300ms, 1s).
    #[arg(long, env = "SERIALCOMM_READ_TIMEOUT", default_value = "300ms")]
    pub read_timeout: String,
    /// Upper bound on a single write, feedback tokens included.
    #[arg(long, env = "SERIALCOMM_WRITE_TIMEOUT", default_value = "1s")]
    pub write_timeout: String,
    /// Largest accepted payload in bytes.
    #[arg(long, env = "SERIALCOMM_MAX_FRAME_LENGTH", default_value_t = 4096)]
    pub max_frame_length: u32,
    /// Discard a partial frame that has not grown for this long.
    #[arg(long, env = "SERIALCOMM_INACTIVITY_TIMEOUT", default_value = "5s")]
    pub inactivity_timeout: String,
    /// Payload bytes per written chunk.
    #[arg(long, env = "SERIALCOMM_CHUNK_SIZE", default_value_t = 20)]
    pub chunk_size: usize,
    /// Pause between written chunks (0ms disables pacing).
    #[arg(long, env = "SERIALCOMM_CHUNK_DELAY", default_value = "50ms")]
    pub chunk_delay: String,
    /// Transmissions per message before giving up.
    #[arg(long, env = "SERIALCOMM_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,
    /// How long to wait for OK/RETRY after each transmission.
    #[arg(long, env = "SERIALCOMM_FEEDBACK_TIMEOUT", default_value = "3s")]
    pub feedback_timeout: String,
    /// Do not require the newline terminator after the checksum.
    #[arg(long, env = "SERIALCOMM_NO_TERMINATOR")]
    pub no_terminator: bool,
}

impl LinkArgs {
    /// Build a validated link configuration.
    pub fn to_config(&self, port: Option<&PortArgs>) -> CliResult<LinkConfig> {
        let mut config = LinkConfig {
            read_timeout: parse_duration(&self.read_timeout)?,
            write_timeout: parse_duration(&self.write_timeout)?,
            max_frame_length: self.max_frame_length,
            inactivity_timeout: parse_duration(&self.inactivity_timeout)?,
            chunk_size: self.chunk_size,
            chunk_delay: parse_delay(&self.chunk_delay)?,
            max_send_attempts: self.max_attempts,
            feedback_timeout: parse_duration(&self.feedback_timeout)?,
            require_terminator: !self.no_terminator,
            ..LinkConfig::default()
        };
        if let Some(port) = port {
            config.port = port.port.clone();
            config.baud_rate = port.baud;
        }
        config
            .validate()
            .map_err(|err| link_error("invalid arguments", err))?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct ReceiveArgs {
    #[command(flatten)]
    pub port: PortArgs,
    #[command(flatten)]
    pub link: LinkArgs,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub port: PortArgs,
    #[command(flatten)]
    pub link: LinkArgs,
    /// JSON message to send. Default: the sample device event.
    #[arg(long, conflicts_with = "file")]
    pub json: Option<String>,
    /// Read the JSON message from a file.
    #[arg(long, conflicts_with = "json")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct LoopbackArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Number of messages to send across the pair.
    #[arg(long, default_value_t = 1)]
    pub count: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse a non-zero duration: `5s`, `500ms`, or bare seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let value = parse_delay(input)?;
    if value.is_zero() {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }
    Ok(value)
}

/// Like [`parse_duration`] but zero is allowed.
pub fn parse_delay(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
