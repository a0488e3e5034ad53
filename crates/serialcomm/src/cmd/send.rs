use std::fs;

use serialcomm_link::{Message, Sender};

use crate::cmd::SendArgs;
use crate::exit::{link_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_send_report, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.link.to_config(Some(&args.port))?;
    let payload = resolve_payload(&args)?;

    let mut sender = Sender::open(&config).map_err(|err| link_error("open failed", err))?;
    let report = sender
        .send(&payload)
        .map_err(|err| link_error("send failed", err))?;

    print_send_report(&report, payload.len(), format);
    Ok(SUCCESS)
}

/// The bytes to send: `--json`, `--file`, or the sample event.
fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(json) = &args.json {
        check_message(json.as_bytes())
            .map_err(|err| CliError::new(USAGE, format!("--json is not a valid message: {err}")))?;
        return Ok(json.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        let bytes = fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        })?;
        check_message(&bytes).map_err(|err| {
            CliError::new(
                DATA_INVALID,
                format!("{} is not a valid message: {err}", path.display()),
            )
        })?;
        return Ok(bytes);
    }
    Message::sample()
        .to_json()
        .map_err(|err| link_error("encoding sample message failed", err))
}

/// The receiver only acknowledges payloads that decode as a message object.
fn check_message(bytes: &[u8]) -> Result<(), serde_json::Error> {
    serde_json::from_slice::<Message>(bytes).map(|_| ())
}
