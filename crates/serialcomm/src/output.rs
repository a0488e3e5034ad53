use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serialcomm_link::{Event, Message, SendReport};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    schema_id: &'a str,
    message: &'a Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<&'a Event>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_error: Option<String>,
    timestamp: String,
}

#[derive(Serialize)]
struct SendOutput<'a> {
    schema_id: &'a str,
    status: &'a str,
    attempts: u32,
    elapsed_ms: u64,
    bytes: usize,
}

pub fn print_message(message: &Message, format: OutputFormat) {
    let decoded = message.decode_payload();
    let event = decoded.as_ref().ok().map(|payload| &payload.event);

    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                schema_id: "https://schemas.3leaps.dev/serialcomm/cli/v1/message-received.schema.json",
                message,
                event,
                payload_error: decoded.as_ref().err().map(ToString::to_string),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CORRELATION", "DEVICE", "RESOURCE", "TYPE", "VALUE"]);
            match event {
                Some(event) if !event.readings.is_empty() => {
                    for reading in &event.readings {
                        table.add_row(vec![
                            message.correlation_id.clone(),
                            reading.device_name.clone(),
                            reading.resource_name.clone(),
                            reading.value_type.clone(),
                            reading.value.clone(),
                        ]);
                    }
                }
                Some(event) => {
                    table.add_row(vec![
                        message.correlation_id.clone(),
                        event.device_name.clone(),
                        event.source_name.clone(),
                        "-".to_string(),
                        "-".to_string(),
                    ]);
                }
                None => {
                    table.add_row(vec![
                        message.correlation_id.clone(),
                        "-".to_string(),
                        "-".to_string(),
                        message.content_type.clone(),
                        format!("<undecodable payload, {} bytes>", message.payload.len()),
                    ]);
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "correlation={} request={} api={} content_type={}",
                message.correlation_id, message.request_id, message.api_version, message.content_type
            );
            match (event, decoded.as_ref().err()) {
                (Some(event), _) => {
                    println!(
                        "  event {} device={} profile={} source={} origin={}",
                        event.id, event.device_name, event.profile_name, event.source_name, event.origin
                    );
                    for reading in &event.readings {
                        println!(
                            "    {}={} ({})",
                            reading.resource_name, reading.value, reading.value_type
                        );
                    }
                }
                (None, Some(err)) => println!("  payload not decodable: {err}"),
                (None, None) => {}
            }
        }
        OutputFormat::Raw => {
            let mut line = message.to_json().unwrap_or_default();
            line.push(b'\n');
            print_raw(&line);
        }
    }
}

pub fn print_send_report(report: &SendReport, bytes: usize, format: OutputFormat) {
    let elapsed_ms = report.elapsed.as_millis() as u64;
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            let out = SendOutput {
                schema_id: "https://schemas.3leaps.dev/serialcomm/cli/v1/send-result.schema.json",
                status: "delivered",
                attempts: report.attempts,
                elapsed_ms,
                bytes,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["STATUS", "ATTEMPTS", "BYTES", "ELAPSED"])
                .add_row(vec![
                    "delivered".to_string(),
                    report.attempts.to_string(),
                    bytes.to_string(),
                    format!("{elapsed_ms}ms"),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "delivered {bytes} bytes in {} attempt(s), {elapsed_ms}ms",
                report.attempts
            );
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
