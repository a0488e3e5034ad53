#![cfg(all(unix, feature = "cli"))]

use std::process::{Command, Output};

fn serialcomm(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_serialcomm"))
        .arg("--log-level")
        .arg("error")
        .args(args)
        .env_remove("SERIALCOMM_PORT")
        .output()
        .expect("serialcomm should run")
}

#[test]
fn loopback_delivers_sample_messages() {
    let out = serialcomm(&[
        "loopback",
        "--count",
        "2",
        "--chunk-delay",
        "0ms",
        "--format",
        "json",
    ]);
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    let stdout = String::from_utf8(out.stdout).expect("stdout should be utf-8");
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be JSON"))
        .collect();
    assert_eq!(lines.len(), 2);
    for (index, line) in lines.iter().enumerate() {
        assert_eq!(line["message"]["requestID"], format!("loopback-{index}"));
        assert_eq!(
            line["message"]["correlationID"],
            "78f0dd39-5e0b-4002-809d-9bae380dfec3"
        );
        assert_eq!(line["event"]["deviceName"], "Random-Integer-Device");
        assert_eq!(line["event"]["readings"][0]["value"], "-63");
    }
}

#[test]
fn loopback_pretty_output() {
    let out = serialcomm(&["loopback", "--chunk-delay", "0ms", "--format", "pretty"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("request=loopback-0"));
    assert!(stdout.contains("Int8=-63 (Int8)"));
}

#[test]
fn version_prints_package_version() {
    let out = serialcomm(&["version"]);
    assert!(out.status.success());
    assert_eq!(
        String::from_utf8_lossy(&out.stdout).trim(),
        format!("serialcomm {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn missing_device_is_a_transport_error() {
    let out = serialcomm(&["send", "--port", "/dev/serialcomm-test-missing"]);
    assert_eq!(out.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&out.stderr).contains("open failed"));
}

#[test]
fn unsupported_baud_is_a_usage_error() {
    let out = serialcomm(&["receive", "--baud", "12345", "--count", "1"]);
    assert_eq!(out.status.code(), Some(64));
}

#[test]
fn invalid_json_is_a_usage_error() {
    let out = serialcomm(&["send", "--json", "not json"]);
    assert_eq!(out.status.code(), Some(64));
}

#[test]
fn zero_attempts_is_a_usage_error() {
    let out = serialcomm(&["loopback", "--max-attempts", "0"]);
    assert_eq!(out.status.code(), Some(64));
}
