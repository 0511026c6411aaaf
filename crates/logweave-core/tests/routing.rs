//! Facade routing tests
//!
//! These tests build complete loggers over a temporary directory and check
//! which files and console lines each severity produces.
//!
//! ## What These Tests Verify
//!
//! - Every severity reaches exactly the channels it is mapped to
//! - Channels without routed severities never create files
//! - Console and file lines carry the trace tag
//! - Error values are normalized before they reach the console

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use logweave_core::{
    fixed_clock, ConsoleSink, ErrorValue, LogPart, LoggerBuilder, LoggerHandle, LoggerSettings,
    Severity, SharedBuffer,
};
use serde_json::json;
use tempfile::{tempdir, TempDir};
use termcolor::NoColor;

const DATE: &str = "2024-03-10";

fn base_settings(temp: &TempDir) -> LoggerSettings {
    LoggerSettings {
        log_dir: Some(temp.path().to_path_buf()),
        file_prefix: Some("app".into()),
        console: false,
        ..LoggerSettings::named("routing")
    }
}

fn build(settings: LoggerSettings) -> LoggerHandle {
    let at = Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap();
    LoggerBuilder::new(settings).clock(fixed_clock(at)).build()
}

fn build_with_console(settings: LoggerSettings) -> (LoggerHandle, SharedBuffer) {
    let buf = SharedBuffer::new();
    let at = Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap();
    let handle = LoggerBuilder::new(LoggerSettings {
        console: true,
        ..settings
    })
    .console(ConsoleSink::with_writer(Box::new(NoColor::new(buf.clone()))))
    .clock(fixed_clock(at))
    .build();
    (handle, buf)
}

/// Regular files directly inside `dir`, sorted.
fn files_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}

fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

// ============================================================================
// Channel Routing
// ============================================================================

/// Each severity lands in exactly its mapped channels, including many-to-many.
#[test]
fn test_severity_reaches_exactly_mapped_channels() {
    let temp = tempdir().unwrap();
    let settings = base_settings(&temp)
        .route(Severity::Info, "info")
        .route(Severity::Warn, "info")
        .route(Severity::Warn, "audit")
        .route(Severity::Error, "error")
        .route(Severity::Fatal, "error")
        .route(Severity::Fatal, "audit");
    let handle = build(settings);

    for severity in Severity::ALL {
        handle
            .logger
            .log(severity, [LogPart::from(format!("{} line", severity))]);
    }
    handle.close().unwrap();

    let info = read(temp.path().join(format!("app-{DATE}.log")));
    let error = read(temp.path().join("error").join(format!("error-app-{DATE}.log")));
    let audit = read(temp.path().join("audit").join(format!("audit-app-{DATE}.log")));

    let levels = |content: &str| -> Vec<String> {
        content
            .lines()
            .map(|l| l.split('\t').nth(1).unwrap().to_string())
            .collect()
    };
    assert_eq!(levels(&info), ["INFO", "WARN"]);
    assert_eq!(levels(&error), ["ERROR", "FATAL"]);
    assert_eq!(levels(&audit), ["WARN", "FATAL"]);
}

/// With only `error` routed, the info channel stays inert and creates nothing.
#[test]
fn test_error_only_map_leaves_info_dir_empty() {
    let temp = tempdir().unwrap();
    let handle = build(base_settings(&temp).route(Severity::Error, "error"));

    assert!(!handle.file_sinks.info().unwrap().is_active());
    assert!(handle.file_sinks.error().unwrap().is_active());
    assert!(files_in(temp.path()).is_empty());

    handle.logger.info("console only");
    handle.logger.error("boom");
    handle.close().unwrap();

    assert!(files_in(temp.path()).is_empty());
    let errors = files_in(&temp.path().join("error"));
    assert_eq!(errors, vec![temp.path().join("error").join(format!("error-app-{DATE}.log"))]);
    assert!(read(&errors[0]).ends_with("\tERROR\tboom\n"));
}

/// An empty map disables file output entirely.
#[test]
fn test_empty_map_builds_no_file_channels() {
    let temp = tempdir().unwrap();
    let logs = temp.path().join("logs");
    let handle = build(LoggerSettings {
        log_dir: Some(logs.clone()),
        ..base_settings(&temp)
    });

    assert_eq!(handle.file_sinks.iter().count(), 0);
    handle.logger.fatal("nowhere to go");
    handle.close().unwrap();
    assert!(!logs.exists());
}

/// Unknown severity names in the map are ignored.
#[test]
fn test_unknown_severity_names_are_ignored() {
    let temp = tempdir().unwrap();
    let mut settings = base_settings(&temp).route(Severity::Info, "info");
    settings
        .channel_map
        .insert("verbose".to_string(), "audit".into());
    let handle = build(settings);

    let audit = handle.file_sinks.get("audit").unwrap();
    assert!(!audit.is_active());
    assert!(!temp.path().join("audit").exists());
}

/// Records below the minimum level go nowhere.
#[test]
fn test_min_level_gates_files_and_console() {
    let temp = tempdir().unwrap();
    let settings = LoggerSettings {
        min_level: Severity::Warn,
        ..base_settings(&temp).route(Severity::Info, "info").route(Severity::Warn, "info")
    };
    let (handle, console) = build_with_console(settings);

    assert!(!handle.logger.is_enabled(Severity::Info));
    assert!(handle.logger.is_enabled(Severity::Warn));
    handle.logger.info("quiet");
    handle.logger.warn("loud");
    handle.close().unwrap();

    let info = read(temp.path().join(format!("app-{DATE}.log")));
    assert!(!info.contains("quiet"));
    assert!(info.contains("loud"));
    assert!(!console.contents().contains("quiet"));
    assert!(console.contents().contains("loud"));
}

// ============================================================================
// Message Shaping
// ============================================================================

/// File lines drop blank parts, inline JSON and strip color escapes.
#[test]
fn test_file_line_shaping() {
    let temp = tempdir().unwrap();
    let handle = build(base_settings(&temp).route(Severity::Info, "info"));

    handle.logger.log(
        Severity::Info,
        [
            LogPart::from("\x1b[32mready\x1b[0m"),
            LogPart::from(""),
            LogPart::Value(serde_json::Value::Null),
            LogPart::Value(json!({"port": 8080})),
            LogPart::Value(json!([1, 2, 3])),
        ],
    );
    handle.logger.info("");
    handle.close().unwrap();

    let info = read(temp.path().join(format!("app-{DATE}.log")));
    assert_eq!(
        info,
        "2024-03-10 09:30:00.000\tINFO\tready {\"port\":8080} [1,2,3]\n"
    );
}

/// Error values are written to files as one JSON object.
#[test]
fn test_error_value_in_file_is_single_line() {
    let temp = tempdir().unwrap();
    let handle = build(base_settings(&temp).route(Severity::Error, "error"));

    let err = ErrorValue::new("PaymentError", "card declined")
        .with_code("E_CARD")
        .with_property("response", json!({"body": "x".repeat(500)}));
    handle.logger.error(err);
    handle.close().unwrap();

    let content = read(temp.path().join("error").join(format!("error-app-{DATE}.log")));
    assert_eq!(content.lines().count(), 1);
    let json_part = content.trim_end().split('\t').nth(2).unwrap();
    let value: serde_json::Value = serde_json::from_str(json_part).unwrap();
    assert_eq!(value["name"], "PaymentError");
    assert_eq!(value["message"], "card declined");
    assert_eq!(value["code"], "E_CARD");
    let response = value["response"].as_str().unwrap();
    assert_eq!(response.chars().count(), 100);
    assert!(response.ends_with(" ..."));
}

// ============================================================================
// Trace Correlation
// ============================================================================

/// A bound trace id tags both console and file output.
#[test]
fn test_trace_tag_on_console_and_file() {
    let temp = tempdir().unwrap();
    let (handle, console) = build_with_console(base_settings(&temp).route(Severity::Info, "info"));

    handle.logger.with_trace_id("req-42").info("handled");
    handle.logger.info("untagged");
    handle.close().unwrap();

    let info = read(temp.path().join(format!("app-{DATE}.log")));
    let lines: Vec<&str> = info.lines().collect();
    assert_eq!(lines[0], "2024-03-10 09:30:00.000\tINFO\t[req-42] handled");
    assert_eq!(lines[1], "2024-03-10 09:30:00.000\tINFO\tuntagged");
    assert_eq!(
        console.contents(),
        "2024-03-10 09:30:00.000\tINFO\t[req-42] handled\n2024-03-10 09:30:00.000\tINFO\tuntagged\n"
    );
}

/// The provider supplies the trace id when none is bound.
#[test]
fn test_trace_provider_fallback() {
    let temp = tempdir().unwrap();
    let at = Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap();
    let handle = LoggerBuilder::new(base_settings(&temp).route(Severity::Info, "info"))
        .trace_provider(std::sync::Arc::new(|| Some("ctx-7".to_string())))
        .clock(fixed_clock(at))
        .build();

    handle.logger.info("from context");
    handle.logger.with_trace_id("bound").info("explicit wins");
    handle.close().unwrap();

    let info = read(temp.path().join(format!("app-{DATE}.log")));
    assert!(info.contains("\t[ctx-7] from context\n"));
    assert!(info.contains("\t[bound] explicit wins\n"));
}

// ============================================================================
// Console Output
// ============================================================================

/// At error severity the console shows the stack and bounded properties.
#[test]
fn test_console_normalizes_errors() {
    let temp = tempdir().unwrap();
    let (handle, console) = build_with_console(base_settings(&temp));

    let err = ErrorValue::new("TimeoutError", "upstream timed out")
        .with_property("config", json!({"retries": 3, "hosts": vec!["a".repeat(200)]}));
    handle.logger.error(err);
    handle.logger.error(LogPart::Value(json!({"stack": "S", "message": "m", "extra": null})));

    let out = console.contents();
    assert!(out.contains("\tERROR\tTimeoutError: upstream timed out\n"));
    let config_line = out.lines().find(|l| l.contains("\"config\"")).unwrap();
    assert!(config_line.ends_with(" ...\""));
    assert!(!out.contains(&"a".repeat(150)));
    assert!(out.contains("\tERROR\tS\n"));
    assert!(!out.contains("extra"));
}

/// The logger name is shown only when requested.
#[test]
fn test_display_name() {
    let temp = tempdir().unwrap();
    let (handle, console) = build_with_console(LoggerSettings {
        display_name: true,
        ..base_settings(&temp)
    });
    handle.logger.warn("careful");
    assert_eq!(
        console.contents(),
        "2024-03-10 09:30:00.000\tWARN\t[routing] careful\n"
    );
}
