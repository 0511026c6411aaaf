//! Log directory resolution and channel layout tests

use std::path::Path;

use logweave_core::{create_logger, LoggerSettings, Severity};
use serde_json::json;
use tempfile::tempdir;

fn settings_at(app_root: &Path, log_dir: Option<&str>) -> LoggerSettings {
    LoggerSettings {
        app_root: Some(app_root.to_path_buf()),
        log_dir: log_dir.map(Into::into),
        console: false,
        ..LoggerSettings::named("svc")
    }
    .route(Severity::Info, "info")
    .route(Severity::Error, "error")
}

/// Without a configured directory, logs go next to the application root.
#[test]
fn test_default_dir_is_sibling_of_app_root() {
    let temp = tempdir().unwrap();
    let app = temp.path().join("app");
    std::fs::create_dir(&app).unwrap();

    let handle = create_logger(settings_at(&app, None));
    assert_eq!(handle.file_sinks.log_dir(), temp.path().join("logs"));
    assert!(temp.path().join("logs").join("error").is_dir());
    handle.close().unwrap();
}

/// An empty directory string counts as unset.
#[test]
fn test_empty_dir_counts_as_unset() {
    let temp = tempdir().unwrap();
    let app = temp.path().join("app");
    let handle = create_logger(settings_at(&app, Some("")));
    assert_eq!(handle.file_sinks.log_dir(), temp.path().join("logs"));
    handle.close().unwrap();
}

/// Relative directories resolve against the application root.
#[test]
fn test_relative_dir_resolves_against_app_root() {
    let temp = tempdir().unwrap();
    let app = temp.path().join("app");
    let handle = create_logger(settings_at(&app, Some("./var/../out")));
    assert_eq!(handle.file_sinks.log_dir(), app.join("out"));
    assert_eq!(handle.file_sinks.error().unwrap().dir(), app.join("out").join("error"));
    handle.close().unwrap();
}

/// Absolute directories are used as given.
#[test]
fn test_absolute_dir_is_kept() {
    let temp = tempdir().unwrap();
    let target = temp.path().join("elsewhere");
    let handle = create_logger(settings_at(
        &temp.path().join("app"),
        Some(target.to_str().unwrap()),
    ));
    assert_eq!(handle.file_sinks.log_dir(), target);
    handle.close().unwrap();
}

/// Settings deserialize from partial documents with defaults filled in.
#[test]
fn test_settings_from_partial_json() {
    let settings: LoggerSettings = serde_json::from_value(json!({
        "name": "api",
        "min_level": "debug",
        "max_size": "5m",
        "channel_map": {
            "info": "info",
            "warn": ["info", "audit"],
            "error": "error"
        },
        "channels": {
            "audit": { "max_lifetime_secs": 86400 }
        }
    }))
    .unwrap();

    assert_eq!(settings.name, "api");
    assert_eq!(settings.file_prefix(), "api");
    assert_eq!(settings.min_level, Severity::Debug);
    assert_eq!(settings.max_size.0, 5 * 1024 * 1024);
    assert!(settings.console);
    assert_eq!(settings.channel_names(), ["info", "error", "audit"]);

    let audit = settings.channel_params("audit");
    assert_eq!(
        audit.retention.max_lifetime,
        Some(std::time::Duration::from_secs(86_400))
    );
    assert_eq!(settings.channel_params("info").retention.max_lifetime, None);
}
