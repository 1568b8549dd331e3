// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::config::LoggingConfig;
use super::structured::{LogFormat, create_logger};
use super::*;
use std::collections::HashMap;

#[test]
fn test_level_filter_names() {
    let cases = [
        ("trace", LevelFilter::Trace),
        ("DEBUG", LevelFilter::Debug),
        ("info", LevelFilter::Info),
        ("warning", LevelFilter::Warn),
        ("error", LevelFilter::Error),
        ("off", LevelFilter::Off),
        ("chatty", LevelFilter::Info),
    ];

    for (name, expected) in cases {
        let config = LoggingConfig {
            level: name.to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(config.level_filter(), expected, "level {name}");
    }
}

#[test]
fn test_to_logger_config() {
    let mut static_fields = HashMap::new();
    static_fields.insert("service".to_string(), "hostgate".to_string());
    static_fields.insert("env".to_string(), "test".to_string());

    let config = LoggingConfig {
        structured: true,
        format: "JSON".to_string(),
        level: "critical".to_string(),
        static_fields,
    };

    let logger_config = config.to_logger_config();
    assert_eq!(logger_config.format, LogFormat::Json);
    assert_eq!(logger_config.level, slog::Level::Critical);
    assert_eq!(
        logger_config.static_fields,
        vec![
            ("env".to_string(), "test".to_string()),
            ("service".to_string(), "hostgate".to_string()),
        ]
    );

    let terminal = LoggingConfig::default().to_logger_config();
    assert_eq!(terminal.format, LogFormat::Terminal);
    assert_eq!(terminal.level, slog::Level::Info);
}

#[test]
fn test_logging_config_deserializes_with_defaults() {
    let config: LoggingConfig = serde_json::from_str(r#"{"level": "debug"}"#).unwrap();
    assert_eq!(config.level, "debug");
    assert_eq!(config.format, "terminal");
    assert!(!config.structured);
    assert!(config.static_fields.is_empty());
}

#[test]
fn test_create_logger_does_not_panic() {
    let config = LoggingConfig {
        format: "json".to_string(),
        ..LoggingConfig::default()
    };
    let logger = create_logger(&config.to_logger_config());
    slog::debug!(logger, "filtered out"; "key" => "value");
}

#[test]
fn test_init_is_idempotent() {
    init(Some(LevelFilter::Debug));
    init_with_config(&LoggingConfig::default());
    assert!(!is_structured_logging());
}

#[test]
fn test_log_error_returns_error() {
    let err = log_error("Test", "boom");
    assert_eq!(err, "boom");
}
