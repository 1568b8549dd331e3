// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration for logging.

use crate::logging::structured::{LogFormat, LoggerConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Route records through the slog pipeline instead of env_logger
    #[serde(default)]
    pub structured: bool,

    /// Log format (terminal or json), structured logging only
    #[serde(default = "default_format")]
    pub format: String,

    /// Log level
    #[serde(default = "default_level")]
    pub level: String,

    /// Static fields to include in all structured logs
    #[serde(default)]
    pub static_fields: HashMap<String, String>,
}

fn default_format() -> String {
    "terminal".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            structured: false,
            format: default_format(),
            level: default_level(),
            static_fields: HashMap::new(),
        }
    }
}

impl LoggingConfig {
    /// The `log` level filter for `level`; unknown names fall back to info.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.to_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "warn" | "warning" => LevelFilter::Warn,
            "error" | "critical" => LevelFilter::Error,
            _ => LevelFilter::Info,
        }
    }

    /// Convert to logger config
    pub fn to_logger_config(&self) -> LoggerConfig {
        let mut static_fields: Vec<(String, String)> = self
            .static_fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        static_fields.sort();

        LoggerConfig {
            format: match self.format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Terminal,
            },
            level: match self.level.to_lowercase().as_str() {
                "trace" => slog::Level::Trace,
                "debug" => slog::Level::Debug,
                "info" => slog::Level::Info,
                "warn" | "warning" => slog::Level::Warning,
                "error" => slog::Level::Error,
                "critical" => slog::Level::Critical,
                _ => slog::Level::Info,
            },
            static_fields,
        }
    }
}
