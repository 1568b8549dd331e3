// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed process settings resolved once from a [`Config`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{Config, ConfigError};
use crate::handlers::ReportSink;
use crate::logging::config::LoggingConfig;
use crate::proxy::UpstreamSettings;
use crate::server::ServerConfig;

/// Where the virtual-host configuration lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostsSettings {
    pub file: PathBuf,
}

impl Default for HostsSettings {
    fn default() -> Self {
        Self {
            file: PathBuf::from("rp.json"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSettings {
    pub target: ReportSink,
}

/// Everything the gate needs besides the host table itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub hosts: HostsSettings,
    pub upstream: UpstreamSettings,
    pub report: ReportSettings,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Resolve every known key, falling back to the defaults for the rest.
    ///
    /// Keys are looked up one leaf at a time so that sparse providers (such
    /// as the environment) can override single values inside a section.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let defaults = Settings::default();

        let server = ServerConfig {
            listen: config.get_or_default("server.listen", defaults.server.listen)?,
            shutdown_timeout_secs: config.get_or_default(
                "server.shutdown_timeout_secs",
                defaults.server.shutdown_timeout_secs,
            )?,
        };

        let hosts = HostsSettings {
            file: config.get_or_default("hosts.file", defaults.hosts.file)?,
        };

        let upstream = UpstreamSettings {
            connect_timeout_ms: config.get_or_default(
                "upstream.connect_timeout_ms",
                defaults.upstream.connect_timeout_ms,
            )?,
            response_timeout_ms: config.get_or_default(
                "upstream.response_timeout_ms",
                defaults.upstream.response_timeout_ms,
            )?,
        };

        let report = ReportSettings {
            target: config.get_or_default("report.target", defaults.report.target)?,
        };

        let logging = LoggingConfig {
            structured: config.get_or_default("logging.structured", defaults.logging.structured)?,
            format: config.get_or_default("logging.format", defaults.logging.format)?,
            level: config.get_or_default("logging.level", defaults.logging.level)?,
            static_fields: config
                .get_or_default("logging.static_fields", defaults.logging.static_fields)?,
        };

        Ok(Self {
            server,
            hosts,
            upstream,
            report,
            logging,
        })
    }
}
