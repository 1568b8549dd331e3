// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Process settings
//!
//! Settings are resolved from an ordered list of [`ConfigProvider`]s; later
//! providers override earlier ones.  The stacking used by the binary is:
//!
//! 1. `FileConfigProvider` – `hostgate.{toml,json,yaml}` (optional)
//! 2. `EnvConfigProvider`  – `HOSTGATE_SERVER_LISTEN=0.0.0.0:8080`
//! 3. command-line flags, applied by the loader on top of the result
//!
//! The providers are only consulted once: [`Settings::from_config`] turns
//! them into a plain, typed value that is then passed down by ownership.
//!
//! | key | type | default | description |
//! |-----|------|---------|-------------|
//! | `server.listen`                 | socket address | `0.0.0.0:80` | Address to bind            |
//! | `server.shutdown_timeout_secs`  | integer        | `30`         | Connection drain deadline  |
//! | `hosts.file`                    | path           | `rp.json`    | Virtual-host configuration |
//! | `upstream.connect_timeout_ms`   | integer        | `5000`       | Upstream connect deadline  |
//! | `upstream.response_timeout_ms`  | integer        | `30000`      | Upstream response deadline |
//! | `report.target`                 | string         | `stdout`     | `handy_report` sink        |
//! | `logging.level`                 | string         | `info`       | Log level                  |
//! | `logging.structured`            | bool           | `false`      | Use the slog pipeline      |
//! | `logging.format`                | string         | `terminal`   | `terminal` or `json`       |

mod env;
pub mod error;
mod file;
mod settings;

#[cfg(test)]
mod tests;

pub use env::EnvConfigProvider;
pub use error::ConfigError;
pub use file::{FileConfigProvider, FileFormat, read_document};
pub use settings::{HostsSettings, ReportSettings, Settings};

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// A source of raw settings values addressed by dot-separated keys.
pub trait ConfigProvider: Debug + Send + Sync {
    /// Check if the provider has a value for the given key.
    fn has(&self, key: &str) -> bool;

    /// Name used in logs and error messages.
    fn provider_name(&self) -> &str;

    /// Get a raw value by key.
    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError>;
}

/// Typed access on top of [`ConfigProvider`]. Kept separate so the base
/// trait stays object-safe.
pub trait ConfigProviderExt: ConfigProvider {
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get_raw(key)? {
            Some(value) => deserialize_value(key, value).map(Some),
            None => Ok(None),
        }
    }
}

impl<T: ConfigProvider> ConfigProviderExt for T {}

fn deserialize_value<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, ConfigError> {
    serde_json::from_value(value)
        .map_err(|e| ConfigError::ParseError(format!("failed to deserialize '{key}': {e}")))
}

/// Builder for a layered [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    providers: Vec<Arc<dyn ConfigProvider>>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider. Providers added later take precedence.
    pub fn with_provider<P: ConfigProvider + 'static>(mut self, provider: P) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn with_shared_provider(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn build(self) -> Config {
        Config {
            providers: self.providers,
        }
    }
}

/// A stack of providers queried from the most recently added down.
#[derive(Debug, Clone, Default)]
pub struct Config {
    providers: Vec<Arc<dyn ConfigProvider>>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        for provider in self.providers.iter().rev() {
            if provider.has(key) {
                return provider.get_raw(key);
            }
        }
        Ok(None)
    }

    /// Get a value from the highest-priority provider that has `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get_raw(key)? {
            Some(value) => deserialize_value(key, value).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_or_default<T: DeserializeOwned>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, ConfigError> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.provider_name()).collect()
    }
}
