// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Environment variable settings provider.
//!
//! `HOSTGATE_UPSTREAM_CONNECT_TIMEOUT_MS=250` answers the key
//! `upstream.connect_timeout_ms`: both the variable name (minus prefix) and
//! the requested key are folded to lowercase with `_` and `.` treated alike.

use serde_json::{Value, json};
use std::collections::HashMap;
use std::env;

use super::ConfigError;
use super::ConfigProvider;

pub const DEFAULT_ENV_PREFIX: &str = "HOSTGATE_";

#[derive(Debug)]
pub struct EnvConfigProvider {
    prefix: String,
    cache: HashMap<String, String>,
}

impl EnvConfigProvider {
    pub fn new(prefix: &str) -> Self {
        let mut provider = Self {
            prefix: prefix.to_string(),
            cache: HashMap::new(),
        };
        provider.refresh_cache();
        provider
    }

    /// Re-read the process environment.
    pub fn refresh_cache(&mut self) {
        self.cache = env::vars()
            .filter_map(|(key, value)| {
                key.strip_prefix(&self.prefix)
                    .map(|rest| (fold_key(rest), value))
            })
            .collect();
    }

    /// Environment values are untyped; try JSON, then bool/number, then string.
    fn parse_value(value: &str) -> Value {
        if let Ok(json_value) = serde_json::from_str(value) {
            return json_value;
        }
        if value.eq_ignore_ascii_case("true") {
            return json!(true);
        }
        if value.eq_ignore_ascii_case("false") {
            return json!(false);
        }
        json!(value)
    }
}

impl Default for EnvConfigProvider {
    fn default() -> Self {
        Self::new(DEFAULT_ENV_PREFIX)
    }
}

fn fold_key(key: &str) -> String {
    key.to_lowercase().replace('_', ".")
}

impl ConfigProvider for EnvConfigProvider {
    fn has(&self, key: &str) -> bool {
        self.cache.contains_key(&fold_key(key))
    }

    fn provider_name(&self) -> &str {
        "env"
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.cache.get(&fold_key(key)).map(|v| Self::parse_value(v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigProviderExt;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_provider_folds_underscores() {
        unsafe {
            env::set_var("HGTEST_SERVER_LISTEN", "127.0.0.1:9000");
            env::set_var("HGTEST_UPSTREAM_CONNECT_TIMEOUT_MS", "250");
            env::set_var("HGTEST_LOGGING_STRUCTURED", "TRUE");
        }

        let provider = EnvConfigProvider::new("HGTEST_");

        assert!(provider.has("server.listen"));
        assert!(!provider.has("server.port"));

        let listen: String = provider.get("server.listen").unwrap().unwrap();
        assert_eq!(listen, "127.0.0.1:9000");

        let timeout: u64 = provider
            .get("upstream.connect_timeout_ms")
            .unwrap()
            .unwrap();
        assert_eq!(timeout, 250);

        let structured: bool = provider.get("logging.structured").unwrap().unwrap();
        assert!(structured);

        unsafe {
            env::remove_var("HGTEST_SERVER_LISTEN");
            env::remove_var("HGTEST_UPSTREAM_CONNECT_TIMEOUT_MS");
            env::remove_var("HGTEST_LOGGING_STRUCTURED");
        }
    }

    #[test]
    #[serial]
    fn test_cache_refresh() {
        let mut provider = EnvConfigProvider::new("HGREFRESH_");
        assert!(!provider.has("value"));

        unsafe {
            env::set_var("HGREFRESH_VALUE", "42");
        }
        assert!(!provider.has("value"));

        provider.refresh_cache();
        let value: i32 = provider.get("value").unwrap().unwrap();
        assert_eq!(value, 42);

        unsafe {
            env::remove_var("HGREFRESH_VALUE");
        }
    }

    #[test]
    fn test_parse_value_falls_back_to_string() {
        assert_eq!(EnvConfigProvider::parse_value("[1,2]"), json!([1, 2]));
        assert_eq!(EnvConfigProvider::parse_value("False"), json!(false));
        assert_eq!(EnvConfigProvider::parse_value("0.0.0.0:80"), json!("0.0.0.0:80"));
    }
}
