// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Virtual-host routing table.
//!
//! The hosts document maps comma-separated host lists to handler
//! descriptions. A `default` entry is mandatory and answers every request
//! whose host has no entry of its own:
//!
//! ```json
//! {
//!   "default": "/srv/www",
//!   "api.example.com, api.internal": {"reverse_proxy": {"to": "http://10.0.0.5:8080"}},
//!   "admin.example.com": {"basic_auth": {"user": "ops", "pass": "…",
//!                                        "next": {"simple_code": 503}}}
//! }
//! ```

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::config::read_document;
use crate::core::Handler;
use crate::handlers::{HandlerError, HandlerFactory};
use crate::{debug_fmt, info_fmt};

/// Host entry used when nothing else matches.
pub const DEFAULT_HOST: &str = "default";

#[derive(Error, Debug)]
pub enum VhostError {
    /// The document is not a JSON object (or could not be read as one).
    #[error("invalid hosts configuration: {0}")]
    Parse(String),

    #[error("no configuration hosts")]
    NoHosts,

    #[error("nothing configured for 'default' host")]
    MissingDefault,

    /// A host list contains an empty name, e.g. `"a.com,,b.com"`.
    #[error("{0}: empty host name")]
    EmptyHost(String),

    #[error("{hosts}: host '{host}' is configured more than once")]
    DuplicateHost { hosts: String, host: String },

    /// The handler description for `hosts` failed to build.
    #[error("{hosts}: {source}")]
    Host {
        hosts: String,
        #[source]
        source: HandlerError,
    },

    #[error("failed to read hosts file: {0}")]
    Io(String),
}

/// Immutable map from host name to handler, with a mandatory fallback.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    routes: HashMap<String, Arc<dyn Handler>>,
    default: Arc<dyn Handler>,
}

impl RoutingTable {
    /// A table that answers every host with `default`. Add more hosts with
    /// [`RoutingTable::with_host`].
    pub fn new(default: Arc<dyn Handler>) -> Self {
        let mut routes = HashMap::new();
        routes.insert(DEFAULT_HOST.to_string(), default.clone());
        Self { routes, default }
    }

    /// Route `host` to `handler`, replacing any previous entry. Naming
    /// `default` replaces the fallback.
    pub fn with_host(mut self, host: &str, handler: Arc<dyn Handler>) -> Self {
        let host = normalize_host(host.trim());
        if host == DEFAULT_HOST {
            self.default = handler.clone();
        }
        self.routes.insert(host.to_string(), handler);
        self
    }

    /// Build the table from JSON text.
    pub fn from_json(text: &str, factory: &HandlerFactory) -> Result<Self, VhostError> {
        let document: Value =
            serde_json::from_str(text).map_err(|e| VhostError::Parse(e.to_string()))?;
        Self::from_value(&document, factory)
    }

    /// Build the table from a JSON, TOML or YAML file, chosen by extension.
    pub fn from_file(path: &Path, factory: &HandlerFactory) -> Result<Self, VhostError> {
        if !path.exists() {
            return Err(VhostError::Io(format!("{} does not exist", path.display())));
        }
        let document = read_document(path).map_err(|e| VhostError::Parse(e.to_string()))?;
        Self::from_value(&document, factory)
    }

    /// Build the table from a parsed document. Any bad entry fails the
    /// whole load.
    pub fn from_value(document: &Value, factory: &HandlerFactory) -> Result<Self, VhostError> {
        let entries = match document {
            Value::Object(entries) => entries,
            other => {
                return Err(VhostError::Parse(format!(
                    "expected an object of host entries, got {other}"
                )));
            }
        };

        if entries.is_empty() {
            return Err(VhostError::NoHosts);
        }
        let has_default = entries
            .keys()
            .any(|hosts| hosts.split(',').any(|name| name.trim() == DEFAULT_HOST));
        if !has_default {
            return Err(VhostError::MissingDefault);
        }

        let mut routes: HashMap<String, Arc<dyn Handler>> = HashMap::new();
        for (hosts, description) in entries {
            let names = split_hosts(hosts)?;

            let handler: Arc<dyn Handler> = factory
                .generate(description)
                .map_err(|source| VhostError::Host {
                    hosts: hosts.clone(),
                    source,
                })?
                .into();

            for name in names {
                if routes.contains_key(&name) {
                    return Err(VhostError::DuplicateHost {
                        hosts: hosts.clone(),
                        host: name,
                    });
                }
                debug_fmt!("RoutingTable", "{} -> {}", name, handler.kind());
                routes.insert(name, handler.clone());
            }
        }

        let default = routes
            .get(DEFAULT_HOST)
            .cloned()
            .ok_or(VhostError::MissingDefault)?;

        info_fmt!("RoutingTable", "Loaded {} host entries", routes.len());
        Ok(Self { routes, default })
    }

    /// The handler for a `Host` header value. Never fails: unknown hosts get
    /// the default handler.
    pub fn route(&self, host: &str) -> &Arc<dyn Handler> {
        self.routes
            .get(normalize_host(host))
            .unwrap_or(&self.default)
    }

    /// Whether `host` has its own entry (rather than falling back).
    pub fn contains(&self, host: &str) -> bool {
        self.routes.contains_key(normalize_host(host))
    }

    /// Every configured host name, sorted.
    pub fn hosts(&self) -> Vec<&str> {
        let mut hosts: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        hosts.sort_unstable();
        hosts
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Always false; a loaded table has at least the default entry.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Everything before the first `:`. Bracketed IPv6 literals are therefore
/// not supported as host keys.
pub fn normalize_host(host: &str) -> &str {
    match host.split_once(':') {
        Some((name, _)) => name,
        None => host,
    }
}

fn split_hosts(hosts: &str) -> Result<Vec<String>, VhostError> {
    hosts
        .split(',')
        .map(|name| {
            let name = name.trim();
            if name.is_empty() {
                Err(VhostError::EmptyHost(hosts.to_string()))
            } else {
                Ok(name.to_string())
            }
        })
        .collect()
}
