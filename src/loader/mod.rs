// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! High-level entry point.
//!
//! [`GateLoader`] layers the settings sources, initialises logging, builds
//! the handler factory and the routing table, and returns a [`Gate`] ready
//! to serve. Sources are consulted in this order, later ones winning:
//!
//! 1. built-in defaults
//! 2. the settings file
//! 3. providers added with [`GateLoader::with_provider`]
//! 4. `HOSTGATE_*` environment variables
//! 5. explicit overrides (`with_hosts_file`, `with_listen`)


use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{
    Config, ConfigError, ConfigProvider, EnvConfigProvider, FileConfigProvider, Settings,
};
use crate::core::GateError;
use crate::handlers::HandlerFactory;
use crate::logging;
use crate::proxy::UpstreamClient;
use crate::server::GateServer;
use crate::vhost::{RoutingTable, VhostError};
use crate::{debug_fmt, info_fmt};

/// Errors that can occur while starting the gate.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Hosts(#[from] VhostError),

    #[error("{0}")]
    Gate(#[from] GateError),
}

/// Builder for a [`Gate`].
#[derive(Debug, Default)]
pub struct GateLoader {
    settings_file: Option<String>,
    use_env_vars: bool,
    env_prefix: Option<String>,
    providers: Vec<Arc<dyn ConfigProvider>>,
    hosts_file: Option<PathBuf>,
    hosts_json: Option<String>,
    listen: Option<String>,
}

impl GateLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from a JSON, TOML or YAML file.
    pub fn with_settings_file(mut self, path: &str) -> Self {
        self.settings_file = Some(path.to_string());
        self
    }

    /// Read settings from `HOSTGATE_*` environment variables.
    pub fn with_env_vars(mut self) -> Self {
        self.use_env_vars = true;
        self
    }

    /// Read settings from environment variables with a custom prefix.
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self.use_env_vars = true;
        self
    }

    pub fn with_provider<P: ConfigProvider + 'static>(mut self, provider: P) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Load the hosts configuration from `path`, overriding `hosts.file`.
    pub fn with_hosts_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.hosts_file = Some(path.into());
        self
    }

    /// Use an in-memory hosts document instead of a file.
    pub fn with_hosts_json(mut self, json: &str) -> Self {
        self.hosts_json = Some(json.to_string());
        self
    }

    /// Override `server.listen`.
    pub fn with_listen(mut self, listen: &str) -> Self {
        self.listen = Some(listen.to_string());
        self
    }

    fn config(&self) -> Result<Config, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = &self.settings_file {
            builder = builder.with_provider(FileConfigProvider::new(path)?);
        }
        for provider in &self.providers {
            builder = builder.with_shared_provider(provider.clone());
        }
        if self.use_env_vars {
            let provider = match &self.env_prefix {
                Some(prefix) => EnvConfigProvider::new(prefix),
                None => EnvConfigProvider::default(),
            };
            builder = builder.with_provider(provider);
        }

        Ok(builder.build())
    }

    /// Resolve the settings without building anything else.
    pub fn settings(&self) -> Result<Settings, LoaderError> {
        let config = self.config()?;
        let mut settings = Settings::from_config(&config)?;

        if let Some(path) = &self.hosts_file {
            settings.hosts.file = path.clone();
        }
        if let Some(listen) = &self.listen {
            settings.server.listen = listen.clone();
        }
        Ok(settings)
    }

    pub fn build(self) -> Result<Gate, LoaderError> {
        let settings = self.settings()?;
        logging::init_with_config(&settings.logging);
        info_fmt!("Startup", "hostgate {} starting", env!("CARGO_PKG_VERSION"));

        let upstream = UpstreamClient::new(&settings.upstream)
            .map_err(|e| logging::log_error("Startup", e))?;
        let factory = HandlerFactory::new(upstream, settings.report.target.clone());

        let table = match &self.hosts_json {
            Some(json) => RoutingTable::from_json(json, &factory),
            None => {
                debug_fmt!("Startup", "Reading hosts from {}", settings.hosts.file.display());
                RoutingTable::from_file(&settings.hosts.file, &factory)
            }
        };
        let table = Arc::new(table.map_err(|e| logging::log_error("Startup", e))?);

        let server = GateServer::new(settings.server.clone(), table.clone());
        Ok(Gate {
            settings,
            table,
            server,
        })
    }
}

/// A loaded gate: settings, routing table and the server that serves it.
#[derive(Debug, Clone)]
pub struct Gate {
    settings: Settings,
    table: Arc<RoutingTable>,
    server: GateServer,
}

impl Gate {
    pub fn loader() -> GateLoader {
        GateLoader::new()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn table(&self) -> &Arc<RoutingTable> {
        &self.table
    }

    pub fn server(&self) -> &GateServer {
        &self.server
    }

    /// Serve until Ctrl-C or SIGTERM.
    pub async fn start(&self) -> Result<(), LoaderError> {
        self.server.start().await.map_err(LoaderError::Gate)
    }
}
