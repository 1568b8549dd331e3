// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! hostgate - a configuration-driven, host-based HTTP front door.
//!
//! One listener answers for many virtual hosts. Each host (or comma-separated
//! list of hosts) is bound to a handler described in a JSON, TOML or YAML
//! document, and handlers compose by wrapping a `next` handler:
//!
//! ```json
//! {
//!   "default": "/srv/www",
//!   "api.example.com": {"handy_report": {"next": {"reverse_proxy": {"to": "http://10.0.0.5:8080"}}}},
//!   "old.example.com": {"redirect": {"to": "https://example.com/", "code": 308}}
//! }
//! ```
//!
//! # Running
//!
//! ```rust,no_run
//! use hostgate::Gate;
//!
//! # async fn run() -> Result<(), hostgate::LoaderError> {
//! let gate = Gate::loader()
//!     .with_env_vars()
//!     .with_hosts_file("rp.json")
//!     .with_listen(":8080")
//!     .build()?;
//! gate.start().await
//! # }
//! ```
//!
//! # Custom handlers
//!
//! Anything implementing [`Handler`] can be routed through a [`RoutingTable`]
//! built in code with [`RoutingTable::new`] and [`RoutingTable::with_host`],
//! then served with [`GateServer`].

pub mod config;
pub mod core;
pub mod handlers;
pub mod loader;
pub mod logging;
pub mod proxy;
pub mod server;
pub mod vhost;

#[doc(hidden)]
pub use log;

pub use config::{Config, ConfigError, ConfigProvider, ConfigProviderExt, Settings};
pub use core::{GateError, GateRequest, GateResponse, Handler};
pub use handlers::{HandlerError, HandlerFactory, ReportSink};
pub use loader::{Gate, GateLoader, LoaderError};
pub use proxy::{ReverseProxy, ReverseProxyTarget, UpstreamClient, UpstreamSettings};
pub use server::{GateServer, ServerConfig};
pub use vhost::{RoutingTable, VhostError};
