// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP front door.
//!
//! The server is a thin wrapper around **hyper-util**. It owns the listening
//! socket, turns every inbound request into a [`GateRequest`], picks the
//! handler for its `Host` header from the [`RoutingTable`] and turns the
//! resulting [`GateResponse`] back into a hyper response.
//!
//! Connections are served by `hyper_util::server::conn::auto::Builder`, so
//! HTTP/1.1 and HTTP/2 (prior knowledge) share one listener. Request and
//! response bodies are streamed in both directions.


use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::{Body as _, Incoming};
use hyper::header::{self, HeaderValue};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use reqwest::Body;
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::core::{GateError, GateRequest, GateResponse};
use crate::vhost::{DEFAULT_HOST, RoutingTable, normalize_host};
use crate::{debug_fmt, error_fmt, info_fmt, trace_fmt, warn_fmt};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// `ip:port`, or `:port` for every interface.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// How long in-flight connections get to finish after a shutdown signal.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_listen() -> String {
    "0.0.0.0:80".to_string()
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr, GateError> {
        let listen = self.listen.trim();
        let candidate = if listen.starts_with(':') {
            format!("0.0.0.0{listen}")
        } else {
            listen.to_string()
        };

        candidate
            .parse()
            .map_err(|e: std::net::AddrParseError| GateError::InvalidAddress {
                address: self.listen.clone(),
                message: e.to_string(),
            })
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Serves a routing table over HTTP.
#[derive(Debug, Clone)]
pub struct GateServer {
    config: ServerConfig,
    table: Arc<RoutingTable>,
}

impl GateServer {
    pub fn new(config: ServerConfig, table: Arc<RoutingTable>) -> Self {
        Self { config, table }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn table(&self) -> &Arc<RoutingTable> {
        &self.table
    }

    /// Bind the configured address and serve until Ctrl-C or SIGTERM.
    pub async fn start(&self) -> Result<(), GateError> {
        let addr = self.config.listen_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GateError::InvalidAddress {
                address: self.config.listen.clone(),
                message: e.to_string(),
            })?;

        info_fmt!("Server", "Listening on http://{}", listener.local_addr()?);
        self.serve(listener, shutdown_signal()).await
    }

    /// Accept connections on `listener` until `shutdown` resolves, then let
    /// in-flight connections drain for at most the configured timeout.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), GateError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info_fmt!("Server", "Shutdown requested, no longer accepting connections");
                    break;
                }

                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        trace_fmt!("Server", "Accepted connection from {}", remote_addr);
                        connections.spawn(serve_connection(
                            stream,
                            remote_addr,
                            self.table.clone(),
                            shutdown_rx.clone(),
                        ));
                    }
                    Err(e) => error_fmt!("Server", "Accept failed: {}", e),
                },

                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = finished {
                        if e.is_panic() {
                            error_fmt!("Server", "Connection task panicked: {}", e);
                        }
                    }
                }
            }
        }
        drop(listener);

        let _ = shutdown_tx.send(true);

        let deadline = self.config.shutdown_timeout();
        let drained = tokio::time::timeout(deadline, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn_fmt!(
                "Server",
                "{} connection(s) still open after {:?}, aborting them",
                connections.len(),
                deadline
            );
            connections.shutdown().await;
        }

        info_fmt!("Server", "Server stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    table: Arc<RoutingTable>,
    mut shutdown: watch::Receiver<bool>,
) {
    let service = service_fn(move |req: Request<Incoming>| {
        let table = table.clone();
        async move { handle_request(req, table, remote_addr).await }
    });

    let builder = AutoBuilder::new(TokioExecutor::new());
    let connection = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = shutdown.changed() => {
            connection.as_mut().graceful_shutdown();
            connection.await
        }
    };

    if let Err(e) = result {
        let message = e.to_string();
        if message.contains("connection closed") || message.contains("reset") {
            debug_fmt!("Server", "Connection from {} closed: {}", remote_addr, message);
        } else {
            warn_fmt!("Server", "Connection from {} failed: {}", remote_addr, message);
        }
    }
}

async fn handle_request(
    req: Request<Incoming>,
    table: Arc<RoutingTable>,
    remote_addr: SocketAddr,
) -> Result<Response<Body>, Infallible> {
    let request = convert_request(req, remote_addr);
    let response = dispatch(&table, request).await;
    Ok(convert_response(response))
}

/// Hand `request` to the handler registered for its host.
pub async fn dispatch(table: &RoutingTable, request: GateRequest) -> GateResponse {
    let host = request.host();
    let handler = table.route(host).clone();
    let entry = if table.contains(host) {
        normalize_host(host)
    } else {
        DEFAULT_HOST
    };
    debug_fmt!(
        "Server",
        "{} {} {} -> {} ({})",
        request.method,
        host,
        request.url(),
        entry,
        handler.kind()
    );
    handler.serve(request).await
}

/// Hyper request to [`GateRequest`]. HTTP/2 requests carry their host in the
/// `:authority` pseudo-header, which is copied into `Host` when missing.
fn convert_request(req: Request<Incoming>, remote_addr: SocketAddr) -> GateRequest {
    let (parts, body) = req.into_parts();

    let mut headers = parts.headers;
    if !headers.contains_key(header::HOST) {
        if let Some(authority) = parts.uri.authority() {
            if let Ok(value) = HeaderValue::from_str(authority.as_str()) {
                headers.insert(header::HOST, value);
            }
        }
    }

    let body = if body.is_end_stream() {
        Body::from(Bytes::new())
    } else {
        Body::wrap_stream(body.into_data_stream())
    };

    GateRequest {
        method: parts.method,
        version: parts.version,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers,
        body,
        remote_addr: Some(remote_addr),
    }
}

fn convert_response(response: GateResponse) -> Response<Body> {
    let status = StatusCode::from_u16(response.status).unwrap_or_else(|_| {
        error_fmt!("Server", "Handler produced invalid status {}", response.status);
        StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut converted = Response::new(response.body);
    *converted.status_mut() = status;
    *converted.headers_mut() = response.headers;
    converted
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn_fmt!("Server", "Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = signal::ctrl_c() => match result {
            Ok(()) => info_fmt!("Server", "Received Ctrl-C, shutting down"),
            Err(e) => error_fmt!("Server", "Failed to listen for Ctrl-C: {}", e),
        },
        _ = terminate => info_fmt!("Server", "Received SIGTERM, shutting down"),
    }
}
