// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core primitives – requests, responses & the handler capability.
//!
//! Everything that physically moves through a handler chain is defined in
//! this module.  No protocol-level logic lives here; that sits in
//! `server` (IO), `handlers` (behaviour) and `proxy` (forwarding).


use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::BodyExt;
use reqwest::header::{self, HeaderMap, HeaderValue, IntoHeaderName};
use reqwest::{Body, Method, StatusCode, Version};
use thiserror::Error;

/// Errors raised while running the gate (as opposed to loading it).
#[derive(Error, Debug)]
pub enum GateError {
    /// HTTP client error
    #[error("HTTP client error: {0}")]
    ClientError(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Timeout error
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The listen address could not be parsed or bound
    #[error("invalid listen address '{address}': {message}")]
    InvalidAddress { address: String, message: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<crate::config::ConfigError> for GateError {
    fn from(err: crate::config::ConfigError) -> Self {
        GateError::ConfigError(err.to_string())
    }
}

/// An inbound HTTP request as seen by a [`Handler`].
#[derive(Debug)]
pub struct GateRequest {
    pub method: Method,
    pub version: Version,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Body,
    pub remote_addr: Option<SocketAddr>,
}

impl GateRequest {
    /// Build a request from a method and an origin-form target (`/path?query`).
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };
        let path = if path.is_empty() { "/".to_string() } else { path };

        Self {
            method,
            version: Version::HTTP_11,
            path,
            query,
            headers: HeaderMap::new(),
            body: Body::from(Bytes::new()),
            remote_addr: None,
        }
    }

    /// Add a header, silently skipping values that are not valid header text.
    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// The raw `Host` header, port included. Empty when absent.
    pub fn host(&self) -> &str {
        self.header_str(header::HOST)
    }

    /// Path plus query string, as it appeared on the request line.
    pub fn url(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }

    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn user_agent(&self) -> &str {
        self.header_str(header::USER_AGENT)
    }

    pub fn referer(&self) -> &str {
        self.header_str(header::REFERER)
    }

    /// Protocol label in the `HTTP/x.y` form used by access logs.
    pub fn protocol(&self) -> &'static str {
        match self.version {
            Version::HTTP_09 => "HTTP/0.9",
            Version::HTTP_10 => "HTTP/1.0",
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_2 => "HTTP/2.0",
            Version::HTTP_3 => "HTTP/3.0",
            _ => "HTTP/?",
        }
    }

    /// All `name=value` pairs from every `Cookie` header, in order.
    pub fn cookies(&self) -> Vec<(String, String)> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|line| line.split(';'))
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                let value = value.trim().trim_matches('"');
                Some((name.to_string(), value.to_string()))
            })
            .collect()
    }

    fn header_str<K: header::AsHeaderName>(&self, name: K) -> &str {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }
}

/// A response produced by a [`Handler`].
#[derive(Debug)]
pub struct GateResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Body,
}

impl GateResponse {
    /// An empty response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Body::from(Bytes::new()),
        }
    }

    /// A `text/plain` response.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        let mut response = Self::new(status);
        response.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response.body = Body::from(body.into());
        response
    }

    /// A `text/plain` response whose body is the status' reason phrase.
    pub fn status_text(status: u16) -> Self {
        Self::text(status, reason_phrase(status))
    }

    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Drain the body into memory. Meant for tests and small bodies only.
    pub async fn into_bytes(self) -> Result<Bytes, GateError> {
        Ok(self.body.collect().await?.to_bytes())
    }
}

/// Canonical reason phrase for `status`, or `""` when the code has none.
pub fn reason_phrase(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}

/// Anything that can answer an HTTP request.
///
/// Handlers are built once at startup and shared read-only between all
/// in-flight requests, so implementations must not hold request-scoped
/// mutable state. Failures are answered with an HTTP status rather than
/// returned as errors.
#[async_trait::async_trait]
pub trait Handler: fmt::Debug + Send + Sync {
    /// The catalog name of this handler kind.
    fn kind(&self) -> &str;

    /// Produce the response for `request`.
    async fn serve(&self, request: GateRequest) -> GateResponse;
}
