// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reverse-proxy forwarding.
//!
//! A [`ReverseProxy`] replays each inbound request against a fixed upstream
//! origin using a shared [`UpstreamClient`], then streams the upstream
//! response back unchanged apart from hop-by-hop headers.


use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::header::{self, HeaderMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::time::timeout;

use crate::core::{GateError, GateRequest, GateResponse, Handler};
use crate::handlers::{HandlerError, HandlerFactory, parse_payload};
use crate::{debug_fmt, warn_fmt};

/// Catalog name of the reverse-proxy handler.
pub const KIND: &str = "reverse_proxy";

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Timeouts applied to every upstream exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamSettings {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_response_timeout_ms() -> u64 {
    30_000
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

/// The HTTP client shared by every reverse-proxy handler.
///
/// Cloning is cheap; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    response_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, GateError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(settings.connect_timeout_ms))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            response_timeout: Duration::from_millis(settings.response_timeout_ms),
        })
    }

    /// Deadline for the upstream response headers.
    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }
}

/// Why a location could not be used as an upstream origin.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("URL '{0}' has no host")]
    MissingHost(String),

    #[error("unsupported scheme '{scheme}' in '{url}'")]
    UnsupportedScheme { url: String, scheme: String },
}

/// Scheme and authority of an upstream origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseProxyTarget {
    scheme: String,
    authority: String,
}

impl ReverseProxyTarget {
    /// Parse an absolute `http` or `https` URL. Only scheme, host and port
    /// are kept; any path on the location is ignored.
    pub fn parse(location: &str) -> Result<Self, TargetError> {
        let url = reqwest::Url::parse(location).map_err(|e| TargetError::InvalidUrl {
            url: location.to_string(),
            message: e.to_string(),
        })?;

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host,
            _ => return Err(TargetError::MissingHost(location.to_string())),
        };

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(TargetError::UnsupportedScheme {
                    url: location.to_string(),
                    scheme: other.to_string(),
                });
            }
        }

        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Self {
            scheme: url.scheme().to_string(),
            authority,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// `host` or `host:port`.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// The outbound URL for an inbound path and query.
    pub fn url_for(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(query) => format!("{}://{}{}?{}", self.scheme, self.authority, path, query),
            None => format!("{}://{}{}", self.scheme, self.authority, path),
        }
    }
}

/// Forwards every request to one upstream origin.
#[derive(Debug)]
pub struct ReverseProxy {
    target: ReverseProxyTarget,
    upstream: UpstreamClient,
}

impl ReverseProxy {
    pub fn new(target: ReverseProxyTarget, upstream: UpstreamClient) -> Self {
        Self { target, upstream }
    }

    pub fn target(&self) -> &ReverseProxyTarget {
        &self.target
    }

    async fn forward(&self, request: GateRequest) -> Result<reqwest::Response, GateError> {
        let GateRequest {
            method,
            path,
            query,
            headers,
            body,
            ..
        } = request;

        let url = self.target.url_for(&path, query.as_deref());
        // The inbound Host travels on unchanged; the client only fills it
        // in from the URL when it is absent.
        let headers = end_to_end_headers(&headers);

        debug_fmt!("ReverseProxy", "{} {}", method, url);

        let builder = self
            .upstream
            .client
            .request(method, &url)
            .headers(headers)
            .body(body);

        let deadline = self.upstream.response_timeout();
        match timeout(deadline, builder.send()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(GateError::Timeout(deadline)),
        }
    }

    fn relay(&self, response: reqwest::Response) -> GateResponse {
        let status = response.status().as_u16();
        let headers = end_to_end_headers(response.headers());
        let authority = self.target.authority.clone();

        let stream = response.bytes_stream().inspect_err(move |e| {
            warn_fmt!("ReverseProxy", "body from {} aborted: {}", authority, e);
        });

        GateResponse {
            status,
            headers,
            body: reqwest::Body::wrap_stream(stream),
        }
    }
}

#[async_trait]
impl Handler for ReverseProxy {
    fn kind(&self) -> &str {
        KIND
    }

    async fn serve(&self, request: GateRequest) -> GateResponse {
        let method = request.method.clone();
        let url = request.url();

        match self.forward(request).await {
            Ok(response) => self.relay(response),
            Err(e) => {
                warn_fmt!(
                    "ReverseProxy",
                    "{} {} -> {} failed: {}",
                    method,
                    url,
                    self.target.authority,
                    e
                );
                GateResponse::text(
                    503,
                    format!("HTTP 503: {} unavailable ({})", self.target.authority, e),
                )
            }
        }
    }
}

/// Copy `headers` without the hop-by-hop ones, including any named by
/// `Connection`.
pub fn end_to_end_headers(headers: &HeaderMap) -> HeaderMap {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name_str = name.as_str();
        if HOP_BY_HOP.contains(&name_str) || listed.iter().any(|l| l == name_str) {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded
}

#[derive(Debug, Deserialize)]
struct ReverseProxyConfig {
    to: String,
}

/// `reverse_proxy {to}`
pub(crate) fn build(
    factory: &HandlerFactory,
    payload: &Value,
) -> Result<Box<dyn Handler>, HandlerError> {
    let config: ReverseProxyConfig = parse_payload(KIND, payload)?;
    let target = ReverseProxyTarget::parse(&config.to).map_err(|e| HandlerError::InvalidConfig {
        kind: KIND.to_string(),
        message: e.to_string(),
    })?;
    Ok(Box::new(ReverseProxy::new(target, factory.upstream().clone())))
}
