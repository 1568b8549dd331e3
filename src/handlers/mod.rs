// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handler catalog and the factory protocol.
//!
//! A handler description is a JSON object with exactly one key, the handler
//! kind, whose value is that kind's payload:
//!
//! ```json
//! {"basic_auth": {"user": "alice", "pass": "secret",
//!                 "next": {"file_server": {"root": "/srv/www"}}}}
//! ```
//!
//! Wrapping kinds build their inner handler by running the same protocol on
//! their `next` field. A bare string is accepted as a location: an existing
//! directory is served with `file_server`, an absolute URL is proxied with
//! `reverse_proxy`.
//!
//! | kind           | payload                          |
//! |----------------|----------------------------------|
//! | `file_server`  | `{root}`                         |
//! | `redirect`     | `{to, code?}`                    |
//! | `basic_auth`   | `{realm?, user, pass, next}`     |
//! | `simple_log`   | `{next}`                         |
//! | `simple_code`  | `<integer>`                      |
//! | `handy_report` | `{next}`                         |
//! | `reverse_proxy`| `{to}`                           |

mod auth;
mod files;
mod logging;
mod report;
mod status;


pub use auth::BasicAuth;
pub use files::FileServer;
pub use logging::SimpleLog;
pub use report::{HandyReport, Report, ReportSink};
pub use status::{Redirect, SimpleCode};

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::{GateError, Handler};
use crate::proxy::{self, ReverseProxy, ReverseProxyTarget, UpstreamClient, UpstreamSettings};
use crate::{debug_fmt, error_fmt};

/// Why a handler description could not be turned into a handler.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The description object has no key.
    #[error("no handler declared")]
    NoHandler,

    /// The description object has more than one key.
    #[error("multiple handlers declared")]
    MultipleHandlers,

    #[error("invalid handler '{0}'")]
    UnknownKind(String),

    /// The description is neither an object nor a location string.
    #[error("invalid handler description: expected an object or a string, got {0}")]
    InvalidDescription(String),

    #[error("{kind}: {message}")]
    InvalidConfig { kind: String, message: String },

    #[error("{kind}: '{field}' required")]
    MissingField { kind: String, field: String },

    /// The `next` handler of a wrapping kind failed.
    #[error("{kind}: 'next': {source}")]
    Nested {
        kind: String,
        source: Box<HandlerError>,
    },

    /// A location string is neither a directory nor an upstream URL.
    #[error("can't parse '{0}'")]
    CantParse(String),
}

impl HandlerError {
    /// Dotted path through the nesting to the failing description,
    /// e.g. `basic_auth.next.simple_log.next`. Empty for top-level errors.
    pub fn path(&self) -> String {
        let mut segments = Vec::new();
        let mut current = self;
        while let HandlerError::Nested { kind, source } = current {
            segments.push(kind.as_str());
            segments.push("next");
            current = source;
        }
        segments.join(".")
    }

    /// The innermost error, below every `Nested` layer.
    pub fn root_cause(&self) -> &HandlerError {
        match self {
            HandlerError::Nested { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub(crate) fn invalid(kind: &str, message: impl Into<String>) -> Self {
        HandlerError::InvalidConfig {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn missing(kind: &str, field: &str) -> Self {
        HandlerError::MissingField {
            kind: kind.to_string(),
            field: field.to_string(),
        }
    }
}

/// Builds a handler of one kind from its payload.
pub type HandlerConstructor =
    fn(&HandlerFactory, &Value) -> Result<Box<dyn Handler>, HandlerError>;

/// Every handler kind that may appear in a configuration.
static CATALOG: [(&str, HandlerConstructor); 7] = [
    (files::KIND, files::build),
    (status::REDIRECT, status::build_redirect),
    (auth::KIND, auth::build),
    (logging::KIND, logging::build),
    (status::SIMPLE_CODE, status::build_simple_code),
    (report::KIND, report::build),
    (proxy::KIND, proxy::build),
];

/// Turns handler descriptions into handlers.
///
/// Holds what constructors need besides their payload: the shared upstream
/// client and the report sink.
#[derive(Debug, Clone)]
pub struct HandlerFactory {
    upstream: UpstreamClient,
    report_sink: ReportSink,
}

impl HandlerFactory {
    pub fn new(upstream: UpstreamClient, report_sink: ReportSink) -> Self {
        Self {
            upstream,
            report_sink,
        }
    }

    /// A factory with default upstream timeouts reporting to stdout.
    pub fn with_defaults() -> Result<Self, GateError> {
        Ok(Self::new(
            UpstreamClient::new(&UpstreamSettings::default())?,
            ReportSink::default(),
        ))
    }

    /// Names of every registered kind, in registration order.
    pub fn kinds() -> impl Iterator<Item = &'static str> {
        CATALOG.iter().map(|(name, _)| *name)
    }

    pub fn upstream(&self) -> &UpstreamClient {
        &self.upstream
    }

    pub fn report_sink(&self) -> &ReportSink {
        &self.report_sink
    }

    /// Build the handler described by `description`.
    pub fn generate(&self, description: &Value) -> Result<Box<dyn Handler>, HandlerError> {
        let map = match description {
            Value::Object(map) => map,
            Value::String(location) => return self.generate_location(location),
            other => return Err(HandlerError::InvalidDescription(json_type(other).to_string())),
        };

        let mut entries = map.iter();
        let (kind, payload) = match (entries.next(), entries.next()) {
            (None, _) => return Err(HandlerError::NoHandler),
            (Some(entry), None) => entry,
            (Some(_), Some(_)) => return Err(HandlerError::MultipleHandlers),
        };

        let constructor = CATALOG
            .iter()
            .find(|(name, _)| *name == kind.as_str())
            .map(|(_, constructor)| *constructor)
            .ok_or_else(|| HandlerError::UnknownKind(kind.clone()))?;

        debug_fmt!("HandlerFactory", "Building '{}' handler", kind);
        constructor(self, payload)
    }

    /// Interpret a location string: an existing directory or an upstream URL.
    pub fn generate_location(&self, location: &str) -> Result<Box<dyn Handler>, HandlerError> {
        if !location.is_empty() && Path::new(location).is_dir() {
            let server = FileServer::new(location)
                .map_err(|e| HandlerError::invalid(files::KIND, e.to_string()))?;
            return Ok(Box::new(server));
        }

        match ReverseProxyTarget::parse(location) {
            Ok(target) => Ok(Box::new(ReverseProxy::new(target, self.upstream.clone()))),
            Err(e) => {
                debug_fmt!("HandlerFactory", "'{}' is not a location: {}", location, e);
                Err(HandlerError::CantParse(location.to_string()))
            }
        }
    }

    /// Build the inner handler of the wrapping kind `kind` from its `next`
    /// field, attributing any failure to `kind`.
    pub(crate) fn generate_next(
        &self,
        kind: &str,
        payload: &Value,
    ) -> Result<Box<dyn Handler>, HandlerError> {
        let next = payload
            .get("next")
            .ok_or_else(|| HandlerError::missing(kind, "next"))?;

        self.generate(next).map_err(|source| HandlerError::Nested {
            kind: kind.to_string(),
            source: Box::new(source),
        })
    }
}

/// Deserialize a payload in place, reporting failures against `kind`.
pub(crate) fn parse_payload<'de, T: Deserialize<'de>>(
    kind: &str,
    payload: &'de Value,
) -> Result<T, HandlerError> {
    T::deserialize(payload).map_err(|e| {
        let err = HandlerError::invalid(kind, e.to_string());
        error_fmt!("HandlerFactory", "{}", err);
        err
    })
}

/// Wrapping payloads must be objects; anything else is rejected up front.
pub(crate) fn expect_object(kind: &str, payload: &Value) -> Result<(), HandlerError> {
    if payload.is_object() {
        Ok(())
    } else {
        Err(HandlerError::invalid(
            kind,
            format!("expected an object, got {}", json_type(payload)),
        ))
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Escape text for inclusion in HTML element content or attribute values.
pub(crate) fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
