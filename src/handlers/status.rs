// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handlers that answer on their own: fixed status codes and redirects.

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{self, HeaderValue};
use serde::Deserialize;
use serde_json::Value;

use super::{HandlerError, HandlerFactory, html_escape, parse_payload};
use crate::core::{GateRequest, GateResponse, Handler, reason_phrase};

pub(crate) const SIMPLE_CODE: &str = "simple_code";
pub(crate) const REDIRECT: &str = "redirect";

/// Final responses only; informational codes cannot end an exchange.
fn validate_status(kind: &str, code: u64) -> Result<u16, HandlerError> {
    match u16::try_from(code) {
        Ok(code) if (200..=999).contains(&code) => Ok(code),
        _ => Err(HandlerError::invalid(
            kind,
            format!("invalid status code {code}"),
        )),
    }
}

/// Statuses whose responses never carry a body.
fn is_bodiless(status: u16) -> bool {
    status == 204 || status == 304
}

/// Answers every request with one status and its reason phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleCode {
    status: u16,
}

impl SimpleCode {
    pub fn new(status: u16) -> Self {
        Self { status }
    }

    pub fn status(&self) -> u16 {
        self.status
    }
}

#[async_trait]
impl Handler for SimpleCode {
    fn kind(&self) -> &str {
        SIMPLE_CODE
    }

    async fn serve(&self, _request: GateRequest) -> GateResponse {
        if is_bodiless(self.status) {
            GateResponse::new(self.status)
        } else {
            GateResponse::status_text(self.status)
        }
    }
}

pub(crate) fn build_simple_code(
    _factory: &HandlerFactory,
    payload: &Value,
) -> Result<Box<dyn Handler>, HandlerError> {
    let code = payload.as_u64().ok_or_else(|| {
        HandlerError::invalid(SIMPLE_CODE, format!("expected a status code, got {payload}"))
    })?;
    Ok(Box::new(SimpleCode::new(validate_status(SIMPLE_CODE, code)?)))
}

/// Redirects every request to a fixed location.
#[derive(Debug, Clone)]
pub struct Redirect {
    location: HeaderValue,
    status: u16,
}

impl Redirect {
    pub const DEFAULT_STATUS: u16 = 301;

    /// `to` may be absolute or relative to the request.
    pub fn new(to: &str, status: u16) -> Result<Self, HandlerError> {
        if to.is_empty() {
            return Err(HandlerError::missing(REDIRECT, "to"));
        }

        let base = reqwest::Url::parse("http://localhost/")
            .map_err(|e| HandlerError::invalid(REDIRECT, e.to_string()))?;
        base.join(to)
            .map_err(|e| HandlerError::invalid(REDIRECT, format!("invalid target '{to}': {e}")))?;

        let location = HeaderValue::from_str(to).map_err(|_| {
            HandlerError::invalid(REDIRECT, format!("'{to}' is not a valid Location header"))
        })?;

        Ok(Self { location, status })
    }

    pub fn location(&self) -> &str {
        self.location.to_str().unwrap_or_default()
    }

    pub fn status(&self) -> u16 {
        self.status
    }
}

#[async_trait]
impl Handler for Redirect {
    fn kind(&self) -> &str {
        REDIRECT
    }

    async fn serve(&self, request: GateRequest) -> GateResponse {
        let response =
            GateResponse::new(self.status).with_header(header::LOCATION, self.location.clone());

        if request.method != Method::GET && request.method != Method::HEAD {
            return response;
        }
        if is_bodiless(self.status) {
            return response;
        }

        let body = format!(
            "<a href=\"{}\">{}</a>.\n",
            html_escape(self.location()),
            reason_phrase(self.status)
        );
        response
            .with_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            )
            .with_body(body)
    }
}

#[derive(Debug, Deserialize)]
struct RedirectConfig {
    #[serde(default)]
    to: String,
    #[serde(default)]
    code: u64,
}

pub(crate) fn build_redirect(
    _factory: &HandlerFactory,
    payload: &Value,
) -> Result<Box<dyn Handler>, HandlerError> {
    let config: RedirectConfig = parse_payload(REDIRECT, payload)?;
    let status = match config.code {
        0 => Redirect::DEFAULT_STATUS,
        code => validate_status(REDIRECT, code)?,
    };
    Ok(Box::new(Redirect::new(&config.to, status)?))
}
