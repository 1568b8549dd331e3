// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP Basic authentication in front of another handler.

use std::fmt;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::header::{self, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use subtle::ConstantTimeEq;

use super::{HandlerError, HandlerFactory, expect_object, parse_payload};
use crate::core::{GateRequest, GateResponse, Handler};
use crate::{debug_fmt, warn_fmt};

pub(crate) const KIND: &str = "basic_auth";

const DEFAULT_REALM: &str = "authorization";

/// Admits requests carrying one fixed set of credentials.
pub struct BasicAuth {
    realm: String,
    /// Complete expected `Authorization` value, `Basic <base64(user:pass)>`.
    expected: String,
    challenge: HeaderValue,
    next: Box<dyn Handler>,
}

impl BasicAuth {
    pub fn new(
        realm: Option<&str>,
        user: &str,
        pass: &str,
        next: Box<dyn Handler>,
    ) -> Result<Self, HandlerError> {
        if user.is_empty() {
            return Err(HandlerError::missing(KIND, "user"));
        }
        if pass.is_empty() {
            return Err(HandlerError::missing(KIND, "pass"));
        }

        let realm = match realm {
            Some(realm) if !realm.is_empty() => realm,
            _ => DEFAULT_REALM,
        };
        let challenge = HeaderValue::from_str(&format!("Basic realm=\"{realm}\"")).map_err(|_| {
            HandlerError::invalid(KIND, format!("realm '{realm}' is not valid header text"))
        })?;

        let encoded = general_purpose::STANDARD.encode(format!("{user}:{pass}"));

        Ok(Self {
            realm: realm.to_string(),
            expected: format!("Basic {encoded}"),
            challenge,
            next,
        })
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    fn is_authorized(&self, request: &GateRequest) -> bool {
        match request.headers.get(header::AUTHORIZATION) {
            Some(value) => bool::from(value.as_bytes().ct_eq(self.expected.as_bytes())),
            None => false,
        }
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("realm", &self.realm)
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Handler for BasicAuth {
    fn kind(&self) -> &str {
        KIND
    }

    async fn serve(&self, request: GateRequest) -> GateResponse {
        if self.is_authorized(&request) {
            debug_fmt!("BasicAuth", "Authorized {} {}", request.method, request.path);
            return self.next.serve(request).await;
        }

        warn_fmt!(
            "BasicAuth",
            "Rejected {} {} from {}",
            request.method,
            request.path,
            request
                .remote_addr
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string())
        );

        GateResponse::status_text(401)
            .with_header(header::WWW_AUTHENTICATE, self.challenge.clone())
            .with_header(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            )
    }
}

#[derive(Debug, Deserialize)]
struct BasicAuthConfig {
    realm: Option<String>,
    #[serde(default)]
    user: String,
    #[serde(default)]
    pass: String,
}

/// `basic_auth {realm?, user, pass, next}`
pub(crate) fn build(
    factory: &HandlerFactory,
    payload: &Value,
) -> Result<Box<dyn Handler>, HandlerError> {
    expect_object(KIND, payload)?;
    let config: BasicAuthConfig = parse_payload(KIND, payload)?;

    if config.user.is_empty() {
        return Err(HandlerError::missing(KIND, "user"));
    }
    if config.pass.is_empty() {
        return Err(HandlerError::missing(KIND, "pass"));
    }

    let next = factory.generate_next(KIND, payload)?;
    Ok(Box::new(BasicAuth::new(
        config.realm.as_deref(),
        &config.user,
        &config.pass,
        next,
    )?))
}
