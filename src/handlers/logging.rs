// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request logging in front of another handler.

use async_trait::async_trait;
use serde_json::Value;

use super::{HandlerError, HandlerFactory, expect_object};
use crate::core::{GateRequest, GateResponse, Handler};
use crate::info_fmt;
use crate::logging::is_structured_logging;

pub(crate) const KIND: &str = "simple_log";

/// Logs every request in detail, then hands it to `next` untouched.
#[derive(Debug)]
pub struct SimpleLog {
    next: Box<dyn Handler>,
}

impl SimpleLog {
    pub fn new(next: Box<dyn Handler>) -> Self {
        Self { next }
    }
}

/// Header names with all of their values joined by `", "`, in first-seen
/// order.
fn header_lines(request: &GateRequest) -> Vec<(String, String)> {
    request
        .headers
        .keys()
        .map(|name| {
            let values: Vec<&str> = request
                .headers
                .get_all(name)
                .iter()
                .map(|v| v.to_str().unwrap_or("<binary>"))
                .collect();
            (name.to_string(), values.join(", "))
        })
        .collect()
}

fn remote(request: &GateRequest) -> String {
    request
        .remote_addr
        .map(|a| a.to_string())
        .unwrap_or_default()
}

fn content_length(request: &GateRequest) -> String {
    request
        .content_length()
        .map(|n| n.to_string())
        .unwrap_or_else(|| "-1".to_string())
}

/// The multi-line text record.
pub(crate) fn format_request(request: &GateRequest) -> String {
    let headers = header_lines(request);
    let cookies = request.cookies();

    let mut lines = vec![
        format!("{} {} {}", request.protocol(), request.method, request.url()),
        format!("\tHost {}", request.host()),
        format!("\tRemoteAddr {}", remote(request)),
        format!("\tContentLength {}", content_length(request)),
        format!("\tUserAgent {}", request.user_agent()),
        format!("\tReferer {}", request.referer()),
        format!("\t{} Header(s)", headers.len()),
    ];
    lines.extend(
        headers
            .iter()
            .map(|(name, values)| format!("\t\t{name}: {values}")),
    );
    lines.push(format!("\t{} Cookie(s)", cookies.len()));
    lines.extend(
        cookies
            .iter()
            .map(|(name, value)| format!("\t\t{name}={value}")),
    );
    lines.join("\n")
}

fn log_structured(request: &GateRequest) {
    let headers = header_lines(request)
        .into_iter()
        .map(|(name, values)| format!("{name}: {values}"))
        .collect::<Vec<_>>()
        .join("; ");
    let cookies = request
        .cookies()
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ");

    slog::info!(slog_scope::logger(), "request";
        "protocol" => request.protocol(),
        "method" => request.method.as_str(),
        "url" => request.url(),
        "host" => request.host(),
        "remote_addr" => remote(request),
        "content_length" => content_length(request),
        "user_agent" => request.user_agent(),
        "referer" => request.referer(),
        "headers" => headers,
        "cookies" => cookies
    );
}

#[async_trait]
impl Handler for SimpleLog {
    fn kind(&self) -> &str {
        KIND
    }

    async fn serve(&self, request: GateRequest) -> GateResponse {
        if is_structured_logging() {
            log_structured(&request);
        } else {
            info_fmt!("SimpleLog", "{}", format_request(&request));
        }
        self.next.serve(request).await
    }
}

/// `simple_log {next}`
pub(crate) fn build(
    factory: &HandlerFactory,
    payload: &Value,
) -> Result<Box<dyn Handler>, HandlerError> {
    expect_object(KIND, payload)?;
    Ok(Box::new(SimpleLog::new(factory.generate_next(KIND, payload)?)))
}
