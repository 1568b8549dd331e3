// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-request JSON reports.
//!
//! `handy_report` lets the response through unchanged and writes one JSON
//! line per request once the response body has been sent or abandoned:
//!
//! ```json
//! {"time":"2024-05-01T12:00:00.000+00:00","id":"…","remote_addr":"10.0.0.7:51234",
//!  "method":"GET","url":"/index.html","proto":"HTTP/1.1","host":"example.com",
//!  "user_agent":"curl/8.5.0","referer":"","status":200,"size":1024,"duration_ms":1.3}
//! ```

use std::io::{self, Write};
use std::mem;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use futures_util::TryStreamExt;
use http_body_util::BodyExt;
use hyper::body::Body as _;
use reqwest::Method;
use reqwest::header::{self, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{HandlerError, HandlerFactory, expect_object};
use crate::core::{GateRequest, GateResponse, Handler};
use crate::{info_fmt, warn_fmt};

pub(crate) const KIND: &str = "handy_report";

/// Where report lines go.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSink {
    #[default]
    Stdout,
    Stderr,
    /// The `log` facade at info level.
    Log,
    /// An in-memory buffer, for inspecting reports in-process.
    #[serde(skip)]
    Capture(Arc<Mutex<Vec<String>>>),
}

impl ReportSink {
    /// A capturing sink and the buffer it appends to.
    pub fn capture() -> (Self, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        (ReportSink::Capture(lines.clone()), lines)
    }

    pub fn emit(&self, line: &str) {
        let result = match self {
            ReportSink::Stdout => writeln!(io::stdout().lock(), "{line}"),
            ReportSink::Stderr => writeln!(io::stderr().lock(), "{line}"),
            ReportSink::Log => {
                info_fmt!("HandyReport", "{}", line);
                Ok(())
            }
            ReportSink::Capture(lines) => {
                match lines.lock() {
                    Ok(mut lines) => lines.push(line.to_string()),
                    Err(poisoned) => poisoned.into_inner().push(line.to_string()),
                }
                Ok(())
            }
        };
        if let Err(e) = result {
            warn_fmt!("HandyReport", "Failed to write report: {}", e);
        }
    }
}

impl PartialEq for ReportSink {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ReportSink::Stdout, ReportSink::Stdout)
            | (ReportSink::Stderr, ReportSink::Stderr)
            | (ReportSink::Log, ReportSink::Log) => true,
            (ReportSink::Capture(a), ReportSink::Capture(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// One report line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub time: String,
    pub id: String,
    pub remote_addr: String,
    pub method: String,
    pub url: String,
    pub proto: String,
    pub host: String,
    pub user_agent: String,
    pub referer: String,
    pub status: u16,
    /// Response body bytes actually sent.
    pub size: u64,
    pub duration_ms: f64,
}

impl Report {
    fn begin(request: &GateRequest) -> Self {
        Self {
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, false),
            id: Uuid::new_v4().to_string(),
            remote_addr: request
                .remote_addr
                .map(|a| a.to_string())
                .unwrap_or_default(),
            method: request.method.to_string(),
            url: request.url(),
            proto: request.protocol().to_string(),
            host: request.host().to_string(),
            user_agent: request.user_agent().to_string(),
            referer: request.referer().to_string(),
            status: 0,
            size: 0,
            duration_ms: 0.0,
        }
    }
}

/// A report waiting for its response body to finish. Emitted exactly once,
/// when dropped.
struct PendingReport {
    report: Report,
    started: Instant,
    sink: ReportSink,
}

impl Drop for PendingReport {
    fn drop(&mut self) {
        self.report.duration_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        match serde_json::to_string(&self.report) {
            Ok(line) => self.sink.emit(&line),
            Err(e) => warn_fmt!("HandyReport", "Failed to encode report: {}", e),
        }
    }
}

/// Reports on every request served by `next`.
#[derive(Debug)]
pub struct HandyReport {
    next: Box<dyn Handler>,
    sink: ReportSink,
}

impl HandyReport {
    pub fn new(next: Box<dyn Handler>, sink: ReportSink) -> Self {
        Self { next, sink }
    }
}

#[async_trait]
impl Handler for HandyReport {
    fn kind(&self) -> &str {
        KIND
    }

    async fn serve(&self, request: GateRequest) -> GateResponse {
        let started = Instant::now();
        let mut report = Report::begin(&request);
        let is_head = request.method == Method::HEAD;

        let mut response = self.next.serve(request).await;
        report.status = response.status;

        // Re-wrapping the body loses its size hint, so pin it down here.
        // HEAD bodies are empty whatever the entity length is.
        if let Some(len) = response.body.size_hint().exact() {
            if !is_head && response.status != 204 && response.status != 304 {
                response
                    .headers
                    .entry(header::CONTENT_LENGTH)
                    .or_insert_with(|| HeaderValue::from(len));
            }
        }

        let mut pending = PendingReport {
            report,
            started,
            sink: self.sink.clone(),
        };
        let body = mem::replace(&mut response.body, reqwest::Body::from(Bytes::new()));
        let stream = body
            .into_data_stream()
            .inspect_ok(move |chunk| {
                // Borrowing the whole struct moves it into the closure, so the
                // report is emitted when the stream is dropped.
                let pending = &mut pending;
                pending.report.size += chunk.len() as u64;
            });
        response.body = reqwest::Body::wrap_stream(stream);
        response
    }
}

/// `handy_report {next}`
pub(crate) fn build(
    factory: &HandlerFactory,
    payload: &Value,
) -> Result<Box<dyn Handler>, HandlerError> {
    expect_object(KIND, payload)?;
    let next = factory.generate_next(KIND, payload)?;
    Ok(Box::new(HandyReport::new(next, factory.report_sink().clone())))
}
