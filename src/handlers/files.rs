// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static directory serving.

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use reqwest::header::{self, HeaderValue};
use serde::Deserialize;
use serde_json::Value;

use super::{HandlerError, HandlerFactory, html_escape, parse_payload};
use crate::core::{GateRequest, GateResponse, Handler};
use crate::{debug_fmt, error_fmt, warn_fmt};

pub(crate) const KIND: &str = "file_server";

const INDEX_FILE: &str = "index.html";

/// Serves files and directory listings below a root directory.
#[derive(Debug, Clone)]
pub struct FileServer {
    root: PathBuf,
}

impl FileServer {
    /// `root` must exist and be a directory.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        let metadata = std::fs::metadata(&root).map_err(|e| {
            io::Error::new(e.kind(), format!("cannot open root '{}': {e}", root.display()))
        })?;
        if !metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("root '{}' is not a directory", root.display()),
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path onto a path relative to the root. `None` when the
    /// path is not valid UTF-8 after decoding or tries to climb out.
    fn resolve(request_path: &str) -> Option<PathBuf> {
        let decoded = urlencoding::decode(request_path).ok()?;

        let mut relative = PathBuf::new();
        for segment in decoded.split('/') {
            match segment {
                "" | "." => {}
                ".." => return None,
                s if s.contains('\0') || s.contains('\\') => return None,
                s => relative.push(s),
            }
        }
        Some(relative)
    }

    async fn serve_file(
        &self,
        path: &Path,
        metadata: &Metadata,
        request: &GateRequest,
    ) -> GateResponse {
        let modified = metadata.modified().ok();
        if let Some(modified) = modified {
            if not_modified_since(request, modified) {
                return GateResponse::new(304)
                    .with_header(header::LAST_MODIFIED, http_date(modified));
            }
        }

        let mut response = GateResponse::new(200)
            .with_header(header::CONTENT_TYPE, content_type(path))
            .with_header(header::CONTENT_LENGTH, HeaderValue::from(metadata.len()));
        if let Some(modified) = modified {
            response = response.with_header(header::LAST_MODIFIED, http_date(modified));
        }

        if request.method == Method::HEAD {
            return response;
        }

        match tokio::fs::File::open(path).await {
            Ok(file) => response.with_body(file),
            Err(e) => io_error_response(path, &e),
        }
    }

    async fn list_directory(&self, path: &Path, request: &GateRequest) -> GateResponse {
        let mut entries = match tokio::fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) => return io_error_response(path, &e),
        };

        let mut names = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let mut name = entry.file_name().to_string_lossy().into_owned();
                    let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                    if is_dir {
                        name.push('/');
                    }
                    names.push(name);
                }
                Ok(None) => break,
                Err(e) => return io_error_response(path, &e),
            }
        }
        names.sort();

        let mut body = String::from("<pre>\n");
        for name in &names {
            let href = match name.strip_suffix('/') {
                Some(dir) => format!("{}/", urlencoding::encode(dir)),
                None => urlencoding::encode(name).into_owned(),
            };
            body.push_str(&format!(
                "<a href=\"{}\">{}</a>\n",
                html_escape(&href),
                html_escape(name)
            ));
        }
        body.push_str("</pre>\n");

        let response = GateResponse::new(200).with_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        if request.method == Method::HEAD {
            response
        } else {
            response.with_body(body)
        }
    }
}

#[async_trait]
impl Handler for FileServer {
    fn kind(&self) -> &str {
        KIND
    }

    async fn serve(&self, request: GateRequest) -> GateResponse {
        if request.method != Method::GET && request.method != Method::HEAD {
            return GateResponse::text(405, "405 method not allowed")
                .with_header(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
        }

        let relative = match Self::resolve(&request.path) {
            Some(relative) => relative,
            None => {
                warn_fmt!("FileServer", "Rejected path {}", request.path);
                return GateResponse::text(400, "invalid URL path");
            }
        };
        let full = self.root.join(&relative);

        let metadata = match tokio::fs::metadata(&full).await {
            Ok(metadata) => metadata,
            Err(e) => return io_error_response(&full, &e),
        };

        if !metadata.is_dir() {
            return self.serve_file(&full, &metadata, &request).await;
        }

        if !request.path.ends_with('/') {
            let mut location = format!("{}/", request.path);
            if let Some(query) = &request.query {
                location.push('?');
                location.push_str(query);
            }
            return match HeaderValue::from_str(&location) {
                Ok(location) => GateResponse::new(301).with_header(header::LOCATION, location),
                Err(_) => GateResponse::text(400, "invalid URL path"),
            };
        }

        let index = full.join(INDEX_FILE);
        if let Ok(index_metadata) = tokio::fs::metadata(&index).await {
            if index_metadata.is_file() {
                debug_fmt!("FileServer", "Serving index {}", index.display());
                return self.serve_file(&index, &index_metadata, &request).await;
            }
        }

        self.list_directory(&full, &request).await
    }
}

fn io_error_response(path: &Path, error: &io::Error) -> GateResponse {
    match error.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => {
            GateResponse::text(404, "404 page not found")
        }
        io::ErrorKind::PermissionDenied => GateResponse::text(403, "403 Forbidden"),
        _ => {
            error_fmt!("FileServer", "Failed to read {}: {}", path.display(), error);
            GateResponse::text(500, "500 Internal Server Error")
        }
    }
}

fn http_date(time: SystemTime) -> HeaderValue {
    let formatted = DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();
    HeaderValue::from_str(&formatted).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// `If-Modified-Since` at or after the file's modification time, compared at
/// whole-second precision.
fn not_modified_since(request: &GateRequest, modified: SystemTime) -> bool {
    let since = request
        .headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok());

    match since {
        Some(since) => DateTime::<Utc>::from(modified).timestamp() <= since.timestamp(),
        None => false,
    }
}

/// Guessed from the extension; text types are declared UTF-8.
fn content_type(path: &Path) -> HeaderValue {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let value = if mime.type_() == mime_guess::mime::TEXT && mime.get_param("charset").is_none() {
        format!("{mime}; charset=utf-8")
    } else {
        mime.to_string()
    };
    HeaderValue::from_str(&value)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

#[derive(Debug, Deserialize)]
struct FileServerConfig {
    #[serde(default)]
    root: String,
}

/// `file_server {root}`
pub(crate) fn build(
    _factory: &HandlerFactory,
    payload: &Value,
) -> Result<Box<dyn Handler>, HandlerError> {
    let config: FileServerConfig = parse_payload(KIND, payload)?;
    if config.root.is_empty() {
        return Err(HandlerError::missing(KIND, "root"));
    }
    let server =
        FileServer::new(&config.root).map_err(|e| HandlerError::invalid(KIND, e.to_string()))?;
    Ok(Box::new(server))
}
