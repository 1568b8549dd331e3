// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared helpers for the integration tests.

use hostgate::{Gate, GateError, GateLoader};
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A gate served on an ephemeral local port.
pub struct TestGate {
    pub addr: SocketAddr,
    pub gate: Gate,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<Result<(), GateError>>>,
}

impl TestGate {
    /// Build a gate from `hosts` and start serving it.
    pub async fn start(hosts: &serde_json::Value) -> Self {
        Self::start_with(GateLoader::new().with_hosts_json(&hosts.to_string())).await
    }

    pub async fn start_with(loader: GateLoader) -> Self {
        hostgate::logging::init(Some(hostgate::log::LevelFilter::Warn));
        let gate = loader.build().expect("gate should load");
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");

        let (tx, rx) = oneshot::channel::<()>();
        let server = gate.server().clone();
        let handle = tokio::spawn(async move {
            server
                .serve(listener, async {
                    let _ = rx.await;
                })
                .await
        });

        Self {
            addr,
            gate,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Signal shutdown and wait for the server to stop.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .expect("server did not stop in time")
                .expect("server task panicked")
                .expect("server returned an error");
        }
    }
}

/// A client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client")
}

/// Create a temporary directory holding `files` (relative path, content).
pub fn site_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    for (path, content) in files {
        let full = dir.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(full, content).expect("write file");
    }
    dir
}

/// Create a temporary configuration file for testing
#[allow(dead_code)]
pub fn create_temp_config_file(
    content: &str,
    format: &str,
) -> Result<(TempDir, PathBuf), std::io::Error> {
    let temp_dir = TempDir::new()?;
    let file_path = temp_dir.path().join(format!("test_config.{format}"));
    fs::write(&file_path, content)?;
    Ok((temp_dir, file_path))
}
