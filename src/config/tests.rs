// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;
use crate::handlers::ReportSink;
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[derive(Debug)]
struct MockConfigProvider {
    name: String,
    values: HashMap<String, Value>,
}

impl MockConfigProvider {
    fn new(name: &str, values: &[(&str, Value)]) -> Self {
        Self {
            name: name.to_string(),
            values: values
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }
}

impl ConfigProvider for MockConfigProvider {
    fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn provider_name(&self) -> &str {
        &self.name
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.values.get(key).cloned())
    }
}

fn settings_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_later_providers_take_precedence() {
    let config = Config::builder()
        .with_provider(MockConfigProvider::new(
            "base",
            &[
                ("server.listen", json!("127.0.0.1:8080")),
                ("hosts.file", json!("base.json")),
            ],
        ))
        .with_provider(MockConfigProvider::new(
            "override",
            &[("server.listen", json!("127.0.0.1:9090"))],
        ))
        .build();

    assert_eq!(
        config.get::<String>("server.listen").unwrap().unwrap(),
        "127.0.0.1:9090"
    );
    assert_eq!(
        config.get::<String>("hosts.file").unwrap().unwrap(),
        "base.json"
    );
    assert_eq!(config.provider_names(), vec!["base", "override"]);
}

#[test]
fn test_get_or_default_and_type_errors() {
    let config = Config::builder()
        .with_provider(MockConfigProvider::new(
            "mock",
            &[("upstream.connect_timeout_ms", json!("soon"))],
        ))
        .build();

    assert_eq!(config.get_or_default("missing.key", 7u64).unwrap(), 7);

    let err = config
        .get::<u64>("upstream.connect_timeout_ms")
        .unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(ref m) if m.contains("upstream.connect_timeout_ms")));
}

#[test]
fn test_file_provider_json_nested_keys() {
    let file = settings_file(
        ".json",
        r#"{"server": {"listen": "127.0.0.1:7000"}, "upstream": {"response_timeout_ms": 1500}}"#,
    );
    let provider = FileConfigProvider::new(file.path().to_str().unwrap()).unwrap();

    assert!(provider.has("server.listen"));
    assert!(!provider.has("server.missing"));
    assert_eq!(
        provider.get_raw("upstream.response_timeout_ms").unwrap(),
        Some(json!(1500))
    );
}

#[test]
fn test_file_provider_toml_and_yaml() {
    let toml = settings_file(
        ".toml",
        "[server]\nlisten = \"0.0.0.0:8081\"\n\n[report]\ntarget = \"log\"\n",
    );
    let provider = FileConfigProvider::new(toml.path().to_str().unwrap()).unwrap();
    assert_eq!(
        provider.get_raw("server.listen").unwrap(),
        Some(json!("0.0.0.0:8081"))
    );

    let yaml = settings_file(".yaml", "logging:\n  level: debug\n  structured: true\n");
    let provider = FileConfigProvider::new(yaml.path().to_str().unwrap()).unwrap();
    assert_eq!(provider.get_raw("logging.level").unwrap(), Some(json!("debug")));
    assert_eq!(
        provider.get_raw("logging.structured").unwrap(),
        Some(json!(true))
    );
}

#[test]
fn test_file_provider_rejects_unknown_extension_and_non_objects() {
    let ini = settings_file(".ini", "listen=1");
    let err = FileConfigProvider::new(ini.path().to_str().unwrap()).unwrap_err();
    assert!(err.to_string().contains("unsupported file format"));

    let array = settings_file(".json", "[1, 2, 3]");
    let err = FileConfigProvider::new(array.path().to_str().unwrap()).unwrap_err();
    assert!(err.to_string().contains("root configuration must be an object"));

    let broken = settings_file(".json", "{ not json");
    let err = FileConfigProvider::new(broken.path().to_str().unwrap()).unwrap_err();
    assert!(err.to_string().contains("invalid JSON"));
}

#[test]
fn test_read_document_defaults_to_json() {
    let file = settings_file(".conf", r#"{"default": "."}"#);
    let value = read_document(file.path()).unwrap();
    assert_eq!(value, json!({"default": "."}));

    let err = read_document(std::path::Path::new("/definitely/not/here.json")).unwrap_err();
    assert!(err.to_string().contains("failed to read"));
}

#[test]
fn test_settings_defaults() {
    let settings = Settings::from_config(&Config::default()).unwrap();

    assert_eq!(settings.server.listen, "0.0.0.0:80");
    assert_eq!(settings.server.shutdown_timeout_secs, 30);
    assert_eq!(settings.hosts.file, PathBuf::from("rp.json"));
    assert_eq!(settings.upstream.connect_timeout_ms, 5_000);
    assert_eq!(settings.upstream.response_timeout_ms, 30_000);
    assert_eq!(settings.report.target, ReportSink::Stdout);
    assert_eq!(settings.logging.level, "info");
    assert!(!settings.logging.structured);
}

#[test]
fn test_settings_from_layered_sources() {
    let file = settings_file(
        ".toml",
        "[server]\nlisten = \"127.0.0.1:8000\"\n\n[hosts]\nfile = \"/etc/hostgate/hosts.json\"\n\n[upstream]\nconnect_timeout_ms = 100\n",
    );
    let config = Config::builder()
        .with_provider(FileConfigProvider::new(file.path().to_str().unwrap()).unwrap())
        .with_provider(MockConfigProvider::new(
            "env",
            &[
                ("upstream.connect_timeout_ms", json!(250)),
                ("report.target", json!("stderr")),
            ],
        ))
        .build();

    let settings = Settings::from_config(&config).unwrap();
    assert_eq!(settings.server.listen, "127.0.0.1:8000");
    assert_eq!(settings.hosts.file, PathBuf::from("/etc/hostgate/hosts.json"));
    assert_eq!(settings.upstream.connect_timeout_ms, 250);
    assert_eq!(settings.upstream.response_timeout_ms, 30_000);
    assert_eq!(settings.report.target, ReportSink::Stderr);
}

#[test]
fn test_settings_rejects_unknown_report_target() {
    let config = Config::builder()
        .with_provider(MockConfigProvider::new(
            "mock",
            &[("report.target", json!("carrier-pigeon"))],
        ))
        .build();

    let err = Settings::from_config(&config).unwrap_err();
    assert!(err.to_string().contains("report.target"));
}
