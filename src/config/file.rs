// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! File-based settings provider and the shared document reader.

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use super::ConfigError;
use super::ConfigProvider;

/// Supported file formats. All of them are normalised to a JSON value tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
    Yaml,
}

impl FileFormat {
    /// Detect the format from the file extension.
    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension().and_then(|ext| {
            match ext.to_string_lossy().to_lowercase().as_str() {
                "json" => Some(FileFormat::Json),
                "toml" => Some(FileFormat::Toml),
                "yaml" | "yml" => Some(FileFormat::Yaml),
                _ => None,
            }
        })
    }

    /// Parse `content` into a JSON value tree.
    pub fn parse(self, content: &str) -> Result<Value, ConfigError> {
        match self {
            FileFormat::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::provider_error("file", format!("invalid JSON: {e}"))),
            FileFormat::Toml => {
                let value: toml::Value = toml::from_str(content).map_err(|e| {
                    ConfigError::provider_error("file", format!("invalid TOML: {e}"))
                })?;
                serde_json::to_value(value).map_err(|e| {
                    ConfigError::provider_error("file", format!("failed to convert TOML: {e}"))
                })
            }
            FileFormat::Yaml => {
                let value: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| {
                    ConfigError::provider_error("file", format!("invalid YAML: {e}"))
                })?;
                serde_json::to_value(value).map_err(|e| {
                    ConfigError::provider_error("file", format!("failed to convert YAML: {e}"))
                })
            }
        }
    }
}

/// Read a JSON, TOML or YAML document. Files without a recognised
/// extension are read as JSON.
pub fn read_document(path: &Path) -> Result<Value, ConfigError> {
    let format = FileFormat::from_extension(path).unwrap_or(FileFormat::Json);
    let content = fs::read_to_string(path).map_err(|e| {
        ConfigError::provider_error("file", format!("failed to read {}: {e}", path.display()))
    })?;
    format.parse(&content)
}

/// Settings provider backed by a single file.
#[derive(Debug)]
pub struct FileConfigProvider {
    path: PathBuf,
    data: Map<String, Value>,
}

impl FileConfigProvider {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let path = PathBuf::from(path);
        if FileFormat::from_extension(&path).is_none() {
            return Err(ConfigError::provider_error(
                "file",
                format!("unsupported file format: {}", path.display()),
            ));
        }

        match read_document(&path)? {
            Value::Object(data) => Ok(Self { path, data }),
            _ => Err(ConfigError::provider_error(
                "file",
                "root configuration must be an object",
            )),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get_nested_value(&self, key_path: &str) -> Option<&Value> {
        let mut parts = key_path.split('.');
        let mut current = self.data.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }
}

impl ConfigProvider for FileConfigProvider {
    fn has(&self, key: &str) -> bool {
        self.get_nested_value(key).is_some()
    }

    fn provider_name(&self) -> &str {
        "file"
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.get_nested_value(key).cloned())
    }
}
