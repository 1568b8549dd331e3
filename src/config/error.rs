// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the settings layer.

use std::fmt;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required key has no value in any provider.
    #[error("configuration key '{0}' not found")]
    NotFound(String),

    /// A value exists but does not have the expected shape.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// A provider failed while loading its source.
    #[error("provider error: {provider}: {message}")]
    ProviderError { provider: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl ConfigError {
    pub fn provider_error<P: fmt::Display, M: fmt::Display>(provider: P, message: M) -> Self {
        Self::ProviderError {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }
}
