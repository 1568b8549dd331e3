// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Logging utilities for hostgate.
//!
//! Everything logs through the `log` facade. [`init_with_config`] installs
//! either `env_logger` or, for structured logging, a global slog logger fed
//! by the `slog_stdlog` bridge.

pub mod config;
pub mod structured;
pub mod wrapper;

#[cfg(test)]
mod tests;

use log::{LevelFilter, error, info};
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::logging::config::LoggingConfig;

static INIT: Once = Once::new();
static USING_STRUCTURED: AtomicBool = AtomicBool::new(false);

/// Initialize text logging with the specified level.
///
/// This function ensures logging is only initialized once.
pub fn init(level: Option<LevelFilter>) {
    init_with_config(&LoggingConfig {
        level: level.unwrap_or(LevelFilter::Info).to_string(),
        ..LoggingConfig::default()
    });
}

/// Initialize logging from a [`LoggingConfig`]. Only the first call in a
/// process has any effect.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let level = config.level_filter();

        if config.structured {
            structured::init_global_logger(&config.to_logger_config());
            match slog_stdlog::init() {
                Ok(()) => {
                    log::set_max_level(level);
                    USING_STRUCTURED.store(true, Ordering::SeqCst);
                }
                Err(e) => eprintln!("failed to bridge log records into slog: {e}"),
            }
        } else {
            let env = env_logger::Env::default().filter_or("RUST_LOG", level.to_string());
            let result = env_logger::Builder::from_env(env)
                .format_timestamp_millis()
                .format_target(true)
                .try_init();
            if let Err(e) = result {
                eprintln!("failed to initialise logging: {e}");
            }
        }

        info!("Logging initialized at level: {}", log::max_level());
    });
}

/// Whether records are going through the slog pipeline.
pub fn is_structured_logging() -> bool {
    USING_STRUCTURED.load(Ordering::SeqCst)
}

/// Log an error with context and return the error.
///
/// This is useful for logging errors in a chain of Results.
pub fn log_error<E: std::fmt::Display>(context: &str, err: E) -> E {
    error!("[{}] {}", context, err);
    err
}

