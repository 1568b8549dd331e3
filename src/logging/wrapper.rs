// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Context-tagged logging macros.
//!
//! Each macro prefixes the record with `[context]` and hands it to the `log`
//! facade (re-exported as `hostgate::log`, so callers need no direct
//! dependency). With structured logging on, `slog_stdlog` forwards the
//! records into slog.
//!
//! ```rust
//! hostgate::info_fmt!("Server", "listening on {}", "0.0.0.0:80");
//! ```

/// `error!` with a context tag.
#[macro_export]
macro_rules! error_fmt {
    ($context:expr, $($arg:tt)+) => {
        $crate::log::error!("[{}] {}", $context, format_args!($($arg)+))
    };
}

/// Macro to log a warning message with context.
#[macro_export]
macro_rules! warn_fmt {
    ($context:expr, $($arg:tt)+) => {
        $crate::log::warn!("[{}] {}", $context, format_args!($($arg)+))
    };
}

/// `info!` with a context tag.
#[macro_export]
macro_rules! info_fmt {
    ($context:expr, $($arg:tt)+) => {
        $crate::log::info!("[{}] {}", $context, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! debug_fmt {
    ($context:expr, $($arg:tt)+) => {
        $crate::log::debug!("[{}] {}", $context, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! trace_fmt {
    ($context:expr, $($arg:tt)+) => {
        $crate::log::trace!("[{}] {}", $context, format_args!($($arg)+))
    };
}
