//! Custom error types for the Tentalux bridge.
//!
//! This module defines the primary error type, `TentaluxError`, shared by the
//! transport, the controller and the device adapters. It is built with the
//! `thiserror` crate so the `?` operator converts underlying errors at the
//! boundary where they occur.
//!
//! ## Error Hierarchy
//!
//! - **`Network`**: The rig could not be reached or answered with a non-2xx
//!   status. Connection refused, DNS failure and request timeouts all land here.
//! - **`Protocol`**: The rig answered, but the body was not JSON or lacked the
//!   fields the controller needs (for example `ARBs`, or a brightness value).
//! - **`Timeout`**: A bounded operation (the camera fetch) ran out of time.
//! - **`InvalidCommand`**: A command was rejected client-side before any request
//!   was sent.
//! - **`Config`** / **`Configuration`**: Loading or validating the configuration.
//! - **`Io`**: Local file I/O, used by the command line front end.
//!
//! Command methods propagate these errors to their caller. The poll loop never
//! does: it logs and carries on (see [`crate::controller`]).

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the bridge error type.
pub type AppResult<T> = std::result::Result<T, TentaluxError>;

/// Primary error type for the Tentalux bridge.
#[derive(Error, Debug)]
pub enum TentaluxError {
    /// The rig was unreachable or returned a non-success status.
    ///
    /// **Error Type**: Usually transient. The poll loop retries on its next tick.
    #[error("Network error: {0}")]
    Network(String),

    /// The rig returned a body that could not be interpreted.
    ///
    /// **Error Type**: Permanent for that response; the snapshot is left untouched.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A bounded operation did not complete in time.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// A command failed client-side validation and was never sent.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Configuration file or environment could not be parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration parsed but holds values that make no sense.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Local I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TentaluxError {
    /// Whether the same request may succeed if retried later.
    pub fn is_transient(&self) -> bool {
        matches!(self, TentaluxError::Network(_) | TentaluxError::Timeout(_))
    }
}

impl From<reqwest::Error> for TentaluxError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return TentaluxError::Protocol(err.to_string());
        }
        if let Some(status) = err.status() {
            return TentaluxError::Network(format!("rig answered with status {}", status));
        }
        if err.is_timeout() {
            return TentaluxError::Network(format!("request timed out: {}", err));
        }
        TentaluxError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for TentaluxError {
    fn from(err: serde_json::Error) -> Self {
        TentaluxError::Protocol(err.to_string())
    }
}
