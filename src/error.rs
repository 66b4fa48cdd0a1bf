// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the instrumentation runtime.
//!
//! Errors split by how far they are allowed to travel:
//!
//! - [`ConfigurationError`] and [`ConfigError`] are setup-time misuse and are
//!   returned to the caller immediately.
//! - [`ProbeFailure`] comes from the external loader and always degrades to
//!   "no match".
//! - [`HandlerError`] / [`DispatchFailure`] are raised while forwarding an
//!   event and never leave the dispatch coordinator.

use thiserror::Error;

/// Setup-time misuse of the registration or configuration API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Invalid pattern for '{name}': {message}")]
    InvalidPattern { name: String, message: String },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),
}

impl ConfigurationError {
    /// Create an invalid pattern error.
    pub fn invalid_pattern(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Errors that can occur while loading configuration files.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),

    #[error("Configuration rejected: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// The external loader could not resolve or introspect a candidate unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    #[error("Unit not found: {0}")]
    NotFound(String),

    #[error("Failed to introspect '{unit}': {message}")]
    Introspection { unit: String, message: String },
}

/// Failure reported by a notification handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("Event rejected: {0}")]
    Rejected(String),

    #[error("Handler failed: {0}")]
    Failed(String),
}

/// Anything that went wrong while forwarding one event.
///
/// Only ever observed by the coordinator's logging and metrics.
#[derive(Error, Debug)]
pub enum DispatchFailure {
    #[error("Handler '{handler}' returned an error: {source}")]
    Handler {
        handler: String,
        #[source]
        source: HandlerError,
    },

    #[error("Handler '{handler}' panicked: {message}")]
    Panicked { handler: String, message: String },
}

impl DispatchFailure {
    /// Build a panic failure from a `catch_unwind` payload.
    pub fn from_panic(handler: impl Into<String>, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked {
            handler: handler.into(),
            message,
        }
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;
