// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging setup for an agent living inside a host process.
//!
//! Output goes to stderr so the host's stdout stays untouched. `RUST_LOG`
//! overrides the level unless an explicit filter directive is configured.

use std::io;

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::AgentConfiguration;

/// How the agent's own diagnostics are rendered.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level used when neither `RUST_LOG` nor a directive is set.
    pub default_level: Level,

    /// Include source file and line.
    pub include_file_line: bool,

    pub ansi_colors: bool,

    /// Explicit filter directive, e.g. `agent_runtime::registry=trace`.
    pub filter_directive: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::quiet()
    }
}

impl LoggingConfig {
    /// Warnings only, no colors.
    pub fn quiet() -> Self {
        Self {
            default_level: Level::WARN,
            include_file_line: false,
            ansi_colors: false,
            filter_directive: None,
        }
    }

    /// Debug output with source locations, for agent debug mode.
    pub fn verbose() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_file_line: true,
            ansi_colors: false,
            filter_directive: None,
        }
    }

    pub fn for_agent(config: &AgentConfiguration) -> Self {
        if config.debug_mode {
            Self::verbose()
        } else {
            Self::quiet()
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_directive = Some(filter.into());
        self
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.default_level.to_string());
        match &self.filter_directive {
            Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed, which is expected when the
/// host application configured its own logging; callers may ignore that.
pub fn init_logging(config: &LoggingConfig) -> io::Result<()> {
    let fmt_layer = fmt::layer()
        .compact()
        .with_writer(io::stderr)
        .with_ansi(config.ansi_colors)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line);

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))
}
