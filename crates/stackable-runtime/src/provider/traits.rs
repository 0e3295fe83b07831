// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provider trait definitions.
//!
//! Defines the abstract interface for embedded server backends.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::config::{CorsPolicy, TlsConfig};
use crate::listener::BoundNotifier;

/// Errors from provider operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    /// The package manifest is missing or unreadable.
    #[error("Cannot read manifest {path}: {reason}")]
    Manifest {
        /// Manifest location.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },

    /// The server could not be launched.
    #[error("Launch failed: {0}")]
    LaunchFailed(String),

    /// Binding the listening socket failed.
    #[error("Failed to bind {addr}: {source}")]
    BindFailed {
        /// Requested address.
        addr: String,
        /// Socket error.
        #[source]
        source: std::io::Error,
    },

    /// The server process exited before reporting an address.
    #[error("Server exited before binding: {0}")]
    ExitedBeforeBind(String),

    /// Shutting the server down failed.
    #[error("Close failed: {0}")]
    CloseFailed(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Server mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerMode {
    /// Development mode with hot module replacement.
    #[default]
    Development,
}

impl ServerMode {
    /// Mode name as the server expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
        }
    }
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log level handed to the embedded server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerLogLevel {
    /// Informational output and above.
    #[default]
    Info,
    /// Warnings and errors.
    Warn,
    /// Errors only.
    Error,
    /// No output.
    Silent,
}

impl ServerLogLevel {
    /// Level matching the host's tracing filter.
    pub fn from_filter(filter: LevelFilter) -> Self {
        if filter == LevelFilter::OFF {
            Self::Silent
        } else if filter == LevelFilter::ERROR {
            Self::Error
        } else if filter == LevelFilter::WARN {
            Self::Warn
        } else {
            Self::Info
        }
    }

    /// Level name as the server expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Silent => "silent",
        }
    }
}

impl fmt::Display for ServerLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network options after defaults have been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLaunchOptions {
    /// Host to bind.
    pub host: String,
    /// Port to bind; `0` lets the OS choose.
    pub port: u16,
    /// Whether the server must fail rather than pick another port.
    pub strict_port: bool,
    /// TLS configuration.
    pub https: Option<TlsConfig>,
    /// CORS policy.
    pub cors: Option<CorsPolicy>,
    /// Origin the server uses for generated asset URLs.
    pub origin: String,
    /// Hot module replacement.
    pub hmr: bool,
}

/// Options for launching an embedded server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Project root
    pub root: PathBuf,
    /// Normalized base path, `None` for `/`
    pub base: Option<String>,
    /// Server mode
    pub mode: ServerMode,
    /// Absolute config file path, if configured
    pub config_file: Option<PathBuf>,
    /// Terminal clearing is always off for hosted servers
    pub clear_screen: bool,
    /// Server log level
    pub log_level: ServerLogLevel,
    /// Network options
    pub server: ServerLaunchOptions,
}

/// A running embedded server.
#[async_trait]
pub trait ServerHandle: Send + Sync {
    /// Unique identifier for this launch (PID for sidecars).
    fn handle_id(&self) -> &str;

    /// Base path the live server serves under, e.g. `/foo/bar/`.
    fn base_path(&self) -> String;

    /// When the server was launched.
    fn started_at(&self) -> chrono::DateTime<chrono::Utc>;

    /// Shut the server down and release its socket.
    async fn close(&mut self) -> Result<()>;
}

/// Trait for embedded server backends.
#[async_trait]
pub trait EmbeddedServerProvider: Send + Sync {
    /// Package name of the embedded server (e.g. "vite").
    fn name(&self) -> &str;

    /// Version string of the package installed under `project_root`.
    async fn installed_version(&self, project_root: &Path) -> Result<String>;

    /// Launch the server.
    ///
    /// The provider must call `on_bound.notify_bound` once its socket is
    /// listening, or `on_bound.reject` if it fails after returning.
    async fn launch(
        &self,
        options: &LaunchOptions,
        on_bound: BoundNotifier,
    ) -> Result<Box<dyn ServerHandle>>;
}
