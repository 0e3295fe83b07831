// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for stackable services.
//!
//! [`ServiceConfig`] is the immutable snapshot an orchestrator hands to an
//! adapter. [`HostConfig`] is what the `stackable-host` binary loads from
//! environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default server hostname.
pub const DEFAULT_HOSTNAME: &str = "127.0.0.1";

/// Default compatibility range for the embedded server.
pub const DEFAULT_VERSION_RANGE: &str = "^5.0.0";

/// Default time to wait for the server to report its bound address.
pub const DEFAULT_BIND_TIMEOUT: Duration = Duration::from_secs(30);

/// TLS material for the embedded server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// PEM certificate chain.
    pub cert: PathBuf,
    /// PEM private key.
    pub key: PathBuf,
}

/// Explicit CORS rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorsRules {
    /// Allowed origins; empty means any.
    #[serde(default)]
    pub origins: Vec<String>,
    /// Allowed methods; empty means the server default.
    #[serde(default)]
    pub methods: Vec<String>,
    /// Whether credentials are allowed.
    #[serde(default)]
    pub credentials: bool,
}

/// CORS policy passed through to the embedded server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorsPolicy {
    /// Enable or disable the server's default policy.
    Enabled(bool),
    /// Explicit rules.
    Rules(CorsRules),
}

/// Network options (`server.*`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerOptions {
    /// Hostname to bind; defaults to loopback.
    #[serde(default)]
    pub hostname: Option<String>,
    /// Port to bind; `0` or absent means OS-assigned.
    #[serde(default)]
    pub port: Option<u16>,
    /// TLS configuration; presence selects the secure scheme.
    #[serde(default)]
    pub https: Option<TlsConfig>,
    /// CORS policy.
    #[serde(default)]
    pub cors: Option<CorsPolicy>,
}

/// Application options (`application.*`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationOptions {
    /// URL mount prefix.
    #[serde(default)]
    pub base: Option<String>,
}

/// Configuration snapshot for one hosted service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Service id, also used as the meta channel scope by the host.
    pub id: String,
    /// Project root the embedded server runs in.
    pub root: PathBuf,
    /// Network options.
    #[serde(default)]
    pub server: ServerOptions,
    /// Application options.
    #[serde(default)]
    pub application: ApplicationOptions,
    /// Embedded-server config file, relative to `root`.
    #[serde(default)]
    pub config_file: Option<PathBuf>,
}

impl ServiceConfig {
    /// Create a configuration with default server options.
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
            server: ServerOptions::default(),
            application: ApplicationOptions::default(),
            config_file: None,
        }
    }

    /// Set the hostname to bind.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.server.hostname = Some(hostname.into());
        self
    }

    /// Set the port to bind (`0` for ephemeral).
    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = Some(port);
        self
    }

    /// Enable TLS.
    pub fn with_https(mut self, tls: TlsConfig) -> Self {
        self.server.https = Some(tls);
        self
    }

    /// Set the CORS policy.
    pub fn with_cors(mut self, cors: CorsPolicy) -> Self {
        self.server.cors = Some(cors);
        self
    }

    /// Set the application base path.
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.application.base = Some(base.into());
        self
    }

    /// Set the embedded-server config file.
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }
}

/// Host configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Service to host.
    pub service: ServiceConfig,
    /// Sidecar program.
    pub program: String,
    /// Sidecar arguments.
    pub args: Vec<String>,
    /// Embedded server package name.
    pub package: String,
    /// Package manifest, relative to the project root.
    pub manifest: PathBuf,
    /// Required version range.
    pub version_range: String,
    /// Time to wait for the bound address.
    pub bind_timeout: Duration,
}

impl HostConfig {
    /// Load configuration from environment variables.
    ///
    /// # Required Environment Variables
    /// - `STACKABLE_COMMAND` - Sidecar command line, whitespace separated
    ///
    /// # Optional Environment Variables
    /// - `STACKABLE_SERVICE_ID` - Service id (default: "app")
    /// - `STACKABLE_PROJECT_ROOT` - Project root (default: ".")
    /// - `STACKABLE_HOSTNAME` - Hostname to bind (default: "127.0.0.1")
    /// - `STACKABLE_PORT` - Port to bind (default: 0, OS-assigned)
    /// - `STACKABLE_BASE` - Application base path
    /// - `STACKABLE_CONFIG_FILE` - Config file relative to the project root
    /// - `STACKABLE_PACKAGE` - Embedded server package (default: "vite")
    /// - `STACKABLE_MANIFEST` - Manifest path (default: "node_modules/<package>/package.json")
    /// - `STACKABLE_VERSION_RANGE` - Required range (default: "^5.0.0")
    /// - `STACKABLE_BIND_TIMEOUT_MS` - Bind timeout (default: 30000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let command = lookup("STACKABLE_COMMAND")
            .ok_or(ConfigError::MissingEnvVar("STACKABLE_COMMAND"))?;
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(ConfigError::EmptyCommand)?;
        let args: Vec<String> = parts.collect();

        let id = lookup("STACKABLE_SERVICE_ID").unwrap_or_else(|| "app".to_string());
        let root =
            PathBuf::from(lookup("STACKABLE_PROJECT_ROOT").unwrap_or_else(|| ".".to_string()));

        let mut service = ServiceConfig::new(id, root);
        service.server.hostname =
            Some(lookup("STACKABLE_HOSTNAME").unwrap_or_else(|| DEFAULT_HOSTNAME.to_string()));

        if let Some(port) = lookup("STACKABLE_PORT") {
            let port: u16 = port.parse().map_err(|_| ConfigError::InvalidPort(port))?;
            service.server.port = Some(port);
        }

        service.application.base = lookup("STACKABLE_BASE").filter(|b| !b.is_empty());
        service.config_file = lookup("STACKABLE_CONFIG_FILE")
            .filter(|f| !f.is_empty())
            .map(PathBuf::from);

        let package = lookup("STACKABLE_PACKAGE").unwrap_or_else(|| "vite".to_string());
        let manifest = lookup("STACKABLE_MANIFEST")
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::manifest::default_manifest_path(&package));

        let version_range =
            lookup("STACKABLE_VERSION_RANGE").unwrap_or_else(|| DEFAULT_VERSION_RANGE.to_string());
        if let Err(e) = semver::VersionReq::parse(&version_range) {
            return Err(ConfigError::InvalidVersionRange(format!("{}: {}", version_range, e)));
        }

        let bind_timeout = match lookup("STACKABLE_BIND_TIMEOUT_MS") {
            Some(ms) => Duration::from_millis(
                ms.parse()
                    .map_err(|_| ConfigError::InvalidTimeout(ms.clone()))?,
            ),
            None => DEFAULT_BIND_TIMEOUT,
        };

        Ok(Self {
            service,
            program,
            args,
            package,
            manifest,
            version_range,
            bind_timeout,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// The sidecar command line is blank.
    #[error("Sidecar command is empty")]
    EmptyCommand,
    /// The port number is invalid.
    #[error("Invalid port number: {0}")]
    InvalidPort(String),
    /// The bind timeout is invalid.
    #[error("Invalid bind timeout: {0}")]
    InvalidTimeout(String),
    /// The version range does not parse.
    #[error("Invalid version range: {0}")]
    InvalidVersionRange(String),
}
