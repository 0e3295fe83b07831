// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sidecar provider - runs the embedded server as a child process.
//!
//! The child receives its launch options as `STACKABLE_*` environment
//! variables and reports back on stdout:
//!
//! ```text
//! STACKABLE_BASE_PATH /foo/bar/      (optional, before LISTENING)
//! STACKABLE_LISTENING 127.0.0.1:5173
//! ```
//!
//! Every other stdout line is logged at debug level and stderr at warn level.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::traits::*;
use crate::listener::BoundNotifier;
use crate::manifest;
use crate::paths::live_base_path;

/// Stdout marker carrying the bound address.
pub const LISTENING_MARKER: &str = "STACKABLE_LISTENING";

/// Stdout marker carrying the live base path.
pub const BASE_PATH_MARKER: &str = "STACKABLE_BASE_PATH";

/// Default time between SIGTERM and SIGKILL.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// Provider that launches the server as a child process.
#[derive(Debug, Clone)]
pub struct SidecarProvider {
    name: String,
    program: String,
    args: Vec<String>,
    manifest: PathBuf,
    env: HashMap<String, String>,
    stop_grace: Duration,
}

impl SidecarProvider {
    /// Create a provider for `package` that runs `program args...`.
    pub fn new(package: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        let name = package.into();
        let manifest = manifest::default_manifest_path(&name);
        Self {
            name,
            program: program.into(),
            args,
            manifest,
            env: HashMap::new(),
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    /// Read the installed version from a different manifest.
    pub fn with_manifest(mut self, manifest: impl Into<PathBuf>) -> Self {
        self.manifest = manifest.into();
        self
    }

    /// Add an environment variable for the child. Applied after the launch
    /// variables, so it can override them.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Time to wait after SIGTERM before killing the child.
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Environment variables describing `options` to the child.
    pub fn launch_env(options: &LaunchOptions) -> Vec<(String, String)> {
        let mut env = vec![
            ("STACKABLE_HOST".to_string(), options.server.host.clone()),
            ("STACKABLE_PORT".to_string(), options.server.port.to_string()),
            (
                "STACKABLE_BASE".to_string(),
                options.base.clone().unwrap_or_default(),
            ),
            ("STACKABLE_MODE".to_string(), options.mode.to_string()),
            (
                "STACKABLE_STRICT_PORT".to_string(),
                options.server.strict_port.to_string(),
            ),
            ("STACKABLE_HMR".to_string(), options.server.hmr.to_string()),
            ("STACKABLE_ORIGIN".to_string(), options.server.origin.clone()),
            ("STACKABLE_LOG_LEVEL".to_string(), options.log_level.to_string()),
        ];
        if let Some(config_file) = &options.config_file {
            env.push((
                "STACKABLE_CONFIG_FILE".to_string(),
                config_file.display().to_string(),
            ));
        }
        if let Some(tls) = &options.server.https {
            env.push(("STACKABLE_HTTPS_CERT".to_string(), tls.cert.display().to_string()));
            env.push(("STACKABLE_HTTPS_KEY".to_string(), tls.key.display().to_string()));
        }
        if let Some(cors) = &options.server.cors
            && let Ok(json) = serde_json::to_string(cors)
        {
            env.push(("STACKABLE_CORS".to_string(), json));
        }
        env
    }
}

#[async_trait]
impl EmbeddedServerProvider for SidecarProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn installed_version(&self, project_root: &Path) -> Result<String> {
        manifest::installed_version(project_root, &self.manifest).await
    }

    async fn launch(
        &self,
        options: &LaunchOptions,
        on_bound: BoundNotifier,
    ) -> Result<Box<dyn ServerHandle>> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&options.root)
            .envs(Self::launch_env(options))
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| ProviderError::LaunchFailed(format!("{}: {}", self.program, e)))?;

        let pid = child.id();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::LaunchFailed("stdout was not captured".to_string()))?;
        let stderr = child.stderr.take();

        info!(
            program = %self.program,
            pid = ?pid,
            root = %options.root.display(),
            "Launched sidecar"
        );

        let reported_base = Arc::new(Mutex::new(None));
        let mut readers = vec![tokio::spawn(watch_stdout(
            stdout,
            on_bound,
            reported_base.clone(),
        ))];
        if let Some(stderr) = stderr {
            readers.push(tokio::spawn(forward_stderr(stderr)));
        }

        Ok(Box::new(SidecarHandle {
            handle_id: pid.map(|p| p.to_string()).unwrap_or_default(),
            pid,
            child,
            requested_base: live_base_path(options.base.as_deref()),
            reported_base,
            started_at: Utc::now(),
            stop_grace: self.stop_grace,
            readers,
            exited: false,
        }))
    }
}

/// A line of sidecar stdout the provider understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidecarLine {
    /// The server is listening on this address.
    Listening(String),
    /// The server serves under this base path.
    BasePath(String),
}

/// Parse a stdout line into a [`SidecarLine`], if it is one.
pub fn parse_line(line: &str) -> Option<SidecarLine> {
    let (marker, value) = line.trim().split_once(char::is_whitespace)?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match marker {
        LISTENING_MARKER => Some(SidecarLine::Listening(value.to_string())),
        BASE_PATH_MARKER => Some(SidecarLine::BasePath(value.to_string())),
        _ => None,
    }
}

async fn resolve_addr(value: &str) -> Option<SocketAddr> {
    if let Ok(addr) = value.parse() {
        return Some(addr);
    }
    tokio::net::lookup_host(value).await.ok()?.next()
}

async fn watch_stdout<R>(
    stdout: R,
    on_bound: BoundNotifier,
    reported_base: Arc<Mutex<Option<String>>>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_line(&line) {
                Some(SidecarLine::Listening(value)) => match resolve_addr(&value).await {
                    Some(addr) => {
                        on_bound.notify_bound(addr);
                    }
                    None => warn!(value = %value, "Sidecar reported an unresolvable address"),
                },
                Some(SidecarLine::BasePath(path)) => {
                    if let Ok(mut slot) = reported_base.lock() {
                        *slot = Some(path);
                    }
                }
                None => debug!(line = %line, "sidecar stdout"),
            },
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read sidecar stdout");
                break;
            }
        }
    }
    on_bound.reject(
        ProviderError::ExitedBeforeBind("stdout closed without a listening address".to_string())
            .to_string(),
    );
}

async fn forward_stderr<R>(stderr: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        warn!(line = %line, "sidecar stderr");
    }
}

struct SidecarHandle {
    handle_id: String,
    pid: Option<u32>,
    child: Child,
    requested_base: String,
    reported_base: Arc<Mutex<Option<String>>>,
    started_at: chrono::DateTime<Utc>,
    stop_grace: Duration,
    readers: Vec<JoinHandle<()>>,
    exited: bool,
}

impl SidecarHandle {
    fn terminate(&self) {
        let Some(pid) = self.pid.and_then(|p| i32::try_from(p).ok()) else {
            return;
        };
        match signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) => debug!(pid = pid, "Sent SIGTERM to sidecar"),
            Err(nix::errno::Errno::ESRCH) => debug!(pid = pid, "Sidecar already exited"),
            Err(e) => warn!(pid = pid, error = %e, "Failed to send SIGTERM to sidecar"),
        }
    }
}

#[async_trait]
impl ServerHandle for SidecarHandle {
    fn handle_id(&self) -> &str {
        &self.handle_id
    }

    fn base_path(&self) -> String {
        self.reported_base
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .unwrap_or_else(|| self.requested_base.clone())
    }

    fn started_at(&self) -> chrono::DateTime<Utc> {
        self.started_at
    }

    async fn close(&mut self) -> Result<()> {
        if self.exited {
            return Ok(());
        }

        if self.child.try_wait()?.is_none() {
            self.terminate();
            match tokio::time::timeout(self.stop_grace, self.child.wait()).await {
                Ok(status) => {
                    let status = status?;
                    debug!(handle_id = %self.handle_id, status = %status, "Sidecar exited");
                }
                Err(_) => {
                    warn!(
                        handle_id = %self.handle_id,
                        grace = ?self.stop_grace,
                        "Sidecar ignored SIGTERM, killing"
                    );
                    self.child
                        .kill()
                        .await
                        .map_err(|e| ProviderError::CloseFailed(e.to_string()))?;
                }
            }
        }

        self.exited = true;
        for reader in self.readers.drain(..) {
            reader.abort();
        }
        Ok(())
    }
}
