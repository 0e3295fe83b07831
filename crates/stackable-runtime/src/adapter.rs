// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The stackable adapter.
//!
//! [`StackableAdapter`] hosts one embedded server behind the uniform
//! [`Stackable`] lifecycle:
//!
//! ```text
//!  Uninitialized ──init──► Initialized ──start──► Starting ──► Running
//!        │                                            │           │
//!        └──(version rejected)──► Failed ◄────────────┘         stop
//!                                                                 │
//!                         Stopped ◄───────────────────────────────┘
//!                            └──start──► Starting
//! ```
//!
//! `start()` is single-flight: concurrent callers wait for the one launch in
//! progress and all receive the same URL.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stackable_itc::ItcHub;
//! use stackable_runtime::{ServiceConfig, StackableAdapter, provider::SidecarProvider};
//!
//! let hub = ItcHub::new();
//! let provider = Arc::new(SidecarProvider::new("vite", "npx", vec!["vite-sidecar".into()]));
//! let adapter = StackableAdapter::new(
//!     ServiceConfig::new("web", "/srv/web").with_base("/app"),
//!     provider,
//!     hub.channel("web")?,
//! )?;
//!
//! adapter.init().await?;
//! let url = adapter.start().await?;
//! let meta = hub.request("web", "getServiceMeta", serde_json::Value::Null).await?;
//! adapter.stop().await?;
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use stackable_itc::{ItcChannel, ItcError, ItcHandler};
use tokio::sync::{Mutex, RwLock};
use tracing::level_filters::LevelFilter;
use tracing::{error, info, instrument, warn};

use crate::config::{
    DEFAULT_BIND_TIMEOUT, DEFAULT_HOSTNAME, DEFAULT_VERSION_RANGE, ServerOptions, ServiceConfig,
};
use crate::error::{Error, Result};
use crate::listener::{CaptureError, ListenerInterceptor};
use crate::meta::{GET_SERVICE_META, NOT_READY, ServiceMeta, WatchConfig};
use crate::paths::{normalize_base_path, prefix_from_base, resolve_config_file};
use crate::provider::{
    EmbeddedServerProvider, LaunchOptions, ServerHandle, ServerLaunchOptions, ServerLogLevel,
    ServerMode,
};
use crate::url::{Scheme, resolve_service_url};
use crate::version_gate::VersionGate;

/// Origin the embedded server uses for asset URLs.
pub const DEFAULT_ORIGIN: &str = "http://localhost";

/// Uniform lifecycle of a hosted service.
#[async_trait]
pub trait Stackable: Send + Sync {
    /// Adapter type tag (the embedded server's package name).
    fn kind(&self) -> &str;

    /// Service id from the configuration.
    fn service_id(&self) -> &str;

    /// Verify compatibility and register the meta handler.
    async fn init(&self) -> Result<()>;

    /// Launch the server, returning its URL. Idempotent while running.
    async fn start(&self) -> Result<String>;

    /// Shut the server down.
    async fn stop(&self) -> Result<()>;

    /// File-watch participation.
    fn watch_config(&self) -> WatchConfig;

    /// Composer metadata, `None` until the server is running.
    async fn meta(&self) -> Option<ServiceMeta>;
}

/// Lifecycle state of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Constructed, not yet verified.
    Uninitialized,
    /// Version accepted and meta handler registered.
    Initialized,
    /// A launch is in flight.
    Starting,
    /// The server is listening and its URL is known.
    Running,
    /// The server was shut down; `start()` launches a fresh one.
    Stopped,
    /// Terminal. The instance must be recreated.
    Failed,
}

impl LifecycleState {
    /// State name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adapter tuning.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    /// Semver range the installed server must satisfy.
    pub version_range: String,
    /// Time to wait for the server to report its address.
    pub bind_timeout: Duration,
    /// Server log level; follows the host's tracing filter when unset.
    pub log_level: Option<ServerLogLevel>,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            version_range: DEFAULT_VERSION_RANGE.to_string(),
            bind_timeout: DEFAULT_BIND_TIMEOUT,
            log_level: None,
        }
    }
}

impl AdapterOptions {
    /// Set the required version range.
    pub fn with_version_range(mut self, range: impl Into<String>) -> Self {
        self.version_range = range.into();
        self
    }

    /// Set the bind timeout.
    pub fn with_bind_timeout(mut self, timeout: Duration) -> Self {
        self.bind_timeout = timeout;
        self
    }

    /// Pin the server log level.
    pub fn with_log_level(mut self, level: ServerLogLevel) -> Self {
        self.log_level = Some(level);
        self
    }
}

/// Apply defaults to user network options.
///
/// Port `0` (or none) lets the OS choose; `strict_port` is always off so an
/// occupied port falls back instead of failing.
pub fn merge_server_options(options: &ServerOptions) -> ServerLaunchOptions {
    ServerLaunchOptions {
        host: options
            .hostname
            .clone()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string()),
        port: options.port.unwrap_or(0),
        strict_port: false,
        https: options.https.clone(),
        cors: options.cors.clone(),
        origin: DEFAULT_ORIGIN.to_string(),
        hmr: true,
    }
}

struct AdapterState {
    lifecycle: LifecycleState,
    url: Option<String>,
    handle: Option<Box<dyn ServerHandle>>,
}

struct AdapterInner {
    service: ServiceConfig,
    provider: Arc<dyn EmbeddedServerProvider>,
    gate: VersionGate,
    bind_timeout: Duration,
    log_level: Option<ServerLogLevel>,
    channel: ItcChannel,
    interceptor: ListenerInterceptor,
    /// Held across init, launch and stop so only one transition runs at a time.
    flight: Mutex<()>,
    state: RwLock<AdapterState>,
    prefix: OnceLock<String>,
}

impl AdapterInner {
    async fn meta(&self) -> Option<ServiceMeta> {
        let state = self.state.read().await;
        if state.lifecycle != LifecycleState::Running {
            return None;
        }
        let url = state.url.clone()?;
        let handle = state.handle.as_ref()?;
        let prefix = self
            .prefix
            .get_or_init(|| prefix_from_base(&handle.base_path()))
            .clone();
        Some(ServiceMeta::tcp(url, prefix))
    }

    async fn set_lifecycle(&self, lifecycle: LifecycleState) {
        self.state.write().await.lifecycle = lifecycle;
    }
}

/// Marks the adapter failed if a launch is dropped before it settles.
///
/// Declared after the flight guard so the state is written before the lock
/// is released.
struct StartGuard {
    inner: Arc<AdapterInner>,
    armed: bool,
}

impl StartGuard {
    fn new(inner: Arc<AdapterInner>) -> Self {
        Self { inner, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StartGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(service = %self.inner.service.id, "Start cancelled before the server settled");
        match self.inner.state.try_write() {
            Ok(mut state) => state.lifecycle = LifecycleState::Failed,
            Err(_) => {
                // A reader holds the lock; finish the transition on the runtime.
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    let inner = self.inner.clone();
                    runtime.spawn(async move {
                        inner.set_lifecycle(LifecycleState::Failed).await;
                    });
                }
            }
        }
    }
}

/// Answers `getServiceMeta` on the adapter's channel. Holds a weak reference
/// since the channel is owned by the adapter.
struct MetaHandler {
    inner: Weak<AdapterInner>,
}

#[async_trait]
impl ItcHandler for MetaHandler {
    async fn call(&self, _payload: Value) -> stackable_itc::Result<Value> {
        let inner = self
            .inner
            .upgrade()
            .ok_or_else(|| ItcError::handler(NOT_READY, "adapter has been dropped"))?;
        match inner.meta().await {
            Some(meta) => Ok(serde_json::to_value(meta)?),
            None => Err(ItcError::handler(NOT_READY, "service has no URL yet")),
        }
    }
}

/// Hosts one embedded server as a stackable service.
pub struct StackableAdapter {
    inner: Arc<AdapterInner>,
}

impl fmt::Debug for StackableAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackableAdapter")
            .field("service", &self.inner.service.id)
            .field("kind", &self.inner.provider.name())
            .field("scope", &self.inner.channel.scope())
            .finish()
    }
}

impl StackableAdapter {
    /// Create an adapter with default options.
    pub fn new(
        service: ServiceConfig,
        provider: Arc<dyn EmbeddedServerProvider>,
        channel: ItcChannel,
    ) -> Result<Self> {
        Self::with_options(service, provider, channel, AdapterOptions::default())
    }

    /// Create an adapter with explicit options.
    pub fn with_options(
        service: ServiceConfig,
        provider: Arc<dyn EmbeddedServerProvider>,
        channel: ItcChannel,
        options: AdapterOptions,
    ) -> Result<Self> {
        let gate = VersionGate::new(provider.name(), &options.version_range)?;
        Ok(Self {
            inner: Arc::new(AdapterInner {
                service,
                provider,
                gate,
                bind_timeout: options.bind_timeout,
                log_level: options.log_level,
                channel,
                interceptor: ListenerInterceptor::new(),
                flight: Mutex::new(()),
                state: RwLock::new(AdapterState {
                    lifecycle: LifecycleState::Uninitialized,
                    url: None,
                    handle: None,
                }),
                prefix: OnceLock::new(),
            }),
        })
    }

    /// Service configuration.
    pub fn service(&self) -> &ServiceConfig {
        &self.inner.service
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> LifecycleState {
        self.inner.state.read().await.lifecycle
    }

    /// URL of the running server.
    pub async fn url(&self) -> Option<String> {
        self.inner.state.read().await.url.clone()
    }

    /// Verify the installed server version and register `getServiceMeta`.
    ///
    /// Nothing is registered when the version is rejected, and the adapter
    /// becomes [`LifecycleState::Failed`].
    #[instrument(skip(self), fields(service = %self.inner.service.id))]
    pub async fn init(&self) -> Result<()> {
        let _flight = self.inner.flight.lock().await;

        let current = self.state().await;
        if current != LifecycleState::Uninitialized {
            return Err(Error::InvalidState {
                operation: "init",
                state: current,
            });
        }

        let found = match self
            .inner
            .provider
            .installed_version(&self.inner.service.root)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                error!(error = %e, "Failed to determine installed version");
                self.inner.set_lifecycle(LifecycleState::Failed).await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.inner.gate.check(&found) {
            error!(error = %e, "Rejected embedded server version");
            self.inner.set_lifecycle(LifecycleState::Failed).await;
            return Err(e);
        }

        let handler = MetaHandler {
            inner: Arc::downgrade(&self.inner),
        };
        if let Err(e) = self.inner.channel.register(GET_SERVICE_META, handler) {
            error!(error = %e, "Failed to register service meta handler");
            self.inner.set_lifecycle(LifecycleState::Failed).await;
            return Err(e.into());
        }

        self.inner.set_lifecycle(LifecycleState::Initialized).await;
        info!(
            kind = %self.inner.provider.name(),
            version = %found,
            scope = %self.inner.channel.scope(),
            "Adapter initialized"
        );
        Ok(())
    }

    /// Launch the embedded server and return its URL.
    ///
    /// Returns the cached URL while running. Concurrent calls share one
    /// launch. After `stop()` this launches a fresh server.
    #[instrument(skip(self), fields(service = %self.inner.service.id))]
    pub async fn start(&self) -> Result<String> {
        {
            let state = self.inner.state.read().await;
            if state.lifecycle == LifecycleState::Running
                && let Some(url) = &state.url
            {
                return Ok(url.clone());
            }
        }

        let _flight = self.inner.flight.lock().await;

        {
            let mut state = self.inner.state.write().await;
            match state.lifecycle {
                LifecycleState::Running => {
                    if let Some(url) = &state.url {
                        return Ok(url.clone());
                    }
                    return Err(Error::InvalidState {
                        operation: "start",
                        state: state.lifecycle,
                    });
                }
                LifecycleState::Initialized | LifecycleState::Stopped => {
                    state.lifecycle = LifecycleState::Starting;
                }
                LifecycleState::Uninitialized => return Err(Error::NotInitialized),
                LifecycleState::Failed => return Err(Error::InstanceFailed),
                LifecycleState::Starting => {
                    return Err(Error::InvalidState {
                        operation: "start",
                        state: state.lifecycle,
                    });
                }
            }
        }

        let guard = StartGuard::new(self.inner.clone());

        match self.launch().await {
            Ok((url, handle)) => {
                let mut state = self.inner.state.write().await;
                info!(url = %url, handle_id = %handle.handle_id(), "Server running");
                state.url = Some(url.clone());
                state.handle = Some(handle);
                state.lifecycle = LifecycleState::Running;
                guard.disarm();
                Ok(url)
            }
            Err(e) => {
                error!(error = %e, code = e.error_code(), "Server failed to start");
                self.inner.set_lifecycle(LifecycleState::Failed).await;
                guard.disarm();
                Err(e)
            }
        }
    }

    /// Shut the running server down and release its port.
    ///
    /// The adapter is [`LifecycleState::Stopped`] afterwards even if closing
    /// the server reports an error.
    #[instrument(skip(self), fields(service = %self.inner.service.id))]
    pub async fn stop(&self) -> Result<()> {
        let _flight = match self.inner.flight.try_lock() {
            Ok(flight) => flight,
            // Contended only by a start that is still launching, or by callers
            // queued to read the URL of a server that is already running.
            Err(_) => match self.state().await {
                LifecycleState::Running => self.inner.flight.lock().await,
                _ => return Err(Error::StartInFlight),
            },
        };

        let handle = {
            let mut state = self.inner.state.write().await;
            match state.lifecycle {
                LifecycleState::Running => {}
                LifecycleState::Failed => return Err(Error::InstanceFailed),
                LifecycleState::Starting => return Err(Error::StartInFlight),
                _ => return Err(Error::NotStarted),
            }
            state.url = None;
            state.lifecycle = LifecycleState::Stopped;
            state.handle.take()
        };

        if let Some(mut handle) = handle {
            handle.close().await?;
            info!(handle_id = %handle.handle_id(), "Server stopped");
        }
        Ok(())
    }

    /// Hosted dev servers do their own watching.
    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig::disabled()
    }

    /// Composer metadata, `None` unless the server is running.
    pub async fn meta(&self) -> Option<ServiceMeta> {
        self.inner.meta().await
    }

    /// Launch options derived from the service configuration.
    pub async fn launch_options(&self) -> Result<LaunchOptions> {
        let service = &self.inner.service;
        let config_file = resolve_config_file(&service.root, service.config_file.as_deref());
        if let Some(path) = &config_file
            && !tokio::fs::try_exists(path).await.unwrap_or(false)
        {
            return Err(Error::ConfigFileNotFound(path.clone()));
        }

        Ok(LaunchOptions {
            root: service.root.clone(),
            base: normalize_base_path(service.application.base.as_deref()),
            mode: ServerMode::Development,
            config_file,
            clear_screen: false,
            log_level: self
                .inner
                .log_level
                .unwrap_or_else(|| ServerLogLevel::from_filter(LevelFilter::current())),
            server: merge_server_options(&service.server),
        })
    }

    async fn launch(&self) -> Result<(String, Box<dyn ServerHandle>)> {
        let options = self.launch_options().await?;
        let (notifier, capture) = self.inner.interceptor.arm()?;

        let mut handle = match self.inner.provider.launch(&options, notifier.clone()).await {
            Ok(handle) => handle,
            Err(e) => {
                notifier.reject(e.to_string());
                return Err(e.into());
            }
        };
        drop(notifier);

        let addr = match capture.wait(self.inner.bind_timeout).await {
            Ok(addr) => addr,
            Err(e) => {
                if let Err(close_err) = handle.close().await {
                    warn!(error = %close_err, "Failed to close server after capture error");
                }
                return Err(match e {
                    CaptureError::TimedOut(timeout) => Error::BindTimeout(timeout),
                    other => other.into(),
                });
            }
        };

        let url = resolve_service_url(addr, Scheme::for_tls(options.server.https.is_some()));
        Ok((url, handle))
    }
}

#[async_trait]
impl Stackable for StackableAdapter {
    fn kind(&self) -> &str {
        self.inner.provider.name()
    }

    fn service_id(&self) -> &str {
        &self.inner.service.id
    }

    async fn init(&self) -> Result<()> {
        StackableAdapter::init(self).await
    }

    async fn start(&self) -> Result<String> {
        StackableAdapter::start(self).await
    }

    async fn stop(&self) -> Result<()> {
        StackableAdapter::stop(self).await
    }

    fn watch_config(&self) -> WatchConfig {
        StackableAdapter::watch_config(self)
    }

    async fn meta(&self) -> Option<ServiceMeta> {
        StackableAdapter::meta(self).await
    }
}
