// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock provider for testing.
//!
//! Binds a real TCP socket and answers every connection with an empty
//! `200 OK`, without needing a JavaScript toolchain.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use super::traits::*;
use crate::listener::BoundNotifier;
use crate::paths::live_base_path;

const RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";

/// Mock provider for testing.
pub struct MockProvider {
    name: String,
    version: String,
    launches: Arc<AtomicUsize>,
    open: Arc<AtomicUsize>,
    last_options: Arc<Mutex<Option<LaunchOptions>>>,
    /// Delay before binding, to widen race windows in tests
    pub launch_delay: Duration,
    /// If true, `launch` fails before binding
    pub fail_by_default: bool,
    /// If true, the server keeps its notifier but never reports an address
    pub never_bind: bool,
    /// If true, the server drops its notifier without reporting
    pub abandon: bool,
    /// Overrides the base path the live server reports
    pub base_path: Option<String>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a mock provider reporting vite 5.4.0.
    pub fn new() -> Self {
        Self {
            name: "vite".to_string(),
            version: "5.4.0".to_string(),
            launches: Arc::new(AtomicUsize::new(0)),
            open: Arc::new(AtomicUsize::new(0)),
            last_options: Arc::new(Mutex::new(None)),
            launch_delay: Duration::ZERO,
            fail_by_default: false,
            never_bind: false,
            abandon: false,
            base_path: None,
        }
    }

    /// Create a mock provider whose launches fail.
    pub fn failing() -> Self {
        Self {
            fail_by_default: true,
            ..Self::new()
        }
    }

    /// Create a mock provider whose servers never report an address.
    pub fn never_binding() -> Self {
        Self {
            never_bind: true,
            ..Self::new()
        }
    }

    /// Report a different installed version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Delay each launch.
    pub fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = delay;
        self
    }

    /// Number of times `launch` was called.
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Number of servers launched and not yet closed.
    pub fn open_servers(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Options passed to the most recent launch.
    pub async fn last_launch_options(&self) -> Option<LaunchOptions> {
        self.last_options.lock().await.clone()
    }
}

#[async_trait]
impl EmbeddedServerProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn installed_version(&self, _project_root: &Path) -> Result<String> {
        Ok(self.version.clone())
    }

    async fn launch(
        &self,
        options: &LaunchOptions,
        on_bound: BoundNotifier,
    ) -> Result<Box<dyn ServerHandle>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().await = Some(options.clone());

        if !self.launch_delay.is_zero() {
            tokio::time::sleep(self.launch_delay).await;
        }

        if self.fail_by_default {
            return Err(ProviderError::LaunchFailed("mock launch failure".to_string()));
        }

        let listener = bind(&options.server).await?;
        let bound = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(serve(listener, shutdown_rx));
        self.open.fetch_add(1, Ordering::SeqCst);

        let retained = if self.never_bind {
            Some(on_bound)
        } else if self.abandon {
            None
        } else {
            on_bound.notify_bound(bound);
            None
        };

        let base_path = self
            .base_path
            .clone()
            .unwrap_or_else(|| live_base_path(options.base.as_deref()));

        debug!(addr = %bound, base = %base_path, "Mock server listening");

        Ok(Box::new(MockServerHandle {
            handle_id: format!("mock-{}", uuid::Uuid::new_v4()),
            base_path,
            started_at: Utc::now(),
            shutdown: Some(shutdown_tx),
            task: Some(task),
            open: self.open.clone(),
            _notifier: retained,
        }))
    }
}

/// Bind the requested port, falling back to an OS-assigned one when it is
/// taken and `strict_port` is off.
async fn bind(server: &ServerLaunchOptions) -> Result<TcpListener> {
    let host = server.host.as_str();
    match TcpListener::bind((host, server.port)).await {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse && !server.strict_port => {
            debug!(port = server.port, "Port in use, falling back");
            TcpListener::bind((host, 0))
                .await
                .map_err(|source| ProviderError::BindFailed {
                    addr: format!("{}:0", host),
                    source,
                })
        }
        Err(source) => Err(ProviderError::BindFailed {
            addr: format!("{}:{}", host, server.port),
            source,
        }),
    }
}

async fn serve(listener: TcpListener, mut shutdown: oneshot::Receiver<()>) {
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => {
                if let Ok((mut stream, _)) = accepted {
                    let _ = stream.write_all(RESPONSE).await;
                    let _ = stream.shutdown().await;
                }
            }
        }
    }
}

struct MockServerHandle {
    handle_id: String,
    base_path: String,
    started_at: chrono::DateTime<Utc>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    open: Arc<AtomicUsize>,
    _notifier: Option<BoundNotifier>,
}

#[async_trait]
impl ServerHandle for MockServerHandle {
    fn handle_id(&self) -> &str {
        &self.handle_id
    }

    fn base_path(&self) -> String {
        self.base_path.clone()
    }

    fn started_at(&self) -> chrono::DateTime<Utc> {
        self.started_at
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| ProviderError::CloseFailed(e.to_string()))?;
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for MockServerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
