// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Process-wide hub and scoped channels.
//!
//! The hub maps scopes (one per hosted service) to handler tables. A scope is
//! owned by exactly one [`ItcChannel`]; dropping the channel releases the
//! scope so a restarted service can claim it again.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::{ItcError, Result};
use crate::handler::ItcHandler;
use crate::message::{ItcRequest, ItcResponse};

/// Default time bound for a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type HandlerTable = DashMap<String, Arc<dyn ItcHandler>>;

struct HubInner {
    scopes: DashMap<String, Arc<HandlerTable>>,
    request_timeout: Duration,
}

/// Process-wide request/response bus.
///
/// Cheap to clone; all clones share the same scopes.
#[derive(Clone)]
pub struct ItcHub {
    inner: Arc<HubInner>,
}

impl Default for ItcHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ItcHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItcHub")
            .field("scopes", &self.scopes())
            .field("request_timeout", &self.inner.request_timeout)
            .finish()
    }
}

impl ItcHub {
    /// Create a hub with the default request timeout.
    pub fn new() -> Self {
        Self::with_request_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a hub with a custom request timeout.
    pub fn with_request_timeout(request_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(HubInner {
                scopes: DashMap::new(),
                request_timeout,
            }),
        }
    }

    /// Default time bound applied by [`request`](Self::request).
    pub fn request_timeout(&self) -> Duration {
        self.inner.request_timeout
    }

    /// Claim a scope and return the channel that owns it.
    ///
    /// Fails with [`ItcError::ScopeTaken`] if another live channel holds the scope.
    pub fn channel(&self, scope: impl Into<String>) -> Result<ItcChannel> {
        let scope = scope.into();
        let handlers = Arc::new(HandlerTable::new());

        match self.inner.scopes.entry(scope.clone()) {
            Entry::Occupied(_) => return Err(ItcError::ScopeTaken(scope)),
            Entry::Vacant(slot) => {
                slot.insert(handlers.clone());
            }
        }

        debug!(scope = %scope, "ITC scope claimed");

        Ok(ItcChannel {
            scope,
            handlers,
            hub: Arc::downgrade(&self.inner),
        })
    }

    /// List the scopes currently claimed, sorted.
    pub fn scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = self
            .inner
            .scopes
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        scopes.sort();
        scopes
    }

    /// Call `method` in `scope` with the hub's default timeout.
    pub async fn request(&self, scope: &str, method: &str, payload: Value) -> Result<Value> {
        self.request_with_timeout(scope, method, payload, self.inner.request_timeout)
            .await
    }

    /// Call `method` in `scope`, failing with [`ItcError::Timeout`] after `timeout`.
    #[instrument(skip(self, payload))]
    pub async fn request_with_timeout(
        &self,
        scope: &str,
        method: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value> {
        let handler = self.lookup(scope, method)?;

        match tokio::time::timeout(timeout, handler.call(payload)).await {
            Ok(result) => {
                if let Err(e) = &result {
                    debug!(error = %e, "ITC handler returned an error");
                }
                result
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "ITC request timed out");
                Err(ItcError::Timeout {
                    scope: scope.to_string(),
                    method: method.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Dispatch a wire-level request and always produce a correlated response.
    pub async fn dispatch(&self, request: ItcRequest) -> ItcResponse {
        let result = self
            .request(&request.scope, &request.method, request.payload)
            .await;
        ItcResponse::from_result(request.id, result)
    }

    fn lookup(&self, scope: &str, method: &str) -> Result<Arc<dyn ItcHandler>> {
        // Clone out of the map guards before awaiting anything.
        let table = self
            .inner
            .scopes
            .get(scope)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ItcError::ScopeNotFound(scope.to_string()))?;

        table
            .get(method)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ItcError::HandlerNotFound {
                scope: scope.to_string(),
                method: method.to_string(),
            })
    }
}

/// A channel owning one scope of an [`ItcHub`].
///
/// Dropping the channel releases the scope and all of its handlers.
pub struct ItcChannel {
    scope: String,
    handlers: Arc<HandlerTable>,
    hub: Weak<HubInner>,
}

impl std::fmt::Debug for ItcChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItcChannel")
            .field("scope", &self.scope)
            .field("methods", &self.methods())
            .finish()
    }
}

impl ItcChannel {
    /// Scope owned by this channel.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Register an async closure as the handler for `method`.
    ///
    /// Fails with [`ItcError::DuplicateHandler`] if the method is already handled
    /// in this scope, and with [`ItcError::HubClosed`] if the hub is gone.
    pub fn handle<F, Fut>(&self, method: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.register(method, handler)
    }

    /// Register any [`ItcHandler`] implementation for `method`.
    pub fn register<H>(&self, method: impl Into<String>, handler: H) -> Result<()>
    where
        H: ItcHandler + 'static,
    {
        if self.hub.strong_count() == 0 {
            return Err(ItcError::HubClosed);
        }

        let method = method.into();
        match self.handlers.entry(method.clone()) {
            Entry::Occupied(_) => Err(ItcError::DuplicateHandler {
                scope: self.scope.clone(),
                method,
            }),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(handler));
                debug!(scope = %self.scope, method = %method, "ITC handler registered");
                Ok(())
            }
        }
    }

    /// Remove the handler for `method`, returning whether one was registered.
    pub fn remove(&self, method: &str) -> bool {
        self.handlers.remove(method).is_some()
    }

    /// Methods currently handled in this scope, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self
            .handlers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        methods.sort();
        methods
    }
}

impl Drop for ItcChannel {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            // Only release the scope if it is still ours.
            hub.scopes
                .remove_if(&self.scope, |_, table| Arc::ptr_eq(table, &self.handlers));
            debug!(scope = %self.scope, "ITC scope released");
        }
    }
}
