// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bound-address capture for embedded servers.
//!
//! A provider cannot be asked for its listening address directly, so the
//! adapter arms a one-shot capture before launching and hands the provider a
//! [`BoundNotifier`]. The first call to [`BoundNotifier::notify_bound`] (or
//! [`BoundNotifier::reject`]) resolves the capture and every later call is a
//! no-op. Nothing process-wide is touched, so captures for different adapters
//! never interfere.
//!
//! ```text
//!  adapter                        provider
//!  ───────                        ────────
//!  arm() ──► (notifier, pending)
//!  launch(opts, notifier) ──────► bind socket
//!                                 notifier.notify_bound(addr)
//!  pending.wait(timeout) ◄─────── addr
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

/// Bound-address capture errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// A capture is already pending on this interceptor.
    #[error("A bound-address capture is already armed")]
    AlreadyArmed,

    /// The provider reported a launch failure instead of an address.
    #[error("Server failed before binding: {0}")]
    Rejected(String),

    /// Every notifier was dropped without reporting.
    #[error("Server handle dropped without reporting a bound address")]
    Abandoned,

    /// No address arrived in time.
    #[error("No bound address within {0:?}")]
    TimedOut(Duration),
}

type Slot = Arc<Mutex<Option<oneshot::Sender<Result<SocketAddr, CaptureError>>>>>;

/// Arms one-shot captures. At most one capture is pending at a time.
#[derive(Debug, Clone, Default)]
pub struct ListenerInterceptor {
    armed: Arc<AtomicBool>,
}

impl ListenerInterceptor {
    /// Create an idle interceptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a capture for the next launch.
    pub fn arm(&self) -> Result<(BoundNotifier, PendingCapture), CaptureError> {
        if self.armed.swap(true, Ordering::AcqRel) {
            return Err(CaptureError::AlreadyArmed);
        }
        let (tx, rx) = oneshot::channel();
        let notifier = BoundNotifier {
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        let pending = PendingCapture {
            rx,
            armed: self.armed.clone(),
        };
        Ok((notifier, pending))
    }

    /// Whether a capture is currently pending.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
}

/// Provider side of a capture. Cheap to clone; only the first report counts.
#[derive(Debug, Clone)]
pub struct BoundNotifier {
    slot: Slot,
}

impl BoundNotifier {
    /// Report the address the server is listening on.
    ///
    /// Returns `true` if this call resolved the capture.
    pub fn notify_bound(&self, addr: SocketAddr) -> bool {
        let resolved = self.resolve(Ok(addr));
        if resolved {
            debug!(addr = %addr, "Bound address captured");
        }
        resolved
    }

    /// Report that the server failed before binding.
    pub fn reject(&self, reason: impl Into<String>) -> bool {
        self.resolve(Err(CaptureError::Rejected(reason.into())))
    }

    /// Whether the capture is still waiting for a report.
    pub fn is_pending(&self) -> bool {
        self.slot
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|tx| !tx.is_closed()))
            .unwrap_or(false)
    }

    fn resolve(&self, outcome: Result<SocketAddr, CaptureError>) -> bool {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }
}

/// Adapter side of a capture. Dropping it disarms the interceptor.
#[derive(Debug)]
pub struct PendingCapture {
    rx: oneshot::Receiver<Result<SocketAddr, CaptureError>>,
    armed: Arc<AtomicBool>,
}

impl PendingCapture {
    /// Wait for the provider to report, up to `timeout`.
    pub async fn wait(mut self, timeout: Duration) -> Result<SocketAddr, CaptureError> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(CaptureError::Abandoned),
            Err(_) => Err(CaptureError::TimedOut(timeout)),
        }
    }
}

impl Drop for PendingCapture {
    fn drop(&mut self) {
        self.armed.store(false, Ordering::Release);
    }
}
