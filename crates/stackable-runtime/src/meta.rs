// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Metadata a hosted service publishes to the composer.

use serde::{Deserialize, Serialize};

/// Method name the adapter answers on its meta channel.
pub const GET_SERVICE_META: &str = "getServiceMeta";

/// Error code returned over the channel before the service has a URL.
pub const NOT_READY: &str = "NOT_READY";

/// Service metadata, serialized as `{"composer": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMeta {
    /// Routing information for the composer.
    pub composer: ComposerMeta,
}

/// Routing information for the composer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposerMeta {
    /// The service is reachable over a TCP socket.
    pub tcp: bool,
    /// Absolute URL of the running server.
    pub url: String,
    /// Base path without leading or trailing slash.
    pub prefix: String,
    /// The composer must forward absolute URLs.
    pub wants_absolute_urls: bool,
}

impl ServiceMeta {
    /// Metadata for a TCP service that wants absolute URLs.
    pub fn tcp(url: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            composer: ComposerMeta {
                tcp: true,
                url: url.into(),
                prefix: prefix.into(),
                wants_absolute_urls: true,
            },
        }
    }
}

/// File-watch participation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Whether the host should restart the service on file changes.
    pub enabled: bool,
    /// Paths to watch when enabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

impl WatchConfig {
    /// Opt out of host-level file watching.
    pub fn disabled() -> Self {
        Self::default()
    }
}
