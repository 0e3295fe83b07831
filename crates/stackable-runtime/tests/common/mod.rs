// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared helpers for stackable-runtime integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use stackable_itc::ItcHub;
use stackable_runtime::provider::MockProvider;
use stackable_runtime::{AdapterOptions, ServiceConfig, StackableAdapter};

/// An adapter wired to a mock provider on its own hub.
pub struct Harness {
    pub hub: ItcHub,
    pub provider: Arc<MockProvider>,
    pub adapter: StackableAdapter,
}

impl Harness {
    pub fn new(provider: MockProvider) -> Self {
        Self::with_service(provider, ServiceConfig::new("web", "."))
    }

    pub fn with_service(provider: MockProvider, service: ServiceConfig) -> Self {
        Self::with_options(provider, service, AdapterOptions::default())
    }

    pub fn with_options(
        provider: MockProvider,
        service: ServiceConfig,
        options: AdapterOptions,
    ) -> Self {
        let hub = ItcHub::new();
        let provider = Arc::new(provider);
        let channel = hub.channel(service.id.clone()).unwrap();
        let adapter =
            StackableAdapter::with_options(service, provider.clone(), channel, options).unwrap();
        Self {
            hub,
            provider,
            adapter,
        }
    }

    /// Initialize and start, returning the URL.
    pub async fn running(&self) -> String {
        self.adapter.init().await.unwrap();
        self.adapter.start().await.unwrap()
    }
}

/// Socket address from an `http://host:port` URL.
pub fn addr_of(url: &str) -> SocketAddr {
    let (_, authority) = url.split_once("://").unwrap();
    authority.parse().unwrap()
}

/// Short bind timeout for tests that expect a timeout.
pub fn short_timeout() -> AdapterOptions {
    AdapterOptions::default().with_bind_timeout(Duration::from_millis(150))
}
