// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stackable Host - runs one embedded server as a stackable service
//!
//! Launches the configured sidecar, waits for it to report its address and
//! logs the metadata a composer would receive, then stops it on Ctrl-C.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use stackable_itc::ItcHub;
use stackable_runtime::config::HostConfig;
use stackable_runtime::meta::GET_SERVICE_META;
use stackable_runtime::provider::SidecarProvider;
use stackable_runtime::{AdapterOptions, StackableAdapter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stackable_runtime=info,stackable_itc=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = HostConfig::from_env()?;

    info!(
        service = %config.service.id,
        root = %config.service.root.display(),
        program = %config.program,
        package = %config.package,
        range = %config.version_range,
        "Starting Stackable Host"
    );

    let provider = Arc::new(
        SidecarProvider::new(&config.package, &config.program, config.args.clone())
            .with_manifest(&config.manifest),
    );

    let hub = ItcHub::new();
    let channel = hub.channel(config.service.id.clone())?;
    let adapter = StackableAdapter::with_options(
        config.service.clone(),
        provider,
        channel,
        AdapterOptions::default()
            .with_version_range(&config.version_range)
            .with_bind_timeout(config.bind_timeout),
    )?;

    adapter.init().await?;
    let url = adapter.start().await?;
    let meta = hub
        .request(&config.service.id, GET_SERVICE_META, Value::Null)
        .await?;

    info!(url = %url, meta = %meta, "Service ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    adapter.stop().await?;
    info!("Stackable Host stopped");

    Ok(())
}
