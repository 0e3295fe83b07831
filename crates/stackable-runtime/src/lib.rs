// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stackable Runtime - hosted application servers
//!
//! This crate wraps a third-party development server (Vite by default) in a
//! uniform start/stop/meta lifecycle so an upstream composer can route
//! traffic to it without knowing which server it is.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        StackableAdapter                          │
//! │  ┌─────────────┐  ┌──────────────────┐  ┌─────────────────────┐  │
//! │  │ VersionGate │  │ListenerInterceptor│  │ service URL resolver│  │
//! │  └─────────────┘  └──────────────────┘  └─────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//!        │ installed_version / launch              ▲ getServiceMeta
//!        ▼                                         │
//! ┌───────────────────────────┐          ┌──────────────────┐
//! │  EmbeddedServerProvider   │          │  stackable-itc   │
//! │  (SidecarProvider, Mock)  │          │  scoped channel  │
//! └───────────────────────────┘          └──────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! | Operation | Description |
//! |-----------|-------------|
//! | `init` | Check the installed version, register `getServiceMeta` |
//! | `start` | Launch the server, capture its bound address, return its URL |
//! | `stop` | Close the server and release its port |
//! | `meta` | `{composer: {tcp, url, prefix, wantsAbsoluteUrls}}` while running |
//! | `watch_config` | Always `{enabled: false}` |
//!
//! # Configuration
//!
//! The `stackable-host` binary reads `STACKABLE_*` environment variables,
//! see [`config::HostConfig::from_env`].

#![deny(missing_docs)]

/// Adapter lifecycle and the `Stackable` trait.
pub mod adapter;

/// Service and host configuration.
pub mod config;

/// Error types.
pub mod error;

/// Bound-address capture.
pub mod listener;

/// Installed package manifests.
pub mod manifest;

/// Composer metadata.
pub mod meta;

/// Base-path and config-file helpers.
pub mod paths;

/// Embedded server backends.
pub mod provider;

/// Service URL formatting.
pub mod url;

/// Version compatibility gate.
pub mod version_gate;

pub use adapter::{AdapterOptions, LifecycleState, Stackable, StackableAdapter};
pub use config::{ConfigError, HostConfig, ServiceConfig};
pub use error::{Error, Result};
pub use meta::{ServiceMeta, WatchConfig};
