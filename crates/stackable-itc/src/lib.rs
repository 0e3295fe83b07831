// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stackable ITC - inter-context request/response bus
//!
//! Services hosted by a stackable runtime publish their metadata to the
//! upstream composer through this bus. A single [`ItcHub`] lives for the
//! whole hosting process; every service receives its own scoped
//! [`ItcChannel`] so that handlers registered under the same method name by
//! different services never collide.
//!
//! ```text
//! ┌──────────────┐   request(scope, method)   ┌──────────────────────────┐
//! │   Composer   │ ─────────────────────────► │          ItcHub          │
//! └──────────────┘                            │  scope "web"  scope "ui" │
//!        ▲                                    │  ┌────────┐  ┌────────┐  │
//!        │            ItcResponse             │  │handlers│  │handlers│  │
//!        └─────────────────────────────────── │  └────────┘  └────────┘  │
//!                                             └──────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use stackable_itc::ItcHub;
//! use serde_json::json;
//!
//! let hub = ItcHub::new();
//! let channel = hub.channel("web")?;
//! channel.handle("getServiceMeta", |_payload| async move {
//!     Ok(json!({ "composer": { "tcp": true } }))
//! })?;
//!
//! let meta = hub.request("web", "getServiceMeta", json!(null)).await?;
//! ```

#![deny(missing_docs)]

/// Error types for bus operations.
pub mod error;

/// Handler trait for methods registered on a channel.
pub mod handler;

/// Hub and scoped channels.
pub mod hub;

/// Wire messages exchanged over the bus.
pub mod message;

pub use error::{ItcError, Result};
pub use handler::ItcHandler;
pub use hub::{DEFAULT_REQUEST_TIMEOUT, ItcChannel, ItcHub};
pub use message::{ItcOutcome, ItcRequest, ItcResponse};
