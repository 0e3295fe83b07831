// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embedded server providers.
//!
//! A provider knows how to find the installed server package and how to
//! launch it. The adapter drives it through [`EmbeddedServerProvider`].

pub mod mock;
pub mod sidecar;
mod traits;

pub use mock::MockProvider;
pub use sidecar::SidecarProvider;
pub use traits::*;
