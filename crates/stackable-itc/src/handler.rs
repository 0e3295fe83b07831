// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Handler trait definitions.

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// A method handler registered on an [`ItcChannel`](crate::ItcChannel).
///
/// Any `Fn(Value) -> impl Future<Output = Result<Value>>` closure is a handler,
/// so most callers never implement this trait by hand.
#[async_trait]
pub trait ItcHandler: Send + Sync {
    /// Answer a request with the given payload.
    async fn call(&self, payload: Value) -> Result<Value>;
}

#[async_trait]
impl<F, Fut> ItcHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    async fn call(&self, payload: Value) -> Result<Value> {
        (self)(payload).await
    }
}
