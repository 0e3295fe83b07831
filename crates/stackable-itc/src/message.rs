// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire messages for the inter-context bus.
//!
//! Requests and responses are plain JSON documents so they can cross any
//! context boundary (thread, worker, process pipe) without a shared schema
//! compiler.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ItcError;

/// A request addressed to a method within a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItcRequest {
    /// Correlation ID, echoed in the response.
    pub id: Uuid,
    /// Scope (service id) that owns the handler.
    pub scope: String,
    /// Method name, e.g. `getServiceMeta`.
    pub method: String,
    /// Request payload.
    #[serde(default)]
    pub payload: Value,
}

impl ItcRequest {
    /// Create a request with a fresh correlation ID.
    pub fn new(scope: impl Into<String>, method: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            scope: scope.into(),
            method: method.into(),
            payload,
        }
    }
}

/// Outcome of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItcOutcome {
    /// The handler answered.
    Ok {
        /// Handler result.
        value: Value,
    },
    /// The request failed.
    Error {
        /// Stable error code.
        code: String,
        /// Human readable message.
        message: String,
    },
}

/// Response correlated with an [`ItcRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItcResponse {
    /// Correlation ID of the request.
    pub id: Uuid,
    /// Result of the call.
    pub outcome: ItcOutcome,
}

impl ItcResponse {
    /// Build a response from a handler result.
    pub fn from_result(id: Uuid, result: Result<Value, ItcError>) -> Self {
        let outcome = match result {
            Ok(value) => ItcOutcome::Ok { value },
            Err(ItcError::Handler { code, message }) => ItcOutcome::Error { code, message },
            Err(e) => ItcOutcome::Error {
                code: e.error_code().to_string(),
                message: e.to_string(),
            },
        };
        Self { id, outcome }
    }

    /// Convert back into a result, turning error outcomes into handler errors.
    pub fn into_result(self) -> Result<Value, ItcError> {
        match self.outcome {
            ItcOutcome::Ok { value } => Ok(value),
            ItcOutcome::Error { code, message } => Err(ItcError::Handler { code, message }),
        }
    }
}
