// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for stackable-itc.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the inter-context bus.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ItcError {
    /// Another channel already owns this scope.
    #[error("Scope '{0}' is already taken")]
    ScopeTaken(String),

    /// No channel is registered for this scope.
    #[error("Scope '{0}' not found")]
    ScopeNotFound(String),

    /// The scope exists but has no handler for the method.
    #[error("No handler for '{method}' in scope '{scope}'")]
    HandlerNotFound {
        /// Scope the request targeted.
        scope: String,
        /// Method that was requested.
        method: String,
    },

    /// A handler for this method is already registered in the scope.
    #[error("Handler for '{method}' already registered in scope '{scope}'")]
    DuplicateHandler {
        /// Scope of the channel.
        scope: String,
        /// Method that was registered twice.
        method: String,
    },

    /// The handler ran and reported a failure.
    #[error("Handler error: {code} - {message}")]
    Handler {
        /// Stable error code reported by the handler.
        code: String,
        /// Human readable message.
        message: String,
    },

    /// The handler did not answer in time.
    #[error("Request '{method}' to scope '{scope}' timed out after {timeout:?}")]
    Timeout {
        /// Scope the request targeted.
        scope: String,
        /// Method that was requested.
        method: String,
        /// Time bound that elapsed.
        timeout: Duration,
    },

    /// The hub backing a channel has been dropped.
    #[error("ITC hub closed")]
    HubClosed,

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ItcError {
    /// Build a handler-side error with a code and message.
    pub fn handler(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Get the error code string for this error type.
    ///
    /// Handler errors keep the code chosen by the handler.
    pub fn error_code(&self) -> &str {
        match self {
            Self::ScopeTaken(_) => "SCOPE_TAKEN",
            Self::ScopeNotFound(_) => "SCOPE_NOT_FOUND",
            Self::HandlerNotFound { .. } => "HANDLER_NOT_FOUND",
            Self::DuplicateHandler { .. } => "DUPLICATE_HANDLER",
            Self::Handler { code, .. } => code,
            Self::Timeout { .. } => "TIMEOUT",
            Self::HubClosed => "HUB_CLOSED",
            Self::Json(_) => "JSON_ERROR",
        }
    }
}

/// Result type using ItcError.
pub type Result<T> = std::result::Result<T, ItcError>;
