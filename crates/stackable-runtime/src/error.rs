// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for stackable-runtime.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::adapter::LifecycleState;

/// Adapter errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The installed embedded server does not satisfy the required range.
    #[error("Unsupported version of {name}: found {found}, required {required}")]
    UnsupportedVersion {
        /// Package name of the embedded server.
        name: String,
        /// Version actually installed.
        found: String,
        /// Required semver range.
        required: String,
    },

    /// The declared compatibility range could not be parsed.
    #[error("Invalid version range '{range}': {reason}")]
    InvalidVersionRange {
        /// The range as declared.
        range: String,
        /// Parser error.
        reason: String,
    },

    /// The operation is not allowed in the current lifecycle state.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the adapter was in.
        state: LifecycleState,
    },

    /// `start()` was called before `init()`.
    #[error("Adapter has not been initialized")]
    NotInitialized,

    /// `stop()` was called without a running server.
    #[error("Adapter has not been started")]
    NotStarted,

    /// A start or stop is already in flight.
    #[error("A start or stop is already in flight")]
    StartInFlight,

    /// The instance failed earlier and accepts no further transitions.
    #[error("Adapter has failed and must be recreated")]
    InstanceFailed,

    /// The configured embedded-server config file does not exist.
    #[error("Config file not found: {0}")]
    ConfigFileNotFound(PathBuf),

    /// The server did not report its bound address in time.
    #[error("Server did not bind within {0:?}")]
    BindTimeout(Duration),

    /// Capturing the bound address failed.
    #[error("Listener capture error: {0}")]
    Capture(#[from] crate::listener::CaptureError),

    /// The embedded server provider failed.
    #[error("Provider error: {0}")]
    Provider(#[from] crate::provider::ProviderError),

    /// Registering on the meta exchange channel failed.
    #[error("ITC error: {0}")]
    Itc(#[from] stackable_itc::ItcError),
}

impl Error {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedVersion { .. } => "UNSUPPORTED_VERSION",
            Self::InvalidVersionRange { .. } => "INVALID_VERSION_RANGE",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::NotStarted => "NOT_STARTED",
            Self::StartInFlight => "START_IN_FLIGHT",
            Self::InstanceFailed => "INSTANCE_FAILED",
            Self::ConfigFileNotFound(_) => "CONFIG_FILE_NOT_FOUND",
            Self::BindTimeout(_) => "BIND_TIMEOUT",
            Self::Capture(_) => "CAPTURE_ERROR",
            Self::Provider(_) => "PROVIDER_ERROR",
            Self::Itc(_) => "ITC_ERROR",
        }
    }
}

/// Result type using the adapter Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_version_message() {
        let err = Error::UnsupportedVersion {
            name: "vite".to_string(),
            found: "4.9.0".to_string(),
            required: "^5.0.0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unsupported version of vite: found 4.9.0, required ^5.0.0"
        );
        assert_eq!(err.error_code(), "UNSUPPORTED_VERSION");
    }

    #[test]
    fn test_invalid_state_message() {
        let err = Error::InvalidState {
            operation: "init",
            state: LifecycleState::Running,
        };
        assert_eq!(err.to_string(), "Cannot init while running");
    }

    #[test]
    fn test_config_file_not_found_message() {
        let err = Error::ConfigFileNotFound(PathBuf::from("/srv/app/vite.config.js"));
        assert!(err.to_string().contains("/srv/app/vite.config.js"));
        assert_eq!(err.error_code(), "CONFIG_FILE_NOT_FOUND");
    }

    #[test]
    fn test_bind_timeout_message() {
        let err = Error::BindTimeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30s"));
    }
}
