// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Compatibility check between an adapter and the installed server package.

use semver::{Version, VersionReq};
use tracing::debug;

use crate::error::{Error, Result};

/// Semver range an embedded server package must satisfy.
#[derive(Debug, Clone)]
pub struct VersionGate {
    package: String,
    range: String,
    required: VersionReq,
}

impl VersionGate {
    /// Parse `range` for `package`.
    pub fn new(package: impl Into<String>, range: &str) -> Result<Self> {
        let required = VersionReq::parse(range).map_err(|e| Error::InvalidVersionRange {
            range: range.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            package: package.into(),
            range: range.to_string(),
            required,
        })
    }

    /// Package name the gate applies to.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// The declared range.
    pub fn range(&self) -> &str {
        &self.range
    }

    /// Check an installed version string against the range.
    ///
    /// Unparsable versions and prereleases fail closed.
    pub fn check(&self, installed: &str) -> Result<Version> {
        let raw = installed.trim();
        let raw = raw.strip_prefix('v').or_else(|| raw.strip_prefix('=')).unwrap_or(raw);

        let unsupported = || Error::UnsupportedVersion {
            name: self.package.clone(),
            found: installed.to_string(),
            required: self.range.clone(),
        };

        let version = Version::parse(raw).map_err(|_| unsupported())?;
        if !version.pre.is_empty() || !self.required.matches(&version) {
            return Err(unsupported());
        }

        debug!(
            package = %self.package,
            version = %version,
            range = %self.range,
            "Version accepted"
        );
        Ok(version)
    }
}
