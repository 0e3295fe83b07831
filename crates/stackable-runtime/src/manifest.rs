// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Installed-package manifest lookup.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::provider::{ProviderError, Result};

#[derive(Debug, Deserialize)]
struct PackageManifest {
    version: String,
}

/// Default manifest location for `package`, relative to the project root.
pub fn default_manifest_path(package: &str) -> PathBuf {
    PathBuf::from("node_modules").join(package).join("package.json")
}

/// Read the `version` field of the manifest at `project_root/manifest`.
pub async fn installed_version(project_root: &Path, manifest: &Path) -> Result<String> {
    let path = project_root.join(manifest);
    let contents = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| ProviderError::Manifest {
            path: path.clone(),
            reason: e.to_string(),
        })?;
    let manifest: PackageManifest =
        serde_json::from_str(&contents).map_err(|e| ProviderError::Manifest {
            path: path.clone(),
            reason: e.to_string(),
        })?;
    Ok(manifest.version)
}
