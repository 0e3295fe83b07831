// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Base-path and config-file path handling.

use std::path::{Path, PathBuf};

/// Normalize an application base into the mount path handed to the server.
///
/// A leading `/` is added, runs of `/` collapse to one and a trailing `/`
/// is dropped. Returns `None` for an absent base or one that normalizes to
/// the root, in which case the server is mounted at `/`.
///
/// ```
/// use stackable_runtime::paths::normalize_base_path;
///
/// assert_eq!(normalize_base_path(Some("foo//bar/")).as_deref(), Some("/foo/bar"));
/// assert_eq!(normalize_base_path(Some("/")), None);
/// assert_eq!(normalize_base_path(None), None);
/// ```
pub fn normalize_base_path(base: Option<&str>) -> Option<String> {
    let base = base?;
    let mut normalized = String::with_capacity(base.len() + 1);
    for segment in base.split('/').filter(|s| !s.is_empty()) {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// The base path a live server reports for a requested base: the
/// normalized base with a trailing `/`, or `/` when there is none.
pub fn live_base_path(base: Option<&str>) -> String {
    match normalize_base_path(base) {
        Some(path) => format!("{}/", path),
        None => "/".to_string(),
    }
}

/// Strip one leading and one trailing `/` from the live server's base.
///
/// `/foo/bar/` becomes `foo/bar`; `/` becomes the empty string.
pub fn prefix_from_base(base: &str) -> String {
    let trimmed = base.strip_prefix('/').unwrap_or(base);
    trimmed.strip_suffix('/').unwrap_or(trimmed).to_string()
}

/// Resolve a config file against the project root.
///
/// Absolute paths are kept as-is.
pub fn resolve_config_file(root: &Path, config_file: Option<&Path>) -> Option<PathBuf> {
    config_file.map(|file| root.join(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_adds_leading_slash() {
        assert_eq!(normalize_base_path(Some("app")).as_deref(), Some("/app"));
    }

    #[test]
    fn test_normalize_collapses_and_trims() {
        assert_eq!(
            normalize_base_path(Some("//foo///bar//")).as_deref(),
            Some("/foo/bar")
        );
        assert_eq!(normalize_base_path(Some("/docs/")).as_deref(), Some("/docs"));
    }

    #[test]
    fn test_normalize_root_and_empty() {
        assert_eq!(normalize_base_path(Some("")), None);
        assert_eq!(normalize_base_path(Some("/")), None);
        assert_eq!(normalize_base_path(Some("///")), None);
        assert_eq!(normalize_base_path(None), None);
    }

    #[test]
    fn test_live_base_path() {
        assert_eq!(live_base_path(Some("foo//bar/")), "/foo/bar/");
        assert_eq!(live_base_path(None), "/");
        assert_eq!(live_base_path(Some("/")), "/");
    }

    #[test]
    fn test_prefix_from_base() {
        assert_eq!(prefix_from_base("/foo/bar/"), "foo/bar");
        assert_eq!(prefix_from_base("/app/"), "app");
        assert_eq!(prefix_from_base("/"), "");
        assert_eq!(prefix_from_base("plain"), "plain");
    }

    #[test]
    fn test_resolve_config_file() {
        let root = Path::new("/srv/web");
        assert_eq!(
            resolve_config_file(root, Some(Path::new("vite.config.js"))),
            Some(PathBuf::from("/srv/web/vite.config.js"))
        );
        assert_eq!(
            resolve_config_file(root, Some(Path::new("/etc/vite.config.js"))),
            Some(PathBuf::from("/etc/vite.config.js"))
        );
        assert_eq!(resolve_config_file(root, None), None);
    }
}
