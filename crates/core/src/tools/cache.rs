//! On-disk tool cache shared with other setup actions on the runner.
//!
//! Layout matches the runner tool cache so entries written here are visible
//! to any other action that uses it:
//!
//! ```text
//! $RUNNER_TOOL_CACHE/
//! └── depot/
//!     └── 2.58.0/
//!         ├── x64/          # Cached directory (added to PATH)
//!         └── x64.complete  # Marker written once the copy finished
//! ```

use semver::{Version, VersionReq};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

use super::platform::Arch;
use crate::{Error, Result};

/// A store of installed tools keyed by (tool name, version).
pub trait ToolCache: Send + Sync {
    /// Find a complete cache entry for `tool` matching `version`.
    fn find(&self, tool: &str, version: &str) -> Option<PathBuf>;

    /// Copy `source` into the cache under (`tool`, `version`) and return the
    /// cached directory.
    fn cache_dir(&self, source: &Path, tool: &str, version: &str) -> Result<PathBuf>;
}

/// Tool cache backed by a directory tree.
#[derive(Debug, Clone)]
pub struct DirToolCache {
    root: PathBuf,
    arch: Arch,
}

impl DirToolCache {
    /// Create a cache at the specified root directory.
    #[must_use]
    pub fn new(root: PathBuf, arch: Arch) -> Self {
        Self { root, arch }
    }

    /// Get the cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, tool: &str, version: &str) -> PathBuf {
        self.root
            .join(tool)
            .join(version)
            .join(self.arch.to_string())
    }

    fn marker_path(&self, tool: &str, version: &str) -> PathBuf {
        self.root
            .join(tool)
            .join(version)
            .join(format!("{}.complete", self.arch))
    }

    fn is_complete(&self, tool: &str, version: &str) -> bool {
        self.entry_dir(tool, version).is_dir() && self.marker_path(tool, version).is_file()
    }

    /// List versions of `tool` that have a complete entry for this arch.
    #[must_use]
    pub fn installed_versions(&self, tool: &str) -> Vec<Version> {
        let Ok(entries) = std::fs::read_dir(self.root.join(tool)) else {
            return Vec::new();
        };

        let mut versions: Vec<Version> = entries
            .filter_map(std::result::Result::ok)
            .filter_map(|e| e.file_name().to_str().map(String::from))
            .filter(|name| self.is_complete(tool, name))
            .filter_map(|name| Version::parse(&name).ok())
            .collect();
        versions.sort();
        versions
    }
}

impl ToolCache for DirToolCache {
    fn find(&self, tool: &str, version: &str) -> Option<PathBuf> {
        let wanted = clean_version(version);

        if let Ok(exact) = Version::parse(wanted) {
            let key = exact.to_string();
            if self.is_complete(tool, &key) {
                let path = self.entry_dir(tool, &key);
                trace!(tool, version = %key, ?path, "Cache hit");
                return Some(path);
            }
            trace!(tool, version = %key, "Cache miss");
            return None;
        }

        let Ok(req) = VersionReq::parse(wanted) else {
            trace!(tool, version, "Version is not a semver requirement; not cached");
            return None;
        };

        let best = self
            .installed_versions(tool)
            .into_iter()
            .rev()
            .find(|v| req.matches(v))?;
        let path = self.entry_dir(tool, &best.to_string());
        trace!(tool, %req, version = %best, ?path, "Cache hit by requirement");
        Some(path)
    }

    fn cache_dir(&self, source: &Path, tool: &str, version: &str) -> Result<PathBuf> {
        if !source.is_dir() {
            return Err(Error::cache(format!(
                "Source directory does not exist: {}",
                source.display()
            )));
        }

        let version = clean_version(version);
        let dest = self.entry_dir(tool, version);
        let marker = self.marker_path(tool, version);

        // A previous run may have died halfway through a copy
        if marker.exists() {
            std::fs::remove_file(&marker)?;
        }
        if dest.exists() {
            std::fs::remove_dir_all(&dest)?;
        }
        std::fs::create_dir_all(&dest)?;

        copy_dir_contents(source, &dest)?;
        std::fs::write(&marker, b"")?;

        debug!(tool, version, ?dest, "Stored tool in cache");
        Ok(dest)
    }
}

/// Default cache root used outside of a runner.
#[must_use]
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("setup-depot")
        .join("tool-cache")
}

/// Strip surrounding whitespace and a leading `v` from a version string.
fn clean_version(version: &str) -> &str {
    let trimmed = version.trim();
    trimmed
        .strip_prefix('v')
        .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        .unwrap_or(trimmed)
}

fn copy_dir_contents(source: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.map_err(|e| Error::cache(format!("Failed to walk source: {e}")))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| Error::cache(e.to_string()))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            // fs::copy carries permission bits, which keeps binaries executable
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source_with_binary() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("depot"), b"#!/bin/sh\necho depot\n").unwrap();
        dir
    }

    #[test]
    fn test_cache_dir_then_find_exact() {
        let root = TempDir::new().unwrap();
        let cache = DirToolCache::new(root.path().to_path_buf(), Arch::X64);
        let source = source_with_binary();

        let cached = cache.cache_dir(source.path(), "depot", "2.58.0").unwrap();
        assert_eq!(cached, root.path().join("depot").join("2.58.0").join("x64"));
        assert!(cached.join("depot").is_file());
        assert!(root.path().join("depot/2.58.0/x64.complete").is_file());

        assert_eq!(cache.find("depot", "2.58.0"), Some(cached.clone()));
        assert_eq!(cache.find("depot", "v2.58.0"), Some(cached));
    }

    #[test]
    fn test_find_miss_for_other_version() {
        let root = TempDir::new().unwrap();
        let cache = DirToolCache::new(root.path().to_path_buf(), Arch::X64);
        let source = source_with_binary();
        cache.cache_dir(source.path(), "depot", "2.58.0").unwrap();

        assert_eq!(cache.find("depot", "2.59.0"), None);
        assert_eq!(cache.find("other", "2.58.0"), None);
    }

    #[test]
    fn test_find_ignores_other_arch() {
        let root = TempDir::new().unwrap();
        let source = source_with_binary();
        DirToolCache::new(root.path().to_path_buf(), Arch::Arm64)
            .cache_dir(source.path(), "depot", "2.58.0")
            .unwrap();

        let x64 = DirToolCache::new(root.path().to_path_buf(), Arch::X64);
        assert_eq!(x64.find("depot", "2.58.0"), None);
    }

    #[test]
    fn test_incomplete_entry_is_not_a_hit() {
        let root = TempDir::new().unwrap();
        let cache = DirToolCache::new(root.path().to_path_buf(), Arch::X64);
        std::fs::create_dir_all(root.path().join("depot/2.58.0/x64")).unwrap();

        assert_eq!(cache.find("depot", "2.58.0"), None);
        assert!(cache.installed_versions("depot").is_empty());
    }

    #[test]
    fn test_find_by_requirement_picks_highest() {
        let root = TempDir::new().unwrap();
        let cache = DirToolCache::new(root.path().to_path_buf(), Arch::X64);
        let source = source_with_binary();
        for version in ["2.1.0", "2.9.3", "3.0.0"] {
            cache.cache_dir(source.path(), "depot", version).unwrap();
        }

        assert_eq!(
            cache.find("depot", "2.x"),
            Some(root.path().join("depot/2.9.3/x64"))
        );
        assert_eq!(
            cache.find("depot", "^3"),
            Some(root.path().join("depot/3.0.0/x64"))
        );
        assert_eq!(cache.find("depot", ">=4"), None);
    }

    #[test]
    fn test_latest_is_never_a_hit() {
        let root = TempDir::new().unwrap();
        let cache = DirToolCache::new(root.path().to_path_buf(), Arch::X64);
        let source = source_with_binary();
        cache.cache_dir(source.path(), "depot", "2.58.0").unwrap();

        assert_eq!(cache.find("depot", "latest"), None);
    }

    #[test]
    fn test_cache_dir_replaces_stale_entry() {
        let root = TempDir::new().unwrap();
        let cache = DirToolCache::new(root.path().to_path_buf(), Arch::X64);
        let stale = root.path().join("depot/2.58.0/x64");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("leftover"), b"old").unwrap();

        let source = source_with_binary();
        let cached = cache.cache_dir(source.path(), "depot", "2.58.0").unwrap();

        assert!(!cached.join("leftover").exists());
        assert!(cached.join("depot").is_file());
    }

    #[test]
    fn test_cache_dir_copies_nested_directories() {
        let root = TempDir::new().unwrap();
        let cache = DirToolCache::new(root.path().to_path_buf(), Arch::X64);
        let source = TempDir::new().unwrap();
        std::fs::create_dir_all(source.path().join("share/completions")).unwrap();
        std::fs::write(source.path().join("share/completions/depot.bash"), b"#").unwrap();

        let cached = cache.cache_dir(source.path(), "depot", "1.0.0").unwrap();
        assert!(cached.join("share/completions/depot.bash").is_file());
    }

    #[test]
    fn test_cache_dir_missing_source() {
        let root = TempDir::new().unwrap();
        let cache = DirToolCache::new(root.path().to_path_buf(), Arch::X64);
        let result = cache.cache_dir(&root.path().join("nope"), "depot", "1.0.0");
        assert!(matches!(result, Err(Error::Cache { .. })));
    }

    #[test]
    fn test_default_cache_root() {
        assert!(default_cache_root().ends_with("setup-depot/tool-cache"));
    }

    #[test]
    fn test_clean_version() {
        assert_eq!(clean_version(" v1.2.3 "), "1.2.3");
        assert_eq!(clean_version("1.2.3"), "1.2.3");
        assert_eq!(clean_version("latest"), "latest");
        assert_eq!(clean_version("vnext"), "vnext");
    }
}
