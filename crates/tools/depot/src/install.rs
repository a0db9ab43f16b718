//! Installs a resolved release into the tool cache and onto `PATH`.

use setup_depot_core::tools::ToolCache;
use setup_depot_core::{Error, Result, TOOL_NAME};
use setup_depot_github::RunnerCommands;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::fetch::ArtifactFetcher;
use crate::release::ResolvedRelease;

/// A tool available on `PATH` after installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledTool {
    /// Tool name used as the cache key.
    pub name: String,
    /// Version used as the cache key.
    pub version: String,
    /// Directory added to `PATH`.
    pub path: PathBuf,
    /// Whether the tool came from an existing cache entry.
    pub from_cache: bool,
}

/// Installs the Depot CLI, reusing cached copies when present.
#[derive(Clone)]
pub struct Installer {
    cache: Arc<dyn ToolCache>,
    fetcher: Arc<dyn ArtifactFetcher>,
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer").finish_non_exhaustive()
    }
}

impl Installer {
    /// Create an installer over a cache and a fetcher.
    #[must_use]
    pub fn new(cache: Arc<dyn ToolCache>, fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        Self { cache, fetcher }
    }

    /// Make `release` available on `PATH`.
    ///
    /// A cache hit only registers the cached directory; a miss downloads the
    /// archive, extracts it and caches its `bin` directory first.
    pub async fn install(
        &self,
        release: &ResolvedRelease,
        runner: &dyn RunnerCommands,
    ) -> Result<InstalledTool> {
        if let Some(cached) = self.cache.find(TOOL_NAME, &release.version) {
            debug!(version = %release.version, ?cached, "Depot CLI already cached");
            runner.add_path(&cached)?;
            return Ok(InstalledTool {
                name: TOOL_NAME.to_string(),
                version: release.version.clone(),
                path: cached,
                from_cache: true,
            });
        }

        info!(url = %release.url, version = %release.version, "Downloading Depot CLI");
        let archive = self.fetcher.download(&release.url).await?;
        let extracted = match self.fetcher.extract_tar(&archive).await {
            Ok(dir) => dir,
            Err(e) => {
                remove_scratch(&archive, None);
                return Err(e);
            }
        };

        let stored = self.store_bin(&archive, &extracted, &release.version);
        // Scratch files go away whether or not the cache took a copy
        remove_scratch(&archive, Some(&extracted));
        let cached = stored?;
        runner.add_path(&cached)?;

        Ok(InstalledTool {
            name: TOOL_NAME.to_string(),
            version: release.version.clone(),
            path: cached,
            from_cache: false,
        })
    }

    fn store_bin(&self, archive: &Path, extracted: &Path, version: &str) -> Result<PathBuf> {
        let bin = extracted.join("bin");
        if !bin.is_dir() {
            return Err(Error::extraction(
                archive,
                "archive does not contain a bin directory",
            ));
        }
        self.cache.cache_dir(&bin, TOOL_NAME, version)
    }
}

fn remove_scratch(archive: &Path, extracted: Option<&Path>) {
    if let Err(e) = std::fs::remove_file(archive) {
        debug!(?archive, error = %e, "Failed to remove downloaded archive");
    }
    if let Some(extracted) = extracted {
        if let Err(e) = std::fs::remove_dir_all(extracted) {
            debug!(?extracted, error = %e, "Failed to remove extraction directory");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use setup_depot_core::tools::{Arch, DirToolCache};
    use setup_depot_github::MemoryRunner;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Fetcher that lays out a fake extraction and counts calls.
    struct CountingFetcher {
        scratch: PathBuf,
        with_bin: bool,
        downloads: AtomicUsize,
        extractions: AtomicUsize,
    }

    impl CountingFetcher {
        fn new(scratch: &Path, with_bin: bool) -> Self {
            Self {
                scratch: scratch.to_path_buf(),
                with_bin,
                downloads: AtomicUsize::new(0),
                extractions: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ArtifactFetcher for CountingFetcher {
        async fn download(&self, _url: &str) -> Result<PathBuf> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            let archive = self.scratch.join("archive");
            std::fs::write(&archive, b"tar")?;
            Ok(archive)
        }

        async fn extract_tar(&self, _archive: &Path) -> Result<PathBuf> {
            self.extractions.fetch_add(1, Ordering::SeqCst);
            let dir = self.scratch.join("extracted");
            if self.with_bin {
                std::fs::create_dir_all(dir.join("bin"))?;
                std::fs::write(dir.join("bin").join("depot"), b"binary")?;
            } else {
                std::fs::create_dir_all(&dir)?;
            }
            Ok(dir)
        }
    }

    fn release(version: &str) -> ResolvedRelease {
        ResolvedRelease {
            url: format!("https://github.com/depot/cli/releases/download/v{version}/depot.tar.gz"),
            version: version.to_string(),
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_download() {
        let root = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let cache = Arc::new(DirToolCache::new(root.path().to_path_buf(), Arch::X64));
        let seeded = TempDir::new().unwrap();
        std::fs::write(seeded.path().join("depot"), b"binary").unwrap();
        let cached = cache.cache_dir(seeded.path(), "depot", "2.58.0").unwrap();

        let fetcher = Arc::new(CountingFetcher::new(scratch.path(), true));
        let installer = Installer::new(cache, fetcher.clone());
        let runner = MemoryRunner::new();

        let tool = installer.install(&release("2.58.0"), &runner).await.unwrap();

        assert!(tool.from_cache);
        assert_eq!(tool.path, cached);
        assert_eq!(runner.paths(), vec![cached]);
        assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 0);
        assert_eq!(fetcher.extractions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_miss_downloads_and_caches_bin() {
        let root = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let cache = Arc::new(DirToolCache::new(root.path().to_path_buf(), Arch::X64));
        let fetcher = Arc::new(CountingFetcher::new(scratch.path(), true));
        let installer = Installer::new(cache.clone(), fetcher.clone());
        let runner = MemoryRunner::new();

        let tool = installer.install(&release("2.58.0"), &runner).await.unwrap();

        assert!(!tool.from_cache);
        assert_eq!(tool.name, "depot");
        assert_eq!(tool.path, root.path().join("depot/2.58.0/x64"));
        assert!(tool.path.join("depot").is_file());
        assert_eq!(runner.paths(), vec![tool.path.clone()]);
        assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.extractions.load(Ordering::SeqCst), 1);
        assert_eq!(cache.find("depot", "2.58.0"), Some(tool.path));
        assert!(!scratch.path().join("extracted").exists());
    }

    #[tokio::test]
    async fn test_second_install_uses_cache() {
        let root = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let cache = Arc::new(DirToolCache::new(root.path().to_path_buf(), Arch::X64));
        let fetcher = Arc::new(CountingFetcher::new(scratch.path(), true));
        let installer = Installer::new(cache, fetcher.clone());

        installer
            .install(&release("2.58.0"), &MemoryRunner::new())
            .await
            .unwrap();
        let second = installer
            .install(&release("2.58.0"), &MemoryRunner::new())
            .await
            .unwrap();

        assert!(second.from_cache);
        assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_archive_without_bin_fails() {
        let root = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let cache = Arc::new(DirToolCache::new(root.path().to_path_buf(), Arch::X64));
        let fetcher = Arc::new(CountingFetcher::new(scratch.path(), false));
        let installer = Installer::new(cache, fetcher);
        let runner = MemoryRunner::new();

        let err = installer
            .install(&release("2.58.0"), &runner)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Extraction { .. }));
        assert!(runner.paths().is_empty());
        assert!(!scratch.path().join("archive").exists());
        assert!(!scratch.path().join("extracted").exists());
    }
}
