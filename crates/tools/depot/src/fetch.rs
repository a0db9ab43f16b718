//! Artifact download and extraction.

use async_trait::async_trait;
use flate2::read::GzDecoder;
use futures::StreamExt;
use reqwest::Client;
use setup_depot_core::{Error, Result};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tar::Archive;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Downloads release artifacts and unpacks them.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Download `url` to a fresh temporary file and return its path.
    async fn download(&self, url: &str) -> Result<PathBuf>;

    /// Extract a tar archive into a fresh temporary directory and return it.
    async fn extract_tar(&self, archive: &Path) -> Result<PathBuf>;
}

/// [`ArtifactFetcher`] using HTTP downloads and on-disk scratch space.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    temp_root: PathBuf,
}

impl HttpFetcher {
    /// Create a fetcher writing scratch files under `temp_root`.
    #[must_use]
    pub fn new(client: Client, temp_root: PathBuf) -> Self {
        Self { client, temp_root }
    }

    fn scratch_path(&self) -> PathBuf {
        self.temp_root.join(uuid::Uuid::new_v4().to_string())
    }

    async fn stream_to(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::download(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::download(
                url,
                format!("Unexpected HTTP response: {}", status.as_u16()),
            ));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::download(url, e.to_string()))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn download(&self, url: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.temp_root).await?;
        let dest = self.scratch_path();
        debug!(%url, ?dest, "Downloading artifact");

        if let Err(e) = self.stream_to(url, &dest).await {
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(e);
        }
        Ok(dest)
    }

    async fn extract_tar(&self, archive: &Path) -> Result<PathBuf> {
        let dest = self.scratch_path();
        debug!(?archive, ?dest, "Extracting archive");

        let source = archive.to_path_buf();
        let target = dest.clone();
        let unpacked = tokio::task::spawn_blocking(move || unpack(&source, &target))
            .await
            .map_err(|e| Error::extraction(archive, format!("extraction task failed: {e}")))
            .and_then(|result| result);

        if let Err(e) = unpacked {
            let _ = tokio::fs::remove_dir_all(&dest).await;
            return Err(e);
        }
        Ok(dest)
    }
}

/// Unpack a tar archive, gzip-compressed or not, into `dest`.
fn unpack(archive: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;

    let mut reader = BufReader::new(std::fs::File::open(archive)?);
    let gzipped = reader.fill_buf()?.starts_with(&GZIP_MAGIC);

    let source: Box<dyn Read> = if gzipped {
        Box::new(GzDecoder::new(reader))
    } else {
        Box::new(reader)
    };

    Archive::new(source)
        .unpack(dest)
        .map_err(|e| Error::extraction(archive, e.to_string()))
}
