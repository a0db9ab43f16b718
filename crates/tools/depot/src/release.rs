//! Release resolution against the Depot download service.

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use setup_depot_core::tools::Platform;
use setup_depot_core::{Error, Result};
use std::sync::LazyLock;
use tracing::{debug, info};

/// Default base URL of the release resolution service.
pub const DEFAULT_RELEASE_URL: &str = "https://dl.depot.dev";

/// Captures `major.minor.patch` from GitHub release download URLs.
static RELEASE_VERSION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"cli/releases/download/v(\d+\.\d+\.\d+)").ok());

/// Body returned by the release endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawReleaseResponse")]
pub enum ReleaseResponse {
    /// The version resolved to a downloadable artifact.
    Ok {
        /// Artifact download URL.
        url: String,
    },
    /// The service refused the request.
    Err {
        /// Message explaining why.
        error: String,
    },
}

#[derive(Deserialize)]
struct RawReleaseResponse {
    ok: bool,
    url: Option<String>,
    error: Option<String>,
}

impl TryFrom<RawReleaseResponse> for ReleaseResponse {
    type Error = String;

    fn try_from(raw: RawReleaseResponse) -> std::result::Result<Self, Self::Error> {
        match (raw.ok, raw.url, raw.error) {
            (true, Some(url), _) => Ok(Self::Ok { url }),
            (true, None, _) => Err("`ok: true` response without `url`".to_string()),
            (false, _, Some(error)) => Ok(Self::Err { error }),
            (false, _, None) => Err("`ok: false` response without `error`".to_string()),
        }
    }
}

/// A release resolved to an artifact and a normalized version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelease {
    /// Artifact download URL.
    pub url: String,
    /// `major.minor.patch` taken from the URL, or the requested version.
    pub version: String,
}

/// Extract the release version from an artifact URL.
///
/// Falls back to `requested` unchanged when the URL does not have the
/// `cli/releases/download/v<x.y.z>` shape.
#[must_use]
pub fn version_from_url(url: &str, requested: &str) -> String {
    RELEASE_VERSION
        .as_ref()
        .and_then(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map_or_else(|| requested.to_string(), |m| m.as_str().to_string())
}

/// Resolves version requests through the release service.
#[derive(Debug, Clone)]
pub struct ReleaseResolver {
    client: Client,
    base_url: String,
}

impl ReleaseResolver {
    /// Create a resolver against `base_url`.
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Endpoint queried for `version` on `platform`.
    #[must_use]
    pub fn release_url(&self, version: &str, platform: &Platform) -> String {
        format!(
            "{}/cli/release/{}/{}/{}",
            self.base_url, platform.os, platform.arch, version
        )
    }

    /// Resolve `version` (including `latest`) to a download URL.
    pub async fn resolve(&self, version: &str, platform: &Platform) -> Result<ResolvedRelease> {
        let url = self.release_url(version, platform);
        debug!(%url, "Resolving Depot CLI release");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::resolution(format!("Failed to query {url}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::resolution(format!("Failed to read response from {url}: {e}")))?;

        let parsed: ReleaseResponse = serde_json::from_str(&body).map_err(|e| {
            Error::resolution(format!(
                "Unexpected response from {url} (HTTP {}): {e}",
                status.as_u16()
            ))
        })?;

        match parsed {
            ReleaseResponse::Ok { url } => {
                let resolved = version_from_url(&url, version);
                info!(requested = %version, version = %resolved, %platform, "Resolved Depot CLI release");
                Ok(ResolvedRelease {
                    url,
                    version: resolved,
                })
            }
            ReleaseResponse::Err { error } => Err(Error::release_rejected(error)),
        }
    }
}
