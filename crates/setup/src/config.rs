//! Resolved settings for one setup run.

use setup_depot_core::tools::{Platform, default_cache_root};
use setup_depot_tools_depot::DEFAULT_RELEASE_URL;
use std::path::PathBuf;

/// Subscription service base URL.
pub const DEFAULT_SUBSCRIPTION_URL: &str = "https://agent.api.stepsecurity.io";
/// Depot token exchange base URL.
pub const DEFAULT_AUTH_URL: &str = "https://github.depot.dev";
/// Public OIDC claim service base URL.
pub const DEFAULT_PUBLIC_OIDC_URL: &str = "https://actions-public-oidc.depot.dev";

/// Base URLs of every remote service the step talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Subscription check service.
    pub subscription: String,
    /// Depot CLI release service.
    pub release: String,
    /// Depot OIDC token exchange.
    pub auth: String,
    /// Public OIDC claim service for fork pull requests.
    pub public_oidc: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            subscription: DEFAULT_SUBSCRIPTION_URL.to_string(),
            release: DEFAULT_RELEASE_URL.to_string(),
            auth: DEFAULT_AUTH_URL.to_string(),
            public_oidc: DEFAULT_PUBLIC_OIDC_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Point every service at one base URL.
    #[must_use]
    pub fn all(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            subscription: base.clone(),
            release: base.clone(),
            auth: base.clone(),
            public_oidc: base,
        }
    }
}

/// Everything a setup run needs.
#[derive(Debug, Clone)]
pub struct SetupConfig {
    /// Requested CLI version, `latest` or an explicit version.
    pub version: String,
    /// Whether to exchange an OIDC token for a Depot token.
    pub oidc: bool,
    /// Platform to install for.
    pub platform: Platform,
    /// Root of the tool cache.
    pub tool_cache: PathBuf,
    /// Scratch space for downloads and extraction.
    pub temp_dir: PathBuf,
    /// Remote services.
    pub endpoints: Endpoints,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            version: "latest".to_string(),
            oidc: false,
            platform: Platform::current(),
            tool_cache: default_cache_root(),
            temp_dir: std::env::temp_dir(),
            endpoints: Endpoints::default(),
        }
    }
}
