//! Depot CLI release provider for setup-depot.
//!
//! Resolves a version request through the Depot download service and
//! installs the matching release. Supports:
//! - `latest` and explicit versions, normalized from the artifact URL
//! - Gzip-compressed and plain tar archives
//! - Reuse of runner tool cache entries across jobs

#![warn(missing_docs)]

mod fetch;
mod install;
mod release;

pub use fetch::{ArtifactFetcher, HttpFetcher};
pub use install::{InstalledTool, Installer};
pub use release::{
    DEFAULT_RELEASE_URL, ReleaseResolver, ReleaseResponse, ResolvedRelease, version_from_url,
};
