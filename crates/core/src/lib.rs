//! Core types for setup-depot.
//!
//! Shared by every crate in the workspace:
//! - [`Error`] and [`Result`] for error handling
//! - [`tools`] for platform detection and the runner tool cache

mod error;
pub mod tools;

pub use error::{Error, Result};

/// Name under which the CLI is stored in the tool cache.
pub const TOOL_NAME: &str = "depot";

/// Environment variable holding the Depot API token.
pub const TOKEN_ENV: &str = "DEPOT_TOKEN";
