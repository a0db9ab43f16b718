//! GitHub Actions runner integration for setup-depot.
//!
//! This crate provides:
//! - [`RunnerCommands`] with [`ActionsRunner`] and [`MemoryRunner`] for
//!   `GITHUB_PATH`, `GITHUB_ENV` and stdout workflow commands
//! - [`ActionsContext`] for event metadata and the fork pull request check
//! - [`IdTokenClient`] for Actions OIDC ID tokens

#![warn(missing_docs)]

pub mod context;
pub mod oidc;
pub mod runner;

// Re-exports for convenience
pub use context::{ActionsContext, EventPayload};
pub use oidc::IdTokenClient;
pub use runner::{ActionsRunner, MemoryRunner, RunnerCommands};
