//! GitHub Actions setup step for the Depot CLI.
//!
//! A run goes through four steps:
//! - a subscription check that can stop the step before anything else happens
//! - release resolution for the requested version and the runner's platform
//! - installation into the runner tool cache and onto `PATH`
//! - an optional OIDC exchange that exports a `DEPOT_TOKEN` for later steps

#![warn(missing_docs)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod subscription;
pub mod tracing;

pub use auth::{AuthOutcome, TokenExchange, TokenSource};
pub use cli::{Cli, EXIT_FAILURE, EXIT_OK};
pub use config::{Endpoints, SetupConfig};
pub use pipeline::{SetupReport, execute, run};
pub use subscription::{Subscription, SubscriptionChecker};
