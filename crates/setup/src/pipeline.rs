//! The setup pipeline: subscription gate, install, then authentication.

use reqwest::Client;
use setup_depot_core::tools::DirToolCache;
use setup_depot_core::{Error, Result};
use setup_depot_github::{ActionsContext, RunnerCommands};
use setup_depot_tools_depot::{HttpFetcher, InstalledTool, Installer, ReleaseResolver};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthOutcome, TokenExchange};
use crate::cli::{EXIT_FAILURE, EXIT_OK};
use crate::config::SetupConfig;
use crate::subscription::{Subscription, SubscriptionChecker};

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct SetupReport {
    /// Result of the subscription check.
    pub subscription: Subscription,
    /// The installed CLI.
    pub tool: InstalledTool,
    /// What the authentication phase did.
    pub auth: AuthOutcome,
}

/// Build the HTTP client shared by every remote call.
pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("setup-depot/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::configuration(format!("Failed to build HTTP client: {e}")))
}

/// Run every step in order.
///
/// A rejected subscription returns before any release request is made.
/// Authentication problems are logged and never turn into an error.
pub async fn run(
    config: &SetupConfig,
    runner: &dyn RunnerCommands,
    context: &ActionsContext,
) -> Result<SetupReport> {
    let client = http_client()?;

    let subscription = SubscriptionChecker::new(client.clone(), &config.endpoints.subscription)
        .check(&context.repository)
        .await;
    if let Subscription::Rejected { status } = subscription {
        return Err(Error::SubscriptionRejected { status });
    }

    let release = ReleaseResolver::new(client.clone(), &config.endpoints.release)
        .resolve(&config.version, &config.platform)
        .await?;

    let installer = Installer::new(
        Arc::new(DirToolCache::new(
            config.tool_cache.clone(),
            config.platform.arch,
        )),
        Arc::new(HttpFetcher::new(client.clone(), config.temp_dir.clone())),
    );
    let tool = installer.install(&release, runner).await?;
    info!("depot {} is installed", tool.version);

    let auth = if config.oidc {
        TokenExchange::standard(&client, &config.endpoints)
            .run(runner, context)
            .await
    } else {
        debug!("OIDC token exchange not requested");
        AuthOutcome::Disabled
    };

    Ok(SetupReport {
        subscription,
        tool,
        auth,
    })
}

/// Report `err` as a workflow error annotation and pick the exit code.
pub fn report_failure(runner: &dyn RunnerCommands, err: &Error) -> i32 {
    error!(error = %err, "Setup failed");
    if let Err(e) = runner.error(&err.to_string()) {
        warn!(error = %e, "Failed to emit error annotation");
    }
    EXIT_FAILURE
}

/// Run and translate the outcome into an exit code.
pub async fn execute(
    config: &SetupConfig,
    runner: &dyn RunnerCommands,
    context: &ActionsContext,
) -> i32 {
    match run(config, runner, context).await {
        Ok(report) => {
            debug!(?report, "Setup finished");
            EXIT_OK
        }
        Err(err) => report_failure(runner, &err),
    }
}
