//! Depot token acquisition.
//!
//! Token sources are tried in order and the first one to produce a token
//! wins. A failing source is logged and skipped; acquisition never fails the
//! step.

mod actions;
mod public;

pub use actions::{ActionsOidcSource, DEPOT_AUDIENCE};
pub use public::PublicOidcSource;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use setup_depot_core::{Result, TOKEN_ENV};
use setup_depot_github::{ActionsContext, RunnerCommands};
use tracing::{debug, info, warn};

use crate::config::Endpoints;

/// One way of obtaining a Depot token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this source can be used for the current run.
    fn is_applicable(&self, _context: &ActionsContext) -> bool {
        true
    }

    /// Try to obtain a token. `Ok(None)` means the exchange completed without
    /// producing one.
    async fn token(&self, context: &ActionsContext) -> Result<Option<SecretString>>;
}

/// A token together with the source that produced it.
#[derive(Debug)]
pub struct AcquiredToken {
    /// Name of the producing source.
    pub source: &'static str,
    /// The Depot token.
    pub token: SecretString,
}

/// What the authentication phase did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// OIDC exchange was not requested.
    Disabled,
    /// A Depot token was already configured; nothing was attempted.
    AlreadyPresent,
    /// A token was obtained and published to later steps.
    Exchanged {
        /// Name of the source that produced it.
        source: &'static str,
    },
    /// No source produced a token.
    Unavailable,
}

/// Ordered token sources plus publication of the winner.
pub struct TokenExchange {
    sources: Vec<Box<dyn TokenSource>>,
}

impl std::fmt::Debug for TokenExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenExchange")
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl TokenExchange {
    /// Create an exchange over `sources`, tried in order.
    #[must_use]
    pub fn new(sources: Vec<Box<dyn TokenSource>>) -> Self {
        Self { sources }
    }

    /// The Actions OIDC exchange followed by the public claim flow.
    #[must_use]
    pub fn standard(client: &Client, endpoints: &Endpoints) -> Self {
        Self::new(vec![
            Box::new(ActionsOidcSource::new(client.clone(), &endpoints.auth)),
            Box::new(PublicOidcSource::new(client.clone(), &endpoints.public_oidc)),
        ])
    }

    /// Return the first token any applicable source produces.
    pub async fn acquire(&self, context: &ActionsContext) -> Option<AcquiredToken> {
        stream::iter(&self.sources)
            .fold(None, |found, source| async move {
                match found {
                    Some(token) => Some(token),
                    None => try_source(source.as_ref(), context).await,
                }
            })
            .await
    }

    /// Acquire a token and publish it as a masked `DEPOT_TOKEN` for later
    /// steps, unless one is already configured.
    pub async fn run(&self, runner: &dyn RunnerCommands, context: &ActionsContext) -> AuthOutcome {
        if runner.var(TOKEN_ENV).is_some() {
            debug!("{TOKEN_ENV} already set; skipping token exchange");
            return AuthOutcome::AlreadyPresent;
        }

        let Some(acquired) = self.acquire(context).await else {
            info!("No Depot token was obtained");
            return AuthOutcome::Unavailable;
        };

        if let Err(e) = publish(runner, &acquired.token) {
            warn!(error = %e, "Failed to publish Depot token");
            return AuthOutcome::Unavailable;
        }
        info!(source = acquired.source, "Exported {TOKEN_ENV} for later steps");
        AuthOutcome::Exchanged {
            source: acquired.source,
        }
    }
}

async fn try_source(source: &dyn TokenSource, context: &ActionsContext) -> Option<AcquiredToken> {
    let name = source.name();
    if !source.is_applicable(context) {
        debug!(source = name, "Token source does not apply to this run");
        return None;
    }

    match source.token(context).await {
        Ok(Some(token)) => Some(AcquiredToken {
            source: name,
            token,
        }),
        Ok(None) => {
            debug!(source = name, "Token source returned no token");
            None
        }
        Err(e) => {
            info!(source = name, error = %e, "Token exchange failed");
            None
        }
    }
}

/// Register the token as a secret, then export it.
fn publish(runner: &dyn RunnerCommands, token: &SecretString) -> Result<()> {
    runner.set_secret(token.expose_secret())?;
    runner.export_variable(TOKEN_ENV, token.expose_secret())
}
