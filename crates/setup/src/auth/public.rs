//! Public OIDC claim flow for pull requests from forks.
//!
//! Fork pull requests into public repositories get no `id-token: write`
//! permission. The public provider instead issues a claim, prints a
//! challenge code that it later finds in the job log, and releases a token
//! once the run is verified.

use async_trait::async_trait;
use reqwest::{Client, Url};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use setup_depot_core::{Error, Result};
use setup_depot_github::ActionsContext;
use tracing::{debug, info};

use super::{DEPOT_AUDIENCE, TokenSource};

#[derive(Debug, Serialize)]
struct ClaimRequest<'a> {
    aud: &'a str,
    #[serde(rename = "eventName")]
    event_name: &'a str,
    repo: &'a str,
    #[serde(rename = "runID")]
    run_id: Option<u64>,
    attempt: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ClaimResponse {
    #[serde(rename = "claimID")]
    claim_id: String,
    #[serde(rename = "challengeCode")]
    challenge_code: String,
    #[serde(rename = "exchangeURL")]
    exchange_url: String,
}

#[derive(Debug, Serialize)]
struct ExchangeRequest<'a> {
    #[serde(rename = "claimID")]
    claim_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Obtains a token through the public claim provider.
#[derive(Debug, Clone)]
pub struct PublicOidcSource {
    client: Client,
    base_url: String,
}

impl PublicOidcSource {
    /// Create a source against the provider at `base_url`.
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn base(&self) -> Result<Url> {
        // Trailing slash so relative joins keep any base path
        let raw = format!("{}/", self.base_url.trim_end_matches('/'));
        Url::parse(&raw).map_err(|e| Error::auth(format!("Invalid public OIDC URL: {e}")))
    }

    async fn post<B, R>(&self, url: Url, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| Error::auth(format!("Request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::auth(format!(
                "{url} returned HTTP {}",
                status.as_u16()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| Error::auth(format!("Invalid response from {url}: {e}")))
    }
}

#[async_trait]
impl TokenSource for PublicOidcSource {
    fn name(&self) -> &'static str {
        "public-oidc"
    }

    fn is_applicable(&self, context: &ActionsContext) -> bool {
        context.is_oss_pull_request()
    }

    async fn token(&self, context: &ActionsContext) -> Result<Option<SecretString>> {
        let base = self.base()?;
        let claim_url = base
            .join("claim")
            .map_err(|e| Error::auth(format!("Invalid claim URL: {e}")))?;

        debug!(%claim_url, "Creating public OIDC claim");
        let claim: ClaimResponse = self
            .post(
                claim_url,
                &ClaimRequest {
                    aud: DEPOT_AUDIENCE,
                    event_name: &context.event_name,
                    repo: &context.repository,
                    run_id: context.run_id,
                    attempt: context.run_attempt,
                },
            )
            .await?;

        info!(
            challenge_code = %claim.challenge_code,
            "Public OIDC claim created; challenge code: {}",
            claim.challenge_code
        );

        let exchange_url = base
            .join(&claim.exchange_url)
            .map_err(|e| Error::auth(format!("Invalid exchange URL: {e}")))?;
        let exchanged: ExchangeResponse = self
            .post(
                exchange_url,
                &ExchangeRequest {
                    claim_id: &claim.claim_id,
                },
            )
            .await?;

        let token = exchanged
            .token
            .filter(|t| !t.is_empty())
            .map(SecretString::from);
        if token.is_some() {
            info!("Exchanged public OIDC claim for temporary Depot token");
        }
        Ok(token)
    }
}
