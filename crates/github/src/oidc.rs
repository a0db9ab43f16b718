//! Actions OIDC ID token requests.
//!
//! Jobs granted `id-token: write` receive `ACTIONS_ID_TOKEN_REQUEST_URL` and
//! `ACTIONS_ID_TOKEN_REQUEST_TOKEN`; the runner mints a JWT for any audience
//! requested against that URL.

use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use setup_depot_core::{Error, Result};
use tracing::debug;

const REQUEST_URL_ENV: &str = "ACTIONS_ID_TOKEN_REQUEST_URL";
const REQUEST_TOKEN_ENV: &str = "ACTIONS_ID_TOKEN_REQUEST_TOKEN";

#[derive(Debug, Deserialize)]
struct IdTokenResponse {
    value: Option<String>,
}

/// Client for the runner's ID token endpoint.
#[derive(Debug, Clone)]
pub struct IdTokenClient {
    client: Client,
    request_url: String,
    request_token: SecretString,
}

impl IdTokenClient {
    /// Create a client for an explicit endpoint.
    #[must_use]
    pub fn new(client: Client, request_url: impl Into<String>, request_token: SecretString) -> Self {
        Self {
            client,
            request_url: request_url.into(),
            request_token,
        }
    }

    /// Create a client from the variables the runner exposes to the job.
    pub fn from_env(client: Client) -> Result<Self> {
        let request_url = std::env::var(REQUEST_URL_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::auth(format!(
                    "Unable to get {REQUEST_URL_ENV} env variable; is `id-token: write` granted?"
                ))
            })?;
        let request_token = std::env::var(REQUEST_TOKEN_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::auth(format!("Unable to get {REQUEST_TOKEN_ENV} env variable")))?;

        Ok(Self::new(client, request_url, SecretString::from(request_token)))
    }

    /// Request an ID token scoped to `audience`.
    pub async fn request(&self, audience: &str) -> Result<SecretString> {
        let mut url = Url::parse(&self.request_url)
            .map_err(|e| Error::auth(format!("Invalid ID token request URL: {e}")))?;
        url.query_pairs_mut().append_pair("audience", audience);
        debug!(%audience, "Requesting Actions ID token");

        let response = self
            .client
            .get(url)
            .bearer_auth(self.request_token.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::auth(format!("Failed to get ID token: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::auth(format!(
                "Failed to get ID token. Error code: {}. Error message: {body}",
                status.as_u16()
            )));
        }

        let body: IdTokenResponse = response
            .json()
            .await
            .map_err(|e| Error::auth(format!("Invalid ID token response: {e}")))?;

        body.value
            .filter(|v| !v.is_empty())
            .map(SecretString::from)
            .ok_or_else(|| Error::auth("Response json body do not have ID token field"))
    }
}
