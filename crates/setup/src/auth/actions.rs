//! Exchange of a GitHub Actions OIDC token for a Depot token.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use setup_depot_core::{Error, Result};
use setup_depot_github::{ActionsContext, IdTokenClient};
use tracing::{debug, info};

use super::TokenSource;

/// Audience requested for the Actions ID token.
pub const DEPOT_AUDIENCE: &str = "https://depot.dev";

#[derive(Debug, Serialize)]
struct ExchangeRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    token: Option<String>,
}

/// Trades the job's Actions ID token for a short-lived Depot token.
///
/// Requires the workflow to grant `id-token: write`.
#[derive(Debug, Clone)]
pub struct ActionsOidcSource {
    client: Client,
    auth_url: String,
    id_tokens: Option<IdTokenClient>,
}

impl ActionsOidcSource {
    /// Create a source reading the ID token endpoint from the environment.
    #[must_use]
    pub fn new(client: Client, auth_url: impl Into<String>) -> Self {
        Self {
            client,
            auth_url: auth_url.into(),
            id_tokens: None,
        }
    }

    /// Use an explicit ID token endpoint instead of the environment.
    #[must_use]
    pub fn with_id_tokens(mut self, id_tokens: IdTokenClient) -> Self {
        self.id_tokens = Some(id_tokens);
        self
    }

    fn exchange_url(&self) -> String {
        format!(
            "{}/auth/oidc/github-actions",
            self.auth_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl TokenSource for ActionsOidcSource {
    fn name(&self) -> &'static str {
        "actions-oidc"
    }

    async fn token(&self, _context: &ActionsContext) -> Result<Option<SecretString>> {
        let id_tokens = match &self.id_tokens {
            Some(client) => client.clone(),
            None => IdTokenClient::from_env(self.client.clone())?,
        };
        let id_token = id_tokens.request(DEPOT_AUDIENCE).await?;

        let url = self.exchange_url();
        debug!(%url, "Exchanging Actions ID token");
        let response = self
            .client
            .post(&url)
            .json(&ExchangeRequest {
                token: id_token.expose_secret(),
            })
            .send()
            .await
            .map_err(|e| Error::auth(format!("Token exchange request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::auth(format!(
                "Token exchange returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: ExchangeResponse = response
            .json()
            .await
            .map_err(|e| Error::auth(format!("Invalid token exchange response: {e}")))?;
        debug!(ok = body.ok, "Token exchange answered");

        let token = body
            .token
            .filter(|t| body.ok && !t.is_empty())
            .map(SecretString::from);
        if token.is_some() {
            info!("Exchanged GitHub Actions OIDC token for temporary Depot token");
        }
        Ok(token)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn id_token_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/id-token"))
            .and(query_param("audience", DEPOT_AUDIENCE))
            .and(header("authorization", "Bearer runner-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "jwt" })))
            .mount(&server)
            .await;
        server
    }

    fn source(server: &MockServer) -> ActionsOidcSource {
        let client = Client::new();
        let id_tokens = IdTokenClient::new(
            client.clone(),
            format!("{}/id-token", server.uri()),
            SecretString::from("runner-secret"),
        );
        ActionsOidcSource::new(client, server.uri()).with_id_tokens(id_tokens)
    }

    #[tokio::test]
    async fn test_exchanges_id_token() {
        let server = id_token_server().await;
        Mock::given(method("POST"))
            .and(path("/auth/oidc/github-actions"))
            .and(body_json(json!({ "token": "jwt" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "token": "depot-tok" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let token = source(&server)
            .token(&ActionsContext::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token.expose_secret(), "depot-tok");
    }

    #[tokio::test]
    async fn test_missing_token_is_none() {
        let server = id_token_server().await;
        Mock::given(method("POST"))
            .and(path("/auth/oidc/github-actions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": false })))
            .mount(&server)
            .await;

        let token = source(&server).token(&ActionsContext::default()).await.unwrap();
        assert!(token.is_none());
    }

    #[tokio::test]
    async fn test_refused_exchange_ignores_token() {
        let server = id_token_server().await;
        Mock::given(method("POST"))
            .and(path("/auth/oidc/github-actions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "ok": false, "token": "stale" })),
            )
            .mount(&server)
            .await;

        let token = source(&server).token(&ActionsContext::default()).await.unwrap();
        assert!(token.is_none());
    }

    #[tokio::test]
    async fn test_http_error_is_auth_error() {
        let server = id_token_server().await;
        Mock::given(method("POST"))
            .and(path("/auth/oidc/github-actions"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = source(&server)
            .token(&ActionsContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth { .. }));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_id_token_failure_skips_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/id-token"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = source(&server).token(&ActionsContext::default()).await;
        assert!(matches!(result, Err(Error::Auth { .. })));
    }

    #[tokio::test]
    async fn test_missing_runner_variables_is_error() {
        let result = temp_env::async_with_vars(
            [
                ("ACTIONS_ID_TOKEN_REQUEST_URL", None::<&str>),
                ("ACTIONS_ID_TOKEN_REQUEST_TOKEN", None),
            ],
            async {
                ActionsOidcSource::new(Client::new(), "http://127.0.0.1:9")
                    .token(&ActionsContext::default())
                    .await
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Auth { .. })));
    }
}
