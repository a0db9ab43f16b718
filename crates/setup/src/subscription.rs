//! Subscription gate run before anything else.
//!
//! Only an explicit non-success answer stops the step. An endpoint that is
//! slow or unreachable never blocks installation.

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Upper bound on the subscription request.
pub const SUBSCRIPTION_TIMEOUT: Duration = Duration::from_millis(3000);

/// Outcome of the subscription check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    /// The endpoint answered with a 2xx status.
    Active,
    /// The endpoint answered with any other status.
    Rejected {
        /// HTTP status code.
        status: u16,
    },
    /// The request timed out or never reached the endpoint.
    Unreachable,
}

/// Client for the subscription endpoint.
#[derive(Debug, Clone)]
pub struct SubscriptionChecker {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl SubscriptionChecker {
    /// Create a checker against `base_url`.
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout: SUBSCRIPTION_TIMEOUT,
        }
    }

    /// Override the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// URL checked for `repository` ("owner/name").
    #[must_use]
    pub fn url(&self, repository: &str) -> String {
        format!(
            "{}/v1/github/{repository}/actions/subscription",
            self.base_url.trim_end_matches('/')
        )
    }

    /// Check whether `repository` holds a valid subscription.
    pub async fn check(&self, repository: &str) -> Subscription {
        let url = self.url(repository);
        debug!(%url, "Checking subscription");

        match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(response) if response.status().is_success() => Subscription::Active,
            Ok(response) => Subscription::Rejected {
                status: response.status().as_u16(),
            },
            Err(e) => {
                debug!(error = %e, "Subscription request failed");
                info!("Timeout or API not reachable. Continuing to next step.");
                Subscription::Unreachable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SUBSCRIPTION_PATH: &str = "/v1/github/depot/cli/actions/subscription";

    async fn check_with(template: ResponseTemplate) -> Subscription {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SUBSCRIPTION_PATH))
            .respond_with(template)
            .expect(1)
            .mount(&server)
            .await;

        SubscriptionChecker::new(Client::new(), server.uri())
            .with_timeout(Duration::from_millis(200))
            .check("depot/cli")
            .await
    }

    #[test]
    fn test_url() {
        let checker = SubscriptionChecker::new(Client::new(), "https://agent.api.stepsecurity.io/");
        assert_eq!(
            checker.url("depot/cli"),
            "https://agent.api.stepsecurity.io/v1/github/depot/cli/actions/subscription"
        );
    }

    #[tokio::test]
    async fn test_success_is_active() {
        assert_eq!(
            check_with(ResponseTemplate::new(200)).await,
            Subscription::Active
        );
    }

    #[tokio::test]
    async fn test_forbidden_is_rejected() {
        assert_eq!(
            check_with(ResponseTemplate::new(403)).await,
            Subscription::Rejected { status: 403 }
        );
    }

    #[tokio::test]
    async fn test_server_error_is_rejected() {
        assert_eq!(
            check_with(ResponseTemplate::new(500)).await,
            Subscription::Rejected { status: 500 }
        );
    }

    #[tokio::test]
    async fn test_slow_endpoint_is_unreachable() {
        let template = ResponseTemplate::new(200).set_delay(Duration::from_secs(2));
        assert_eq!(check_with(template).await, Subscription::Unreachable);
    }

    #[tokio::test]
    async fn test_closed_port_is_unreachable() {
        // Port 9 (discard) is not listened on in test environments
        let checker = SubscriptionChecker::new(Client::new(), "http://127.0.0.1:9")
            .with_timeout(Duration::from_millis(500));
        assert_eq!(checker.check("depot/cli").await, Subscription::Unreachable);
    }
}
