//! Workflow run context.
//!
//! Carries the subset of the Actions environment and webhook payload the
//! setup step needs to decide how to authenticate.

use serde::Deserialize;
use setup_depot_core::{Error, Result};
use std::path::Path;
use tracing::{debug, warn};

/// Context about the workflow run that invoked the step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionsContext {
    /// The event that triggered the workflow (e.g., "push", "pull_request").
    pub event_name: String,
    /// Repository running the workflow, as "owner/name".
    pub repository: String,
    /// Unique id of the workflow run.
    pub run_id: Option<u64>,
    /// Attempt number of the run.
    pub run_attempt: Option<u32>,
    /// Parsed webhook payload.
    pub payload: EventPayload,
}

/// Webhook payload fields used by the setup step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EventPayload {
    /// Repository the event belongs to.
    #[serde(default)]
    pub repository: Option<RepositoryRef>,
    /// Pull request, for pull request events.
    #[serde(default)]
    pub pull_request: Option<PullRequest>,
}

/// Repository as it appears in webhook payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RepositoryRef {
    /// Name as "owner/name".
    #[serde(default)]
    pub full_name: Option<String>,
    /// Visibility; absent when the payload omits it.
    #[serde(default)]
    pub private: Option<bool>,
}

/// Pull request as it appears in webhook payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    /// Pull request number.
    #[serde(default)]
    pub number: Option<u64>,
    /// Source side of the pull request.
    #[serde(default)]
    pub head: Option<PullRequestRef>,
    /// Target side of the pull request.
    #[serde(default)]
    pub base: Option<PullRequestRef>,
}

/// Head or base side of a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PullRequestRef {
    /// Repository on this side; null once a fork is deleted.
    #[serde(default)]
    pub repo: Option<RepositoryRef>,
}

impl EventPayload {
    /// Load a payload from the file the runner wrote for this event.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            Error::configuration(format!(
                "Invalid event payload at {}: {e}",
                path.display()
            ))
        })
    }
}

impl ActionsContext {
    /// Build the context from the standard `GITHUB_*` variables.
    ///
    /// A missing or unreadable `GITHUB_EVENT_PATH` yields an empty payload;
    /// the context only steers optional authentication.
    #[must_use]
    pub fn from_env() -> Self {
        let payload = match std::env::var_os("GITHUB_EVENT_PATH").filter(|p| !p.is_empty()) {
            Some(path) if Path::new(&path).exists() => EventPayload::from_file(Path::new(&path))
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Ignoring unreadable event payload");
                    EventPayload::default()
                }),
            Some(path) => {
                debug!(?path, "GITHUB_EVENT_PATH does not exist");
                EventPayload::default()
            }
            None => EventPayload::default(),
        };

        Self {
            event_name: std::env::var("GITHUB_EVENT_NAME").unwrap_or_default(),
            repository: std::env::var("GITHUB_REPOSITORY").unwrap_or_default(),
            run_id: std::env::var("GITHUB_RUN_ID")
                .ok()
                .and_then(|s| s.parse().ok()),
            run_attempt: std::env::var("GITHUB_RUN_ATTEMPT")
                .ok()
                .and_then(|s| s.parse().ok()),
            payload,
        }
    }

    /// Whether this run is a pull request from a fork into a public repository.
    ///
    /// Such runs cannot mint Actions OIDC tokens, so they need the public
    /// claim flow instead.
    #[must_use]
    pub fn is_oss_pull_request(&self) -> bool {
        if self.event_name != "pull_request" {
            return false;
        }
        let Some(repository) = &self.payload.repository else {
            return false;
        };
        if repository.private != Some(false) {
            return false;
        }
        let Some(pull_request) = &self.payload.pull_request else {
            return false;
        };

        let head = side_full_name(pull_request.head.as_ref());
        let base = side_full_name(pull_request.base.as_ref()).or(repository.full_name.as_deref());
        head != base
    }
}

fn side_full_name(side: Option<&PullRequestRef>) -> Option<&str> {
    side.and_then(|s| s.repo.as_ref())
        .and_then(|r| r.full_name.as_deref())
}
