//! Error types shared by every setup-depot crate.

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Main error type for setup-depot operations.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Invalid input or environment configuration.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(setup_depot::config))]
    Configuration {
        /// What is wrong with the configuration.
        message: String,
    },

    /// The subscription endpoint explicitly rejected this repository.
    #[error("Subscription is not valid. Reach out to support@stepsecurity.io")]
    #[diagnostic(code(setup_depot::subscription))]
    SubscriptionRejected {
        /// HTTP status returned by the endpoint.
        status: u16,
    },

    /// The release endpoint answered with an error of its own.
    ///
    /// The message is displayed exactly as the endpoint sent it.
    #[error("{message}")]
    #[diagnostic(code(setup_depot::release))]
    ReleaseRejected {
        /// Message supplied by the release endpoint.
        message: String,
    },

    /// Release resolution failed before a response could be interpreted.
    #[error("Failed to resolve release: {message}")]
    #[diagnostic(code(setup_depot::resolution))]
    Resolution {
        /// Error message.
        message: String,
    },

    /// Downloading the release artifact failed.
    #[error("Failed to download {url}: {message}")]
    #[diagnostic(code(setup_depot::download))]
    Download {
        /// Artifact URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// Extracting the release archive failed.
    #[error("Failed to extract {}: {message}", archive.display())]
    #[diagnostic(
        code(setup_depot::extract),
        help("The downloaded artifact is expected to be a gzip-compressed tar archive")
    )]
    Extraction {
        /// Archive that failed to extract.
        archive: Box<Path>,
        /// Error message.
        message: String,
    },

    /// Tool cache operation failed.
    #[error("Tool cache error: {message}")]
    #[diagnostic(code(setup_depot::cache))]
    Cache {
        /// Error message.
        message: String,
    },

    /// A token exchange step failed.
    #[error("Authentication failed: {message}")]
    #[diagnostic(code(setup_depot::auth))]
    Auth {
        /// Error message.
        message: String,
    },

    /// Writing a runner command or environment file failed.
    #[error("Runner command failed: {message}")]
    #[diagnostic(code(setup_depot::runner))]
    Runner {
        /// Error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(setup_depot::io))]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    #[diagnostic(code(setup_depot::json))]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an error carrying the release endpoint's own message.
    #[must_use]
    pub fn release_rejected(message: impl Into<String>) -> Self {
        Self::ReleaseRejected {
            message: message.into(),
        }
    }

    /// Create a resolution error.
    #[must_use]
    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution {
            message: message.into(),
        }
    }

    /// Create a download error.
    #[must_use]
    pub fn download(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an extraction error.
    #[must_use]
    pub fn extraction(archive: &Path, message: impl Into<String>) -> Self {
        Self::Extraction {
            archive: archive.into(),
            message: message.into(),
        }
    }

    /// Create a tool cache error.
    #[must_use]
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create an authentication error.
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a runner command error.
    #[must_use]
    pub fn runner(message: impl Into<String>) -> Self {
        Self::Runner {
            message: message.into(),
        }
    }
}

/// Result type alias for setup-depot operations.
pub type Result<T> = std::result::Result<T, Error>;
