//! Command-line interface.
//!
//! Every input can also be supplied through the variable the Actions runner
//! sets for it (`INPUT_VERSION`, `INPUT_OIDC`), so the binary runs unchanged
//! as an action entrypoint.

use clap::Parser;
use setup_depot_core::Error;
use setup_depot_core::tools::{Platform, default_cache_root};
use setup_depot_github::RunnerCommands;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::{
    DEFAULT_AUTH_URL, DEFAULT_PUBLIC_OIDC_URL, DEFAULT_SUBSCRIPTION_URL, Endpoints, SetupConfig,
};
use crate::pipeline::report_failure;
use crate::tracing::{LogLevel, TracingConfig, TracingFormat};
use setup_depot_tools_depot::DEFAULT_RELEASE_URL;

/// Successful run.
pub const EXIT_OK: i32 = 0;
/// Subscription rejected, or resolution or installation failed.
pub const EXIT_FAILURE: i32 = 1;

/// Install the Depot CLI and optionally exchange an OIDC token for a Depot token.
#[derive(Parser, Debug, Clone)]
#[command(name = "setup-depot")]
#[command(long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// CLI version to install.
    #[arg(long, env = "INPUT_VERSION", default_value = "latest")]
    pub version: String,

    /// Exchange an OIDC token for a Depot token.
    #[arg(
        long,
        env = "INPUT_OIDC",
        default_value = "false",
        action = clap::ArgAction::Set,
        value_parser = parse_actions_bool
    )]
    pub oidc: bool,

    /// Logging verbosity level.
    #[arg(
        long,
        env = "SETUP_DEPOT_LOG_LEVEL",
        default_value = "info",
        value_enum
    )]
    pub log_level: LogLevel,

    /// Log output format.
    #[arg(
        long,
        env = "SETUP_DEPOT_LOG_FORMAT",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    /// Tool cache root.
    #[arg(long, env = "RUNNER_TOOL_CACHE", hide = true)]
    pub tool_cache: Option<PathBuf>,

    /// Scratch directory for downloads.
    #[arg(long, env = "RUNNER_TEMP", hide = true)]
    pub temp_dir: Option<PathBuf>,

    /// Subscription service base URL.
    #[arg(
        long,
        env = "SETUP_DEPOT_SUBSCRIPTION_URL",
        default_value = DEFAULT_SUBSCRIPTION_URL,
        hide = true
    )]
    pub subscription_url: String,

    /// Release service base URL.
    #[arg(
        long,
        env = "SETUP_DEPOT_RELEASE_URL",
        default_value = DEFAULT_RELEASE_URL,
        hide = true
    )]
    pub release_url: String,

    /// Depot token exchange base URL.
    #[arg(
        long,
        env = "SETUP_DEPOT_AUTH_URL",
        default_value = DEFAULT_AUTH_URL,
        hide = true
    )]
    pub auth_url: String,

    /// Public OIDC provider base URL.
    #[arg(
        long,
        env = "SETUP_DEPOT_PUBLIC_OIDC_URL",
        default_value = DEFAULT_PUBLIC_OIDC_URL,
        hide = true
    )]
    pub public_oidc_url: String,
}

impl Cli {
    /// Parse `args`, turning invalid input into a failed run.
    ///
    /// On failure returns the exit code to use: invalid input is reported as
    /// a workflow error annotation and fails the run; `--help` prints and
    /// succeeds.
    pub fn parse_or_report<I, T>(args: I, runner: &dyn RunnerCommands) -> Result<Self, i32>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match Self::try_parse_from(args) {
            Ok(cli) => Ok(cli),
            Err(e) if !e.use_stderr() => {
                let _ = e.print();
                Err(EXIT_OK)
            }
            Err(e) => Err(report_failure(
                runner,
                &Error::configuration(e.to_string().trim_end()),
            )),
        }
    }

    /// Settings for the setup pipeline.
    #[must_use]
    pub fn setup_config(&self) -> SetupConfig {
        SetupConfig {
            version: self.version.trim().to_string(),
            oidc: self.oidc,
            platform: Platform::current(),
            tool_cache: self.tool_cache.clone().unwrap_or_else(default_cache_root),
            temp_dir: self.temp_dir.clone().unwrap_or_else(std::env::temp_dir),
            endpoints: Endpoints {
                subscription: self.subscription_url.clone(),
                release: self.release_url.clone(),
                auth: self.auth_url.clone(),
                public_oidc: self.public_oidc_url.clone(),
            },
        }
    }

    /// Logging settings.
    #[must_use]
    pub fn tracing_config(&self) -> TracingConfig {
        TracingConfig {
            format: self.log_format.clone(),
            level: self.log_level.clone().into(),
            ..Default::default()
        }
    }
}

/// Parse a boolean input using the YAML 1.2 core schema values Actions accepts.
///
/// An empty value reads as `false`, the same as an unset input.
pub fn parse_actions_bool(value: &str) -> Result<bool, String> {
    match value.trim() {
        "true" | "True" | "TRUE" => Ok(true),
        "false" | "False" | "FALSE" | "" => Ok(false),
        other => Err(format!(
            "Input does not meet YAML 1.2 \"Core Schema\" specification: {other}\n\
             Support boolean input list: `true | True | TRUE | false | False | FALSE`"
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use setup_depot_github::MemoryRunner;

    const INPUT_VARS: [&str; 4] = [
        "INPUT_VERSION",
        "INPUT_OIDC",
        "RUNNER_TOOL_CACHE",
        "RUNNER_TEMP",
    ];

    fn parse_clean(args: &[&str]) -> Cli {
        temp_env::with_vars_unset(INPUT_VARS, || {
            Cli::try_parse_from(args).unwrap()
        })
    }

    #[test]
    fn test_actions_bool_values() {
        for value in ["true", "True", "TRUE"] {
            assert_eq!(parse_actions_bool(value), Ok(true), "{value}");
        }
        for value in ["false", "False", "FALSE", ""] {
            assert_eq!(parse_actions_bool(value), Ok(false), "{value}");
        }
        for value in ["yes", "1", "tRuE", "on"] {
            assert!(parse_actions_bool(value).is_err(), "{value}");
        }
    }

    #[test]
    fn test_defaults() {
        let cli = parse_clean(&["setup-depot"]);
        assert_eq!(cli.version, "latest");
        assert!(!cli.oidc);
        assert_eq!(cli.release_url, "https://dl.depot.dev");

        let config = cli.setup_config();
        assert_eq!(config.endpoints, Endpoints::default());
        assert_eq!(config.tool_cache, default_cache_root());
    }

    #[test]
    fn test_flags() {
        let cli = parse_clean(&["setup-depot", "--version", "2.58.0", "--oidc", "True"]);
        assert_eq!(cli.version, "2.58.0");
        assert!(cli.oidc);
    }

    #[test]
    fn test_inputs_from_environment() {
        temp_env::with_vars(
            [
                ("INPUT_VERSION", Some("2.1.0")),
                ("INPUT_OIDC", Some("TRUE")),
                ("RUNNER_TOOL_CACHE", Some("/opt/hostedtoolcache")),
                ("RUNNER_TEMP", Some("/home/runner/work/_temp")),
            ],
            || {
                let config = Cli::try_parse_from(["setup-depot"]).unwrap().setup_config();
                assert_eq!(config.version, "2.1.0");
                assert!(config.oidc);
                assert_eq!(config.tool_cache, PathBuf::from("/opt/hostedtoolcache"));
                assert_eq!(config.temp_dir, PathBuf::from("/home/runner/work/_temp"));
            },
        );
    }

    #[test]
    fn test_invalid_input_fails_run_with_annotation() {
        temp_env::with_var("INPUT_OIDC", Some("yes"), || {
            let runner = MemoryRunner::new();
            let result = Cli::parse_or_report(["setup-depot"], &runner);

            assert_eq!(result.err(), Some(EXIT_FAILURE));
            let errors = runner.errors();
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("YAML 1.2"), "{}", errors[0]);
        });
    }

    #[test]
    fn test_help_is_not_a_failure() {
        let runner = MemoryRunner::new();
        let result = Cli::parse_or_report(["setup-depot", "--help"], &runner);

        assert_eq!(result.err(), Some(EXIT_OK));
        assert!(runner.errors().is_empty());
    }

    #[test]
    fn test_invalid_oidc_input_is_rejected() {
        temp_env::with_var("INPUT_OIDC", Some("yes"), || {
            assert!(Cli::try_parse_from(["setup-depot"]).is_err());
        });
    }
}
