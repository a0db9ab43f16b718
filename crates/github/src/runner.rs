//! Runner command channel.
//!
//! GitHub Actions steps talk back to the runner through files named by
//! `GITHUB_PATH` / `GITHUB_ENV` and through `::command::` lines on stdout.
//! Everything that touches that ambient state goes through [`RunnerCommands`]
//! so the setup logic can be exercised against [`MemoryRunner`].

use setup_depot_core::{Error, Result};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Side channels a setup step uses to affect later steps of the job.
pub trait RunnerCommands: Send + Sync {
    /// Read an environment variable. Empty values read as unset.
    fn var(&self, name: &str) -> Option<String>;

    /// Prepend `dir` to `PATH` for subsequent steps.
    fn add_path(&self, dir: &Path) -> Result<()>;

    /// Export an environment variable to subsequent steps.
    fn export_variable(&self, name: &str, value: &str) -> Result<()>;

    /// Register a value that must be masked in all job logs.
    fn set_secret(&self, value: &str) -> Result<()>;

    /// Emit an error annotation.
    fn error(&self, message: &str) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Escape a workflow command value (`%`, `\r`, `\n`).
#[must_use]
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// [`RunnerCommands`] for a real GitHub Actions runner.
pub struct ActionsRunner {
    path_file: Option<PathBuf>,
    env_file: Option<PathBuf>,
    /// Values exported during this process, visible through `var`.
    exported: Mutex<HashMap<String, String>>,
    stdout: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ActionsRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionsRunner")
            .field("path_file", &self.path_file)
            .field("env_file", &self.env_file)
            .finish_non_exhaustive()
    }
}

impl ActionsRunner {
    /// Create a runner using the command files announced by the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(
            file_from_env("GITHUB_PATH"),
            file_from_env("GITHUB_ENV"),
            Box::new(std::io::stdout()),
        )
    }

    /// Create a runner with explicit command files and stdout sink.
    #[must_use]
    pub fn new(
        path_file: Option<PathBuf>,
        env_file: Option<PathBuf>,
        stdout: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            path_file,
            env_file,
            exported: Mutex::new(HashMap::new()),
            stdout: Mutex::new(stdout),
        }
    }

    fn issue(&self, command: &str, value: &str) -> Result<()> {
        let mut out = lock(&self.stdout);
        writeln!(out, "::{command}::{}", escape_data(value))
            .and_then(|()| out.flush())
            .map_err(|e| Error::runner(format!("Failed to issue {command} command: {e}")))
    }

    fn append(file: &Path, contents: &str) -> Result<()> {
        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)
            .map_err(|e| {
                Error::runner(format!("Failed to open {}: {e}", file.display()))
            })?;
        handle
            .write_all(contents.as_bytes())
            .map_err(|e| Error::runner(format!("Failed to write {}: {e}", file.display())))
    }
}

fn file_from_env(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Format a `GITHUB_ENV` entry using the heredoc syntax.
pub fn env_file_entry(name: &str, value: &str, delimiter: &str) -> Result<String> {
    if name.contains(delimiter) {
        return Err(Error::runner(format!(
            "Unexpected input: name should not contain the delimiter \"{delimiter}\""
        )));
    }
    if value.contains(delimiter) {
        return Err(Error::runner(format!(
            "Unexpected input: value should not contain the delimiter \"{delimiter}\""
        )));
    }
    Ok(format!("{name}<<{delimiter}\n{value}\n{delimiter}\n"))
}

impl RunnerCommands for ActionsRunner {
    fn var(&self, name: &str) -> Option<String> {
        if let Some(value) = lock(&self.exported).get(name) {
            return Some(value.clone());
        }
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }

    fn add_path(&self, dir: &Path) -> Result<()> {
        match &self.path_file {
            Some(file) => Self::append(file, &format!("{}\n", dir.display()))?,
            None => warn!(?dir, "GITHUB_PATH is not set; PATH only updated for this process"),
        }

        let current = self.var("PATH").unwrap_or_default();
        let separator = if cfg!(windows) { ';' } else { ':' };
        let updated = if current.is_empty() {
            dir.display().to_string()
        } else {
            format!("{}{separator}{current}", dir.display())
        };
        lock(&self.exported).insert("PATH".to_string(), updated);
        debug!(?dir, "Added directory to PATH");
        Ok(())
    }

    fn export_variable(&self, name: &str, value: &str) -> Result<()> {
        match &self.env_file {
            Some(file) => {
                let delimiter = format!("ghadelimiter_{}", uuid::Uuid::new_v4());
                Self::append(file, &env_file_entry(name, value, &delimiter)?)?;
            }
            None => warn!(name, "GITHUB_ENV is not set; variable only visible to this process"),
        }
        lock(&self.exported).insert(name.to_string(), value.to_string());
        debug!(name, "Exported variable");
        Ok(())
    }

    fn set_secret(&self, value: &str) -> Result<()> {
        self.issue("add-mask", value)
    }

    fn error(&self, message: &str) -> Result<()> {
        self.issue("error", message)
    }
}

/// In-memory [`RunnerCommands`] that records every call.
///
/// Useful for dry runs and for driving the setup flow in tests without
/// touching process state.
#[derive(Debug, Default)]
pub struct MemoryRunner {
    env: Mutex<HashMap<String, String>>,
    paths: Mutex<Vec<PathBuf>>,
    exported: Mutex<Vec<(String, String)>>,
    secrets: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl MemoryRunner {
    /// Create an empty runner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an environment variable.
    #[must_use]
    pub fn with_var(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        lock(&self.env).insert(name.into(), value.into());
        self
    }

    /// Directories added to `PATH`, in call order.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        lock(&self.paths).clone()
    }

    /// Last exported value of `name`, if any.
    #[must_use]
    pub fn exported(&self, name: &str) -> Option<String> {
        lock(&self.exported)
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    /// Values registered as secrets.
    #[must_use]
    pub fn secrets(&self) -> Vec<String> {
        lock(&self.secrets).clone()
    }

    /// Error annotations emitted.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        lock(&self.errors).clone()
    }
}

impl RunnerCommands for MemoryRunner {
    fn var(&self, name: &str) -> Option<String> {
        if let Some(value) = self.exported(name) {
            return Some(value);
        }
        lock(&self.env).get(name).filter(|v| !v.is_empty()).cloned()
    }

    fn add_path(&self, dir: &Path) -> Result<()> {
        lock(&self.paths).push(dir.to_path_buf());
        Ok(())
    }

    fn export_variable(&self, name: &str, value: &str) -> Result<()> {
        lock(&self.exported).push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn set_secret(&self, value: &str) -> Result<()> {
        lock(&self.secrets).push(value.to_string());
        Ok(())
    }

    fn error(&self, message: &str) -> Result<()> {
        lock(&self.errors).push(message.to_string());
        Ok(())
    }
}
