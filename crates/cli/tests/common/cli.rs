//! CLI command execution helpers with automatic timing
//!
//! Wraps the `af` binary built for this test run. Every command gets its
//! own data directory through `AUTOFILE_HOME`, so tests never touch the
//! user's real configuration.

#![allow(dead_code)]

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

/// CLI command builder with timing
pub struct AfCommand {
    home: PathBuf,
    working_dir: Option<PathBuf>,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl AfCommand {
    /// Create a command using `home` as the data directory
    pub fn new(home: impl AsRef<Path>) -> Self {
        Self {
            home: home.as_ref().to_path_buf(),
            working_dir: None,
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    /// Add command arguments
    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Set environment variable
    pub fn env(&mut self, key: &str, value: &str) -> &mut Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Run from `dir` instead of the test's working directory
    pub fn current_dir(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Execute command and return result with timing
    pub fn execute(&self) -> Result<CommandResult> {
        let start = Instant::now();

        let mut command = Command::new(env!("CARGO_BIN_EXE_af"));
        command
            .args(&self.args)
            .env("AUTOFILE_HOME", &self.home)
            .envs(&self.env);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let output = command.output().context("Failed to execute command")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }

    /// Execute and assert success
    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }

        Ok(result)
    }

    /// Execute and expect failure
    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }

        Ok(result)
    }
}

/// Command execution result with timing
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command succeeded
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Check if stdout contains text
    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    /// Check if stderr contains text
    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }

    /// Short id printed in parentheses, e.g. "(1a2b3c4d)"
    pub fn parse_short_id(&self) -> Option<String> {
        self.stdout.lines().find_map(extract_short_id)
    }
}

/// Extract the first parenthesised 8-hex-digit id from a line
pub fn extract_short_id(line: &str) -> Option<String> {
    let start = line.find('(')? + 1;
    let candidate = line.get(start..start + 8)?;
    candidate
        .chars()
        .all(|c| c.is_ascii_hexdigit())
        .then(|| candidate.to_string())
}

/// Macro for convenient command construction
///
/// Usage:
/// ```ignore
/// af!(home, "folder", "list").assert_success()?;
/// ```
#[macro_export]
macro_rules! af {
    ($home:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::cli::AfCommand::new($home);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}
