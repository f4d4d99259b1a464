//! External process launching for `RunScript` actions

use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::process::Stdio;

/// Starts an external program and waits for it to exit
#[async_trait]
pub trait ProcessLauncher: Send + Sync + 'static {
    /// Run `program` with `args`; returns the exit code (`None` if killed by a signal)
    ///
    /// Errors only when the program could not be started.
    async fn run(&self, program: &Path, args: &[String]) -> io::Result<Option<i32>>;
}

/// Launcher on `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLauncher;

#[async_trait]
impl ProcessLauncher for TokioLauncher {
    async fn run(&self, program: &Path, args: &[String]) -> io::Result<Option<i32>> {
        let status = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        Ok(status.code())
    }
}

/// Split an argument string on whitespace, keeping double-quoted runs together
///
/// Quotes are removed; there is no escape syntax.
pub fn split_arguments(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        args.push(current);
    }
    args
}
