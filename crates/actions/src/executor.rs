//! Turns a rule's `Action` into filesystem work

use crate::conflict::{self, Resolution};
use crate::fs::{FileSystem, StdFileSystem};
use crate::launcher::{split_arguments, ProcessLauncher, TokioLauncher};
use af_core::template::{expand_destination, expand_rename, RenameContext};
use af_core::{Action, ActionKind};
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const DEFAULT_RENAME_ATTEMPT_LIMIT: u32 = 9_999;
const ARCHIVE_EXTENSION: &str = "zip";

/// Result of executing one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action ran; `destination` is where the file ended up, if anywhere
    Completed { destination: Option<PathBuf> },
    /// The action deliberately did nothing
    Skipped { reason: String },
    Failed { error: String },
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Completed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ActionOutcome::Skipped { .. })
    }

    pub fn destination(&self) -> Option<&Path> {
        match self {
            ActionOutcome::Completed { destination } => destination.as_deref(),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ActionOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Executes actions against the filesystem
///
/// Cheap to clone; collaborators are shared.
#[derive(Clone)]
pub struct ActionExecutor {
    fs: Arc<dyn FileSystem>,
    launcher: Arc<dyn ProcessLauncher>,
    rename_attempt_limit: u32,
}

impl Default for ActionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("rename_attempt_limit", &self.rename_attempt_limit)
            .finish_non_exhaustive()
    }
}

impl ActionExecutor {
    /// Executor on the real filesystem and `tokio::process`
    pub fn new() -> Self {
        Self::with_collaborators(Arc::new(StdFileSystem), Arc::new(TokioLauncher))
    }

    pub fn with_collaborators(fs: Arc<dyn FileSystem>, launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self {
            fs,
            launcher,
            rename_attempt_limit: DEFAULT_RENAME_ATTEMPT_LIMIT,
        }
    }

    /// Highest `(n)` tried by the `Rename` conflict policy
    pub fn rename_attempt_limit(mut self, limit: u32) -> Self {
        self.rename_attempt_limit = limit.max(1);
        self
    }

    /// Run `action` against `source`
    ///
    /// Never panics or returns an error; failures become `ActionOutcome::Failed`.
    pub async fn execute(&self, action: &Action, source: &Path) -> ActionOutcome {
        let result = match action.kind {
            ActionKind::RunScript => self.run_script(action, source).await,
            ActionKind::Notify => Ok(ActionOutcome::Completed { destination: None }),
            ActionKind::AddTag => {
                debug!(path = %source.display(), "AddTag has no tagging backend, nothing to do");
                Ok(ActionOutcome::Completed { destination: None })
            }
            _ => {
                let fs = Arc::clone(&self.fs);
                let action = action.clone();
                let source = source.to_path_buf();
                let limit = self.rename_attempt_limit;
                tokio::task::spawn_blocking(move || {
                    apply_file_action(fs.as_ref(), &action, &source, limit, Local::now())
                })
                .await
                .unwrap_or_else(|e| Err(anyhow!("Action task failed: {}", e)))
            }
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(path = %source.display(), action = %action.kind, "Action failed: {:#}", e);
                ActionOutcome::Failed {
                    error: format!("{:#}", e),
                }
            }
        }
    }

    /// Where `action` would put `source`, without touching anything
    ///
    /// Conflict policies are not applied. `None` for actions without a
    /// destination.
    pub fn preview(&self, action: &Action, source: &Path) -> Option<PathBuf> {
        let now = Local::now();
        match action.kind {
            ActionKind::Move | ActionKind::Copy | ActionKind::CreateSymlink => {
                let name = source.file_name()?;
                Some(expand_destination(&action.destination, source, now).join(name))
            }
            ActionKind::Rename => {
                let size = self.fs.metadata(source).map(|m| m.len).unwrap_or(0);
                let name = expand_rename(&action.rename_pattern, source, &RenameContext::new(size));
                (!name.is_empty()).then(|| sibling(source, &name))
            }
            ActionKind::Compress => Some(archive_path(self.fs.as_ref(), action, source, now)),
            ActionKind::Delete | ActionKind::RunScript | ActionKind::Notify | ActionKind::AddTag => None,
        }
    }

    async fn run_script(&self, action: &Action, source: &Path) -> Result<ActionOutcome> {
        let script = action
            .script_path
            .as_deref()
            .ok_or_else(|| anyhow!("RunScript action has no script path"))?;

        let quoted = format!("\"{}\"", source.display());
        let arguments = action
            .script_arguments
            .as_deref()
            .unwrap_or("{file}")
            .replace("{file}", &quoted);
        let args = split_arguments(&arguments);

        let code = self
            .launcher
            .run(script, &args)
            .await
            .with_context(|| format!("Failed to start {}", script.display()))?;

        if code != Some(0) {
            warn!(
                script = %script.display(),
                path = %source.display(),
                "Script exited with {:?}",
                code
            );
        }
        Ok(ActionOutcome::Completed { destination: None })
    }
}

/// Filesystem-bound actions; runs on the blocking pool
fn apply_file_action(
    fs: &dyn FileSystem,
    action: &Action,
    source: &Path,
    limit: u32,
    now: DateTime<Local>,
) -> Result<ActionOutcome> {
    match action.kind {
        ActionKind::Move | ActionKind::Copy => {
            let name = file_name(source)?;
            let dir = expand_destination(&action.destination, source, now);
            fs.create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let target = dir.join(name);

            if same_location(fs, source, &target) {
                return Ok(ActionOutcome::Skipped {
                    reason: format!("{} is already at its destination", source.display()),
                });
            }

            let target = match conflict::resolve(fs, action.conflict, source, &target, limit)? {
                Resolution::Proceed(path) => path,
                Resolution::Skip(reason) => return Ok(ActionOutcome::Skipped { reason }),
            };

            if action.kind == ActionKind::Move {
                fs.move_file(source, &target)
                    .with_context(|| format!("Failed to move to {}", target.display()))?;
            } else {
                fs.copy_file(source, &target)
                    .with_context(|| format!("Failed to copy to {}", target.display()))?;
            }
            Ok(ActionOutcome::Completed {
                destination: Some(target),
            })
        }

        ActionKind::Delete => {
            fs.remove_file(source)
                .with_context(|| format!("Failed to delete {}", source.display()))?;
            Ok(ActionOutcome::Completed { destination: None })
        }

        ActionKind::Rename => {
            let size = fs
                .metadata(source)
                .with_context(|| format!("Failed to read metadata of {}", source.display()))?
                .len;
            let name = expand_rename(&action.rename_pattern, source, &RenameContext::new(size));
            if name.is_empty() {
                bail!("Rename pattern '{}' produced an empty name", action.rename_pattern);
            }
            if name.contains(['/', '\\']) {
                bail!("Rename pattern produced '{}', which is not a file name", name);
            }

            let target = sibling(source, &name);
            if target == source {
                return Ok(ActionOutcome::Skipped {
                    reason: format!("{} already has that name", source.display()),
                });
            }

            let target = match conflict::resolve(fs, action.conflict, source, &target, limit)? {
                Resolution::Proceed(path) => path,
                Resolution::Skip(reason) => return Ok(ActionOutcome::Skipped { reason }),
            };
            fs.move_file(source, &target)
                .with_context(|| format!("Failed to rename to {}", target.display()))?;
            Ok(ActionOutcome::Completed {
                destination: Some(target),
            })
        }

        ActionKind::Compress => {
            let archive = archive_path(fs, action, source, now);
            if let Some(parent) = archive.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs.create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }

            let archive = match conflict::resolve(fs, action.conflict, source, &archive, limit)? {
                Resolution::Proceed(path) => path,
                Resolution::Skip(reason) => return Ok(ActionOutcome::Skipped { reason }),
            };
            fs.create_archive(source, &archive)
                .with_context(|| format!("Failed to write archive {}", archive.display()))?;
            Ok(ActionOutcome::Completed {
                destination: Some(archive),
            })
        }

        ActionKind::CreateSymlink => {
            let name = file_name(source)?;
            let dir = expand_destination(&action.destination, source, now);
            fs.create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let pointee = fs
                .canonicalize(source)
                .with_context(|| format!("Failed to resolve {}", source.display()))?;

            let link = match conflict::resolve(fs, action.conflict, source, &dir.join(name), limit)? {
                Resolution::Proceed(path) => path,
                Resolution::Skip(reason) => return Ok(ActionOutcome::Skipped { reason }),
            };
            if fs.exists(&link) {
                fs.remove_file(&link)
                    .with_context(|| format!("Failed to replace {}", link.display()))?;
            }
            fs.create_symlink(&pointee, &link)
                .with_context(|| format!("Failed to create link {}", link.display()))?;
            Ok(ActionOutcome::Completed {
                destination: Some(link),
            })
        }

        ActionKind::RunScript | ActionKind::Notify | ActionKind::AddTag => {
            bail!("{} is not a filesystem action", action.kind)
        }
    }
}

fn file_name(source: &Path) -> Result<&std::ffi::OsStr> {
    source
        .file_name()
        .ok_or_else(|| anyhow!("{} has no file name", source.display()))
}

fn sibling(source: &Path, name: &str) -> PathBuf {
    match source.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// Archive location for a `Compress` action
///
/// Empty template: next to the source. Template naming a directory: inside
/// it. Otherwise the template is the archive path, with `.zip` added when it
/// has no extension.
fn archive_path(fs: &dyn FileSystem, action: &Action, source: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());
    let default_name = format!("{}.{}", stem, ARCHIVE_EXTENSION);

    let template = action.destination.trim();
    if template.is_empty() {
        return sibling(source, &default_name);
    }

    let expanded = expand_destination(template, source, now);
    if template.ends_with(['/', '\\']) || fs.is_dir(&expanded) {
        return expanded.join(default_name);
    }
    if expanded.extension().is_none() {
        return expanded.with_extension(ARCHIVE_EXTENSION);
    }
    expanded
}

fn same_location(fs: &dyn FileSystem, source: &Path, target: &Path) -> bool {
    if source == target {
        return true;
    }
    match (fs.canonicalize(source), fs.canonicalize(target)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
