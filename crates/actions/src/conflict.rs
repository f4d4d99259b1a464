//! Conflict policy resolution

use crate::fs::FileSystem;
use af_core::ConflictPolicy;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// What to do with a candidate destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Write to this path (possibly replacing what is there)
    Proceed(PathBuf),
    /// Leave everything as it is
    Skip(String),
}

/// Apply `policy` to `target`, which `source` is about to be written to
pub fn resolve(
    fs: &dyn FileSystem,
    policy: ConflictPolicy,
    source: &Path,
    target: &Path,
    attempt_limit: u32,
) -> Result<Resolution> {
    if !fs.exists(target) {
        return Ok(Resolution::Proceed(target.to_path_buf()));
    }

    match policy {
        ConflictPolicy::Skip => Ok(Resolution::Skip(format!(
            "{} already exists",
            target.display()
        ))),
        ConflictPolicy::Overwrite => Ok(Resolution::Proceed(target.to_path_buf())),
        ConflictPolicy::OverwriteIfNewer => {
            let source_time = fs
                .metadata(source)
                .with_context(|| format!("Failed to read metadata of {}", source.display()))?
                .modified;
            let target_time = fs.metadata(target).ok().and_then(|m| m.modified);

            match (source_time, target_time) {
                (Some(s), Some(t)) if s > t => Ok(Resolution::Proceed(target.to_path_buf())),
                _ => Ok(Resolution::Skip(format!(
                    "{} is not older than the source",
                    target.display()
                ))),
            }
        }
        ConflictPolicy::Rename => {
            for n in 1..=attempt_limit {
                let candidate = numbered_name(target, n);
                if !fs.exists(&candidate) {
                    return Ok(Resolution::Proceed(candidate));
                }
            }
            bail!(
                "No free name for {} after {} attempts",
                target.display(),
                attempt_limit
            )
        }
    }
}

/// `dir/name.ext` → `dir/name (n).ext`
pub fn numbered_name(target: &Path, n: u32) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match target.extension() {
        Some(ext) => format!("{} ({}).{}", stem, n, ext.to_string_lossy()),
        None => format!("{} ({})", stem, n),
    };
    target.with_file_name(name)
}
