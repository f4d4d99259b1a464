//! Enumeration of files already present in a folder

use crate::filter::FolderPatterns;
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use tracing::{debug, warn};

/// Every file under `root` admitted by `patterns`, in sorted order
///
/// Only the top level is visited unless `recursive`. Symlinks are not
/// followed. Unreadable entries are logged and skipped.
pub fn enumerate_files(root: &Path, recursive: bool, patterns: &FolderPatterns) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("{} does not exist or is not a directory", root.display());
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {:?}: {}", root, e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        if patterns.admits(entry.path()) {
            files.push(entry.into_path());
        }
    }

    debug!("Found {} candidate files under {:?}", files.len(), root);
    Ok(files)
}
