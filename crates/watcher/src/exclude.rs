//! Exclusion patterns for watched folders
//!
//! Patterns use gitignore glob syntax and are matched case-insensitively
//! against the file name only, never the directory part.

use anyhow::{Context, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// System files, editor swap files and partial downloads
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
    "*.tmp",
    "*.part",
    "*.crdownload",
    "~$*",
    "*.swp",
];

/// Compiled set of exclusion globs
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    matcher: Gitignore,
    patterns: Vec<String>,
}

impl ExclusionRules {
    /// Compile `patterns`; blank entries are skipped
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        // Rooted at "" so file names match without a directory prefix
        let mut builder = GitignoreBuilder::new("");
        builder.case_insensitive(true)?;

        let mut kept = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            builder
                .add_line(None, pattern)
                .with_context(|| format!("Invalid exclusion pattern '{}'", pattern))?;
            kept.push(pattern.to_string());
        }

        Ok(Self {
            matcher: builder.build()?,
            patterns: kept,
        })
    }

    /// Rules that exclude nothing
    pub fn empty() -> Self {
        Self {
            matcher: Gitignore::empty(),
            patterns: Vec::new(),
        }
    }

    /// Pattern list for new folders
    pub fn defaults() -> Vec<String> {
        DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect()
    }

    /// Does any pattern match the file name of `path`?
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let Some(name) = path.file_name() else {
            return false;
        };
        self.matcher.matched(Path::new(name), false).is_ignore()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self::empty()
    }
}
