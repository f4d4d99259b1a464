//! Folder-level inclusion filter

use crate::exclude::ExclusionRules;
use af_core::WatchedFolder;
use anyhow::{Context, Result};
use globset::{Glob, GlobBuilder, GlobMatcher};
use std::path::Path;

/// Case-insensitive glob over a file's name
///
/// `""`, `"*"` and `"*.*"` accept every file, including names without a dot.
#[derive(Debug, Clone)]
pub struct InclusionFilter {
    matcher: Option<GlobMatcher>,
}

impl InclusionFilter {
    pub fn new(pattern: &str) -> Result<Self, globset::Error> {
        let pattern = pattern.trim();
        if matches!(pattern, "" | "*" | "*.*") {
            return Ok(Self::all());
        }

        let glob: Glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .literal_separator(true)
            .build()?;
        Ok(Self {
            matcher: Some(glob.compile_matcher()),
        })
    }

    /// Filter that accepts every file
    pub fn all() -> Self {
        Self { matcher: None }
    }

    pub fn matches(&self, path: &Path) -> bool {
        let Some(matcher) = &self.matcher else {
            return true;
        };
        path.file_name().is_some_and(|name| matcher.is_match(name))
    }
}

impl Default for InclusionFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// A folder's inclusion filter and exclusions, compiled together
#[derive(Debug, Clone, Default)]
pub struct FolderPatterns {
    pub include: InclusionFilter,
    pub exclude: ExclusionRules,
}

impl FolderPatterns {
    pub fn from_folder(folder: &WatchedFolder) -> Result<Self> {
        let include = InclusionFilter::new(&folder.filter)
            .with_context(|| format!("Invalid filter '{}'", folder.filter))?;
        let exclude = ExclusionRules::new(&folder.exclusions)?;
        Ok(Self { include, exclude })
    }

    /// Passes the filter and matches no exclusion
    pub fn admits(&self, path: &Path) -> bool {
        self.include.matches(path) && !self.exclude.is_excluded(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards_match_everything() {
        for pattern in ["", "*", "*.*", "  *  "] {
            let filter = InclusionFilter::new(pattern).unwrap();
            assert!(filter.matches(Path::new("/in/Makefile")));
            assert!(filter.matches(Path::new("/in/a.b.c")));
        }
    }

    #[test]
    fn test_extension_glob_ignores_case() {
        let filter = InclusionFilter::new("*.pdf").unwrap();
        assert!(filter.matches(Path::new("/in/report.pdf")));
        assert!(filter.matches(Path::new("/in/REPORT.PDF")));
        assert!(!filter.matches(Path::new("/in/report.pdf.txt")));
    }

    #[test]
    fn test_only_file_name_is_matched() {
        let filter = InclusionFilter::new("inv_*").unwrap();
        assert!(filter.matches(Path::new("/data/sub/inv_01.csv")));
        assert!(!filter.matches(Path::new("/inv_dir/other.csv")));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(InclusionFilter::new("[unclosed").is_err());
    }

    #[test]
    fn test_folder_patterns() {
        let folder = WatchedFolder::new("/in")
            .with_filter("*.pdf")
            .with_exclusions(["draft_*"]);
        let patterns = FolderPatterns::from_folder(&folder).unwrap();

        assert!(patterns.admits(Path::new("/in/final.pdf")));
        assert!(!patterns.admits(Path::new("/in/draft_1.pdf")));
        assert!(!patterns.admits(Path::new("/in/final.docx")));
    }
}
