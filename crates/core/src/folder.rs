//! Watched folder definitions

use crate::id::FolderId;
use crate::rule::{named_enum, RuleSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Canonical filesystem event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    Created,
    Changed,
    Deleted,
    Renamed,
}

named_enum!(EventKind {
    Created,
    Changed,
    Deleted,
    Renamed,
});

/// Lifecycle state of one watched folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FolderStatus {
    #[default]
    Stopped,
    Running,
    Error,
}

named_enum!(FolderStatus {
    Stopped,
    Running,
    Error,
});

fn default_filter() -> String {
    "*".to_string()
}

fn default_events() -> BTreeSet<EventKind> {
    [EventKind::Created, EventKind::Renamed].into_iter().collect()
}

/// A directory under observation together with its rules
///
/// `status` and `last_error` are runtime-only and always come back as
/// `Stopped`/`None` after a load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedFolder {
    #[serde(default)]
    pub id: FolderId,

    /// Display name (defaults to the directory name)
    #[serde(default)]
    pub name: String,

    pub path: PathBuf,

    /// Inclusion glob matched against file names
    #[serde(default = "default_filter")]
    pub filter: String,

    #[serde(default)]
    pub include_subdirectories: bool,

    #[serde(default = "default_events")]
    pub events: BTreeSet<EventKind>,

    /// Globs or literal names matched case-insensitively against file names
    #[serde(default)]
    pub exclusions: Vec<String>,

    /// Quiet period before a new file is processed; zero dispatches immediately
    #[serde(default)]
    pub settle_ms: u64,

    #[serde(default)]
    pub rules: RuleSet,

    #[serde(skip)]
    pub status: FolderStatus,

    #[serde(skip)]
    pub last_error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub processed_count: u64,
}

impl WatchedFolder {
    /// Create a folder definition with defaults: every file, top level only,
    /// Created and Renamed events, no settle time, no rules
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self {
            id: FolderId::new(),
            name,
            path,
            filter: default_filter(),
            include_subdirectories: false,
            events: default_events(),
            exclusions: Vec::new(),
            settle_ms: 0,
            rules: RuleSet::new(),
            status: FolderStatus::Stopped,
            last_error: None,
            last_event_at: None,
            processed_count: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn recursive(mut self, yes: bool) -> Self {
        self.include_subdirectories = yes;
        self
    }

    pub fn with_events(mut self, events: impl IntoIterator<Item = EventKind>) -> Self {
        self.events = events.into_iter().collect();
        self
    }

    pub fn with_exclusions<S: Into<String>>(mut self, patterns: impl IntoIterator<Item = S>) -> Self {
        self.exclusions = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle_ms = settle.as_millis() as u64;
        self
    }

    pub fn with_rules(mut self, rules: impl Into<RuleSet>) -> Self {
        self.rules = rules.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.path
    }

    pub fn settle_time(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Whether events of `kind` are monitored
    pub fn monitors(&self, kind: EventKind) -> bool {
        self.events.contains(&kind)
    }

    pub fn is_running(&self) -> bool {
        self.status == FolderStatus::Running
    }

    /// Reset runtime state, as after a load
    pub fn reset_runtime(&mut self) {
        self.status = FolderStatus::Stopped;
        self.last_error = None;
    }
}
