//! Core types for the autofile engine
//!
//! This crate provides:
//! - Watched folder, rule, condition and action definitions (serde model)
//! - Condition evaluation against live file metadata
//! - Priority-ordered rule matching
//! - Destination and rename templates
//! - Engine error taxonomy and TOML settings

pub mod condition;
pub mod config;
pub mod error;
pub mod folder;
pub mod id;
pub mod matcher;
pub mod rule;
pub mod template;

// Re-exports
pub use condition::{EvalOptions, DEFAULT_CONTENT_READ_LIMIT};
pub use config::EngineSettings;
pub use error::{EngineError, ErrorCategory, Result};
pub use folder::{EventKind, FolderStatus, WatchedFolder};
pub use id::{FolderId, RuleId};
pub use matcher::RuleMatcher;
pub use rule::{
    Action, ActionKind, Condition, ConditionField, ConflictPolicy, MatchLogic, Operator, Rule,
    RuleSet,
};
