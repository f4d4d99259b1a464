//! File system watching for watched folders
//!
//! This crate provides:
//! - One notify subscription per folder, translated to canonical events
//! - Inclusion filters and gitignore-style exclusion patterns
//! - Per-key settle timers that coalesce bursts of events
//! - Enumeration of files already present in a folder

pub mod debounce;
pub mod exclude;
pub mod filter;
pub mod monitor;
pub mod scan;

// Re-exports
pub use debounce::{ScheduleOutcome, SettleScheduler, Ticket};
pub use exclude::{ExclusionRules, DEFAULT_EXCLUSIONS};
pub use filter::{FolderPatterns, InclusionFilter};
pub use monitor::{EventMonitor, MonitorMessage, WatchEvent};
pub use scan::enumerate_files;
