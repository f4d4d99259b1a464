//! Action execution for matched rules
//!
//! This crate provides:
//! - The filesystem-operations collaborator (`FileSystem`, `StdFileSystem`)
//! - The process launcher used by `RunScript` (`ProcessLauncher`, `TokioLauncher`)
//! - Conflict policy resolution and numbered unique names
//! - `ActionExecutor`, which turns an `Action` into an `ActionOutcome`

pub mod conflict;
pub mod executor;
pub mod fs;
pub mod launcher;

// Re-exports
pub use executor::{ActionExecutor, ActionOutcome};
pub use fs::{FileMeta, FileSystem, StdFileSystem};
pub use launcher::{split_arguments, ProcessLauncher, TokioLauncher};
