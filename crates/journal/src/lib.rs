//! Execution history and persisted folder configuration
//!
//! This crate provides:
//! - A bounded, concurrent ledger of rule executions
//! - The JSON document holding every watched folder and its rules
//! - Single-folder export/import

pub mod history;
pub mod store;

// Re-exports
pub use history::{ExecutionHistoryEntry, HistoryLedger, DEFAULT_HISTORY_CAPACITY};
pub use store::{atomic_write, export_folder, import_folder, ConfigStore};
