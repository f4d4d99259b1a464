//! The file automation engine
//!
//! This crate provides:
//! - `WatchRegistry`, which owns every watched folder and its monitor
//! - Event dispatch: settle, match, execute, record
//! - Batch processing of files already present in a folder
//! - The engine event stream (`EngineEvent`)

pub mod batch;
pub mod events;
pub mod registry;

// Re-exports
pub use batch::{BatchProcessor, BatchProgress, FileDisposition, FileResult, ProcessingResult};
pub use events::EngineEvent;
pub use registry::WatchRegistry;
