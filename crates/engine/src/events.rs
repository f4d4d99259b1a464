//! Notifications raised by the engine

use af_core::{ActionKind, ErrorCategory, EventKind, FolderId, RuleId};
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Buffered events per subscriber before the oldest are dropped
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Raised for every accepted event, matched or not
    FileEventDetected {
        folder_id: FolderId,
        kind: EventKind,
        path: PathBuf,
        old_path: Option<PathBuf>,
    },
    /// A rule matched and its action ran (or was skipped, or failed)
    RuleExecuted {
        folder_id: FolderId,
        rule_id: RuleId,
        rule_name: String,
        path: PathBuf,
        destination: Option<PathBuf>,
        action: ActionKind,
        success: bool,
        error: Option<String>,
    },
    /// A component failed; `folder_id` is `None` for global failures
    ErrorOccurred {
        folder_id: Option<FolderId>,
        message: String,
        category: ErrorCategory,
    },
}

impl EngineEvent {
    pub fn folder_id(&self) -> Option<FolderId> {
        match self {
            EngineEvent::FileEventDetected { folder_id, .. }
            | EngineEvent::RuleExecuted { folder_id, .. } => Some(*folder_id),
            EngineEvent::ErrorOccurred { folder_id, .. } => *folder_id,
        }
    }
}

/// Send to every subscriber; having none is not an error
pub(crate) fn emit(tx: &broadcast::Sender<EngineEvent>, event: EngineEvent) {
    let _ = tx.send(event);
}
