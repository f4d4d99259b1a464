//! Bounded execution history
//!
//! The ledger is a ring of slots addressed by an atomic sequence counter.
//! Appends claim a sequence number without any shared lock and only contend
//! when two writers land on the same slot, which needs `capacity` appends in
//! between. Once full, each append overwrites the oldest entry.

use af_core::{ActionKind, EventKind, FolderId, RuleId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

pub const DEFAULT_HISTORY_CAPACITY: usize = 10_000;

/// Audit record of one rule execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionHistoryEntry {
    pub folder_id: FolderId,
    pub rule_id: RuleId,
    pub rule_name: String,
    /// Event that triggered the dispatch
    pub event: EventKind,
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub action: ActionKind,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

struct Slot {
    seq: u64,
    entry: ExecutionHistoryEntry,
}

/// Fixed-capacity ring of history entries
pub struct HistoryLedger {
    slots: Box<[Mutex<Option<Slot>>]>,
    next_seq: AtomicU64,
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryLedger {
    /// Ledger holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity.max(1)).map(|_| Mutex::new(None)).collect();
        Self {
            slots,
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Record an entry, evicting the oldest when full
    pub fn append(&self, entry: ExecutionHistoryEntry) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let index = (seq % self.slots.len() as u64) as usize;

        let mut slot = self.slots[index].lock();
        // A slower writer holding an older sequence must not clobber a newer one
        if slot.as_ref().map_or(true, |s| s.seq < seq) {
            *slot = Some(Slot { seq, entry });
        }
    }

    /// Up to `max` entries, newest first, optionally for one folder
    pub fn recent(&self, folder: Option<FolderId>, max: usize) -> Vec<ExecutionHistoryEntry> {
        let mut found: Vec<(u64, ExecutionHistoryEntry)> = self
            .slots
            .iter()
            .filter_map(|slot| {
                let slot = slot.lock();
                let s = slot.as_ref()?;
                if folder.is_some_and(|f| f != s.entry.folder_id) {
                    return None;
                }
                Some((s.seq, s.entry.clone()))
            })
            .collect();

        found.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        found.into_iter().take(max).map(|(_, e)| e).collect()
    }

    /// Drop every entry, or only those of `folder`; returns how many went
    pub fn clear(&self, folder: Option<FolderId>) -> usize {
        let mut removed = 0;
        for slot in self.slots.iter() {
            let mut slot = slot.lock();
            let matches = match (&*slot, folder) {
                (Some(s), Some(f)) => s.entry.folder_id == f,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if matches {
                *slot = None;
                removed += 1;
            }
        }
        removed
    }

    /// Entries currently held
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.lock().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
