//! OS change notifications for one watched folder

use crate::filter::FolderPatterns;
use af_core::{EventKind, FolderId, WatchedFolder};
use anyhow::{bail, Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, trace};

/// A filtered, canonical change inside a watched folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub folder_id: FolderId,
    pub kind: EventKind,
    pub path: PathBuf,
    /// Previous location, for `Renamed` only
    pub old_path: Option<PathBuf>,
}

/// What a monitor sends to its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorMessage {
    Event(WatchEvent),
    /// The notification channel broke; the folder needs a restart
    Failed { folder_id: FolderId, message: String },
}

/// Live subscription for one folder; dropping it stops notifications
pub struct EventMonitor {
    folder_id: FolderId,
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for EventMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventMonitor")
            .field("folder_id", &self.folder_id)
            .field("root", &self.root)
            .finish()
    }
}

impl EventMonitor {
    /// Subscribe to changes under `folder`'s root
    ///
    /// Fails if the root is missing or not a directory, if a pattern does
    /// not compile, or if the OS refuses the watch.
    pub fn start(folder: &WatchedFolder, tx: UnboundedSender<MonitorMessage>) -> Result<Self> {
        if !folder.root().is_dir() {
            bail!("{} does not exist or is not a directory", folder.root().display());
        }
        let root = folder
            .root()
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", folder.root().display()))?;

        let mut translator = EventTranslator::new(
            folder.id,
            folder.events.clone(),
            FolderPatterns::from_folder(folder)?,
        );

        let folder_id = folder.id;
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let messages = match res {
                Ok(event) if event.need_rescan() => vec![MonitorMessage::Failed {
                    folder_id,
                    message: "Change notifications overflowed; events were lost".to_string(),
                }],
                Ok(event) => translator
                    .translate(event)
                    .into_iter()
                    .map(MonitorMessage::Event)
                    .collect(),
                Err(e) => vec![MonitorMessage::Failed {
                    folder_id,
                    message: format!("Watch error: {}", e),
                }],
            };
            for message in messages {
                if tx.send(message).is_err() {
                    trace!("Monitor receiver closed, dropping event");
                    return;
                }
            }
        })
        .context("Failed to create file watcher")?;

        let mode = if folder.include_subdirectories {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(&root, mode)
            .with_context(|| format!("Failed to watch {}", root.display()))?;

        info!(
            folder = %folder.name,
            "Watching {:?} (recursive: {})",
            root,
            folder.include_subdirectories
        );

        Ok(Self {
            folder_id: folder.id,
            root,
            _watcher: watcher,
        })
    }

    pub fn folder_id(&self) -> FolderId {
        self.folder_id
    }

    /// Canonical root being watched
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for EventMonitor {
    fn drop(&mut self) {
        debug!("Stopped watching {:?}", self.root);
    }
}

/// Rename cookies remembered while waiting for the matching `To` side
const PENDING_RENAME_LIMIT: usize = 64;

/// Maps raw notify events to filtered `WatchEvent`s
struct EventTranslator {
    folder_id: FolderId,
    monitored: BTreeSet<EventKind>,
    patterns: FolderPatterns,
    /// Trackers of `From` halves seen inside the watched tree
    pending_renames: VecDeque<usize>,
}

impl EventTranslator {
    fn new(folder_id: FolderId, monitored: BTreeSet<EventKind>, patterns: FolderPatterns) -> Self {
        Self {
            folder_id,
            monitored,
            patterns,
            pending_renames: VecDeque::new(),
        }
    }

    fn translate(&mut self, event: Event) -> Vec<WatchEvent> {
        use notify::EventKind as Raw;

        let tracker = event.tracker();
        match (event.kind, tracker) {
            (Raw::Modify(ModifyKind::Name(RenameMode::From)), Some(cookie)) => {
                if self.pending_renames.len() == PENDING_RENAME_LIMIT {
                    self.pending_renames.pop_front();
                }
                self.pending_renames.push_back(cookie);
            }
            (Raw::Modify(ModifyKind::Name(RenameMode::To)), Some(cookie)) => {
                if let Some(index) = self.pending_renames.iter().position(|c| *c == cookie) {
                    self.pending_renames.remove(index);
                    // A paired `Both` follows and is reported as Renamed
                    if self.monitored.contains(&EventKind::Renamed) {
                        return Vec::new();
                    }
                }
            }
            _ => {}
        }

        let mut paths = event.paths.into_iter();
        let kind = match event.kind {
            Raw::Create(_) => EventKind::Created,
            Raw::Remove(_) => EventKind::Deleted,
            Raw::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let (Some(old), Some(new)) = (paths.next(), paths.next()) else {
                    return Vec::new();
                };
                return self
                    .accept(EventKind::Renamed, new, Some(old))
                    .into_iter()
                    .collect();
            }
            Raw::Modify(ModifyKind::Name(RenameMode::To)) => EventKind::Created,
            Raw::Modify(ModifyKind::Name(RenameMode::From)) => EventKind::Deleted,
            // Backends that cannot pair renames report each side alone
            Raw::Modify(ModifyKind::Name(_)) => {
                return paths
                    .filter_map(|p| {
                        let kind = if p.exists() {
                            EventKind::Created
                        } else {
                            EventKind::Deleted
                        };
                        self.accept(kind, p, None)
                    })
                    .collect();
            }
            Raw::Modify(_) => EventKind::Changed,
            Raw::Access(_) | Raw::Any | Raw::Other => return Vec::new(),
        };

        paths.filter_map(|p| self.accept(kind, p, None)).collect()
    }

    fn accept(&self, kind: EventKind, path: PathBuf, old_path: Option<PathBuf>) -> Option<WatchEvent> {
        if !self.monitored.contains(&kind) {
            return None;
        }
        if !self.patterns.admits(&path) {
            trace!("Filtered out {:?}", path);
            return None;
        }
        Some(WatchEvent {
            folder_id: self.folder_id,
            kind,
            path,
            old_path,
        })
    }
}
