//! Watched folder registry and event dispatch
//!
//! All mutable engine state (folders, their monitors and the settle timers)
//! sits behind one mutex. Monitors feed a single channel drained by a
//! dispatch task; each accepted event is either settled or handed to its own
//! task, so files are processed concurrently with no ordering between keys.
//!
//! A settle timer claims its ticket under the state lock before dispatching.
//! Every stop bumps the folder's generation, and dispatch checks that the
//! generation it started under is still current right before the action
//! runs. Once `stop_watching` returns no new action starts for that folder.
//! Actions already executing are allowed to finish and are recorded.

use crate::batch::{BatchProcessor, BatchProgress, FileDisposition, ProcessingResult};
use crate::events::{emit, EngineEvent, EVENT_CHANNEL_CAPACITY};
use actions::{ActionExecutor, ActionOutcome};
use af_core::{
    EngineError, EngineSettings, ErrorCategory, EventKind, FolderId, FolderStatus, Result, Rule,
    RuleId, RuleMatcher, RuleSet, WatchedFolder,
};
use chrono::Utc;
use journal::{ConfigStore, ExecutionHistoryEntry, HistoryLedger};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use watcher::{EventMonitor, FolderPatterns, MonitorMessage, SettleScheduler, Ticket, WatchEvent};

type SettleKey = (FolderId, PathBuf);

struct FolderSlot {
    folder: WatchedFolder,
    monitor: Option<EventMonitor>,
    /// Bumped whenever the monitor is detached
    generation: u64,
}

#[derive(Default)]
struct RegistryState {
    /// Registration order is kept for listing
    folders: Vec<FolderSlot>,
    timers: SettleScheduler<SettleKey>,
}

impl RegistryState {
    fn slot(&self, id: FolderId) -> Option<&FolderSlot> {
        self.folders.iter().find(|s| s.folder.id == id)
    }

    fn slot_mut(&mut self, id: FolderId) -> Option<&mut FolderSlot> {
        self.folders.iter_mut().find(|s| s.folder.id == id)
    }

    fn running_rules(&self, id: FolderId) -> Option<(RuleSet, u64)> {
        self.slot(id)
            .filter(|s| s.folder.is_running())
            .map(|s| (s.folder.rules.clone(), s.generation))
    }

    fn is_current(&self, id: FolderId, generation: u64) -> bool {
        self.slot(id)
            .is_some_and(|s| s.folder.is_running() && s.generation == generation)
    }

    /// Detach the monitor and drop every pending timer for `id`
    fn detach(&mut self, id: FolderId) {
        if let Some(slot) = self.slot_mut(id) {
            slot.monitor = None;
            slot.generation += 1;
        }
        let cancelled = self.timers.cancel_where(|(folder, _)| *folder == id);
        if cancelled > 0 {
            debug!(folder = %id, "Cancelled {} pending settle timers", cancelled);
        }
    }
}

struct Inner {
    state: Mutex<RegistryState>,
    executor: ActionExecutor,
    matcher: RuleMatcher,
    history: HistoryLedger,
    events: broadcast::Sender<EngineEvent>,
    monitor_tx: mpsc::UnboundedSender<MonitorMessage>,
}

/// Owns every watched folder and dispatches their events
///
/// Cloning gives another handle to the same registry. Must be created inside
/// a tokio runtime.
#[derive(Clone)]
pub struct WatchRegistry {
    inner: Arc<Inner>,
    dispatch_loop: Arc<JoinHandle<()>>,
}

impl WatchRegistry {
    pub fn new(settings: &EngineSettings) -> Self {
        let executor = ActionExecutor::new().rename_attempt_limit(settings.engine.rename_attempt_limit);
        Self::with_executor(settings, executor)
    }

    /// Registry using a caller-supplied executor
    pub fn with_executor(settings: &EngineSettings, executor: ActionExecutor) -> Self {
        let (monitor_tx, monitor_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let inner = Arc::new(Inner {
            state: Mutex::new(RegistryState::default()),
            executor,
            matcher: RuleMatcher::new(settings.eval_options()),
            history: HistoryLedger::new(settings.engine.history_capacity),
            events,
            monitor_tx,
        });

        let dispatch_loop = tokio::spawn(dispatch_loop(Arc::downgrade(&inner), monitor_rx));
        Self {
            inner,
            dispatch_loop: Arc::new(dispatch_loop),
        }
    }

    /// Register a folder in the Stopped state
    pub fn create_watch_folder(&self, mut folder: WatchedFolder) -> Result<FolderId> {
        if folder.path.as_os_str().is_empty() {
            return Err(EngineError::InvalidConfig("folder path is empty".into()));
        }
        FolderPatterns::from_folder(&folder).map_err(|e| EngineError::InvalidConfig(format!("{:#}", e)))?;
        for rule in folder.rules.iter() {
            rule.validate()?;
        }
        if folder.name.trim().is_empty() {
            folder.name = folder.path.display().to_string();
        }
        folder.reset_runtime();

        let mut state = self.inner.state.lock();
        if state.slot(folder.id).is_some() {
            return Err(EngineError::DuplicateFolder(folder.id));
        }
        let id = folder.id;
        info!(folder = %folder.name, "Registered watched folder {:?}", folder.path);
        state.folders.push(FolderSlot {
            folder,
            monitor: None,
            generation: 0,
        });
        Ok(id)
    }

    /// Stop and unregister a folder, returning its definition
    pub fn remove_watch_folder(&self, id: FolderId) -> Result<WatchedFolder> {
        let mut state = self.inner.state.lock();
        let index = state
            .folders
            .iter()
            .position(|s| s.folder.id == id)
            .ok_or(EngineError::FolderNotFound(id))?;
        state.detach(id);
        let mut slot = state.folders.remove(index);
        slot.folder.status = FolderStatus::Stopped;
        info!(folder = %slot.folder.name, "Removed watched folder");
        Ok(slot.folder)
    }

    /// Attach a monitor and mark the folder Running
    ///
    /// On failure the folder enters Error, `ErrorOccurred` is raised and
    /// the error is returned. Starting a running folder does nothing.
    /// Starting a folder in Error stops it first.
    pub fn start_watching(&self, id: FolderId) -> Result<()> {
        let failure = {
            let mut state = self.inner.state.lock();
            let status = state
                .slot(id)
                .ok_or(EngineError::FolderNotFound(id))?
                .folder
                .status;
            match status {
                FolderStatus::Running => return Ok(()),
                FolderStatus::Error => {
                    state.detach(id);
                    debug!(folder = %id, "Leaving error state before restart");
                }
                FolderStatus::Stopped => {}
            }
            let slot = state.slot_mut(id).ok_or(EngineError::FolderNotFound(id))?;
            slot.folder.status = FolderStatus::Stopped;

            let failure = if !slot.folder.root().is_dir() {
                Some(EngineError::RootMissing(slot.folder.path.clone()))
            } else {
                match EventMonitor::start(&slot.folder, self.inner.monitor_tx.clone()) {
                    Ok(monitor) => {
                        slot.monitor = Some(monitor);
                        slot.folder.status = FolderStatus::Running;
                        slot.folder.last_error = None;
                        None
                    }
                    Err(e) => Some(EngineError::Notification {
                        folder: id,
                        message: format!("{:#}", e),
                    }),
                }
            };

            if let Some(err) = &failure {
                slot.folder.status = FolderStatus::Error;
                slot.folder.last_error = Some(err.to_string());
            }
            failure
        };

        match failure {
            None => Ok(()),
            Some(err) => {
                warn!(folder = %id, "Failed to start watching: {}", err);
                self.inner.report(Some(id), &err);
                Err(err)
            }
        }
    }

    /// Detach the monitor, cancel pending timers and mark the folder Stopped
    pub fn stop_watching(&self, id: FolderId) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.slot(id).is_none() {
            return Err(EngineError::FolderNotFound(id));
        }
        state.detach(id);
        if let Some(slot) = state.slot_mut(id) {
            if slot.folder.status != FolderStatus::Stopped {
                info!(folder = %slot.folder.name, "Stopped watching");
            }
            slot.folder.status = FolderStatus::Stopped;
        }
        Ok(())
    }

    /// Start every folder not already running; returns the failures
    pub fn start_all(&self) -> Vec<(FolderId, EngineError)> {
        self.folder_ids()
            .into_iter()
            .filter_map(|id| self.start_watching(id).err().map(|e| (id, e)))
            .collect()
    }

    pub fn stop_all(&self) {
        for id in self.folder_ids() {
            // ids come from the live list; a concurrent removal is harmless
            let _ = self.stop_watching(id);
        }
    }

    /// Add or replace (by id) a rule on a folder
    pub fn add_rule(&self, folder_id: FolderId, rule: Rule) -> Result<RuleId> {
        rule.validate()?;
        let mut state = self.inner.state.lock();
        let slot = state
            .slot_mut(folder_id)
            .ok_or(EngineError::FolderNotFound(folder_id))?;
        let id = rule.id;
        slot.folder.rules = slot.folder.rules.with_rule(rule);
        Ok(id)
    }

    pub fn remove_rule(&self, folder_id: FolderId, rule_id: RuleId) -> Result<Rule> {
        let mut state = self.inner.state.lock();
        let slot = state
            .slot_mut(folder_id)
            .ok_or(EngineError::FolderNotFound(folder_id))?;
        let (rules, removed) = slot
            .folder
            .rules
            .without_rule(rule_id)
            .ok_or(EngineError::RuleNotFound {
                folder: folder_id,
                rule: rule_id,
            })?;
        slot.folder.rules = rules;
        Ok(removed)
    }

    /// Run the folder's rules over the files already in it
    ///
    /// Live runs record history and raise `RuleExecuted` like watched events
    /// do. Works whether or not the folder is running.
    pub async fn process_existing<P>(
        &self,
        id: FolderId,
        dry_run: bool,
        mut progress: P,
    ) -> Result<ProcessingResult>
    where
        P: FnMut(&BatchProgress),
    {
        let folder = self.folder(id).ok_or(EngineError::FolderNotFound(id))?;
        let batch = BatchProcessor::new(self.inner.executor.clone(), self.inner.matcher);

        let result = batch
            .process(&folder, dry_run, |file, p| {
                if let (FileDisposition::Executed(outcome), Some(rule_id), Some(name), Some(action)) =
                    (&file.disposition, file.rule_id, &file.rule_name, file.action)
                {
                    self.inner.record(Execution {
                        folder_id: id,
                        rule_id,
                        rule_name: name.clone(),
                        action,
                        event: EventKind::Created,
                        path: file.path.clone(),
                        outcome: outcome.clone(),
                    });
                }
                progress(p);
            })
            .await;

        result.map_err(|e| {
            let err = EngineError::Processing {
                path: folder.path.clone(),
                message: format!("{:#}", e),
            };
            self.inner.report(Some(id), &err);
            err
        })
    }

    /// Whether `rule`'s conditions hold for `path`, ignoring its enabled flag
    pub fn test_rule(&self, rule: &Rule, path: &Path) -> bool {
        self.inner.matcher.is_satisfied(rule, path)
    }

    /// Up to `max` history entries, newest first
    pub fn history(&self, folder: Option<FolderId>, max: usize) -> Vec<ExecutionHistoryEntry> {
        self.inner.history.recent(folder, max)
    }

    pub fn clear_history(&self, folder: Option<FolderId>) -> usize {
        self.inner.history.clear(folder)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of one folder, including runtime status
    pub fn folder(&self, id: FolderId) -> Option<WatchedFolder> {
        self.inner.state.lock().slot(id).map(|s| s.folder.clone())
    }

    /// Snapshot of every folder in registration order
    pub fn folders(&self) -> Vec<WatchedFolder> {
        self.inner
            .state
            .lock()
            .folders
            .iter()
            .map(|s| s.folder.clone())
            .collect()
    }

    fn folder_ids(&self) -> Vec<FolderId> {
        self.inner.state.lock().folders.iter().map(|s| s.folder.id).collect()
    }

    /// Register every folder in `store`; returns how many were added
    ///
    /// Folders whose id is already registered are skipped.
    pub fn load_from(&self, store: &ConfigStore) -> Result<usize> {
        let folders = store.load().map_err(|e| {
            self.inner.report(None, &e);
            e
        })?;

        let mut added = 0;
        for folder in folders {
            let name = folder.name.clone();
            match self.create_watch_folder(folder) {
                Ok(_) => added += 1,
                Err(e) => {
                    warn!(folder = %name, "Skipping folder from {:?}: {}", store.path(), e);
                    self.inner.report(None, &e);
                }
            }
        }
        Ok(added)
    }

    /// Write every folder to `store`
    pub fn save_to(&self, store: &ConfigStore) -> Result<()> {
        let folders = self.folders();
        store.save(&folders).map_err(|e| {
            self.inner.report(None, &e);
            e
        })
    }

    pub fn export_folder(&self, id: FolderId, path: &Path) -> Result<()> {
        let folder = self.folder(id).ok_or(EngineError::FolderNotFound(id))?;
        journal::export_folder(&folder, path)
    }

    /// Import a folder written by `export_folder` under fresh ids
    pub fn import_folder(&self, path: &Path) -> Result<FolderId> {
        let folder = journal::import_folder(path)?;
        self.create_watch_folder(folder)
    }

    /// Number of settle timers waiting to fire
    pub fn pending_settles(&self) -> usize {
        self.inner.state.lock().timers.pending()
    }

    /// Stop every folder and the dispatch task
    pub fn shutdown(&self) {
        self.stop_all();
        self.dispatch_loop.abort();
    }
}

/// Drain monitor messages until the registry is dropped
async fn dispatch_loop(inner: Weak<Inner>, mut rx: mpsc::UnboundedReceiver<MonitorMessage>) {
    while let Some(message) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match message {
            MonitorMessage::Event(event) => inner.on_event(event),
            MonitorMessage::Failed { folder_id, message } => inner.on_monitor_failed(folder_id, message),
        }
    }
    debug!("Dispatch loop finished");
}

/// Everything needed to record one action run
struct Execution {
    folder_id: FolderId,
    rule_id: RuleId,
    rule_name: String,
    action: af_core::ActionKind,
    event: EventKind,
    path: PathBuf,
    outcome: ActionOutcome,
}

impl Inner {
    fn on_event(self: &Arc<Self>, event: WatchEvent) {
        let settle = {
            let mut state = self.state.lock();
            let Some(slot) = state.slot_mut(event.folder_id) else {
                return;
            };
            if !slot.folder.is_running() {
                return;
            }
            slot.folder.last_event_at = Some(Utc::now());
            let settle = slot.folder.settle_time();

            let settles = matches!(event.kind, EventKind::Created | EventKind::Renamed);
            if settles && !settle.is_zero() {
                let key = (event.folder_id, event.path.clone());
                let weak = Arc::downgrade(self);
                let pending = event.clone();
                state.timers.schedule(key, settle, move |ticket| async move {
                    if let Some(inner) = weak.upgrade() {
                        inner.fire(ticket, pending).await;
                    }
                });
                Some(settle)
            } else {
                None
            }
        };

        emit(
            &self.events,
            EngineEvent::FileEventDetected {
                folder_id: event.folder_id,
                kind: event.kind,
                path: event.path.clone(),
                old_path: event.old_path.clone(),
            },
        );

        match settle {
            Some(delay) => debug!("Settling {:?} for {:?}", event.path, delay),
            None => {
                let inner = Arc::clone(self);
                tokio::spawn(async move {
                    let current = inner.state.lock().running_rules(event.folder_id);
                    if let Some((rules, generation)) = current {
                        inner.dispatch(event, rules, generation).await;
                    }
                });
            }
        }
    }

    /// Settle timer expired: claim it and dispatch if still current
    async fn fire(self: Arc<Self>, ticket: Ticket<SettleKey>, event: WatchEvent) {
        let current = {
            let mut state = self.state.lock();
            if !state.timers.claim(&ticket) {
                return;
            }
            state.running_rules(event.folder_id)
        };
        if let Some((rules, generation)) = current {
            self.dispatch(event, rules, generation).await;
        }
    }

    async fn dispatch(&self, event: WatchEvent, rules: RuleSet, generation: u64) {
        let path = event.path.clone();
        if event.kind != EventKind::Deleted && !path.is_file() {
            debug!("{:?} is gone or not a file, skipping", path);
            return;
        }

        let matcher = self.matcher;
        let lookup = path.clone();
        let rule = tokio::task::spawn_blocking(move || matcher.find_match(&rules, &lookup).cloned())
            .await
            .ok()
            .flatten();
        let Some(rule) = rule else {
            debug!("No rule matched {:?}", path);
            return;
        };

        debug!(rule = %rule.name, "Rule matched {:?}", path);
        if !self.state.lock().is_current(event.folder_id, generation) {
            debug!("Watching stopped before {:?} was handled, skipping", path);
            return;
        }
        let outcome = self.executor.execute(&rule.action, &path).await;
        self.record(Execution {
            folder_id: event.folder_id,
            rule_id: rule.id,
            rule_name: rule.name,
            action: rule.action.kind,
            event: event.kind,
            path,
            outcome,
        });
    }

    /// Count, log, append history and raise `RuleExecuted`
    fn record(&self, run: Execution) {
        {
            let mut state = self.state.lock();
            if let Some(slot) = state.slot_mut(run.folder_id) {
                slot.folder.processed_count += 1;
            }
        }

        let success = run.outcome.is_success();
        let destination = run.outcome.destination().map(Path::to_path_buf);
        let error = run.outcome.error().map(str::to_string);
        match &run.outcome {
            ActionOutcome::Completed { .. } => {
                info!(rule = %run.rule_name, action = %run.action, "Processed {:?}", run.path)
            }
            ActionOutcome::Skipped { reason } => {
                info!(rule = %run.rule_name, action = %run.action, "Skipped {:?}: {}", run.path, reason)
            }
            ActionOutcome::Failed { error } => {
                warn!(rule = %run.rule_name, action = %run.action, "Failed on {:?}: {}", run.path, error)
            }
        }

        self.history.append(ExecutionHistoryEntry {
            folder_id: run.folder_id,
            rule_id: run.rule_id,
            rule_name: run.rule_name.clone(),
            event: run.event,
            source: run.path.clone(),
            destination: destination.clone(),
            action: run.action,
            success,
            error: error.clone(),
            timestamp: Utc::now(),
        });

        emit(
            &self.events,
            EngineEvent::RuleExecuted {
                folder_id: run.folder_id,
                rule_id: run.rule_id,
                rule_name: run.rule_name,
                path: run.path,
                destination,
                action: run.action,
                success,
                error,
            },
        );
    }

    fn on_monitor_failed(&self, id: FolderId, message: String) {
        {
            let mut state = self.state.lock();
            let Some(slot) = state.slot_mut(id) else {
                warn!(folder = %id, "Monitor failure for unknown folder: {}", message);
                return;
            };
            if !slot.folder.is_running() {
                return;
            }
            slot.folder.status = FolderStatus::Error;
            slot.folder.last_error = Some(message.clone());
            state.detach(id);
        }

        warn!(folder = %id, "Watching failed: {}", message);
        emit(
            &self.events,
            EngineEvent::ErrorOccurred {
                folder_id: Some(id),
                message,
                category: ErrorCategory::Notification,
            },
        );
    }

    fn report(&self, folder_id: Option<FolderId>, err: &EngineError) {
        emit(
            &self.events,
            EngineEvent::ErrorOccurred {
                folder_id,
                message: err.to_string(),
                category: err.category(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use af_core::{Action, Condition, ConditionField, Operator};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn registry() -> WatchRegistry {
        WatchRegistry::new(&EngineSettings::default())
    }

    fn tmp_rule() -> Rule {
        Rule::new("Delete temp", Action::delete()).with_condition(Condition::new(
            ConditionField::Extension,
            Operator::Equals,
            "tmp",
        ))
    }

    async fn next_event(rx: &mut broadcast::Receiver<EngineEvent>) -> EngineEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no engine event within timeout")
            .unwrap()
    }

    /// Feed an event as if the folder's monitor produced it
    fn inject(registry: &WatchRegistry, folder_id: FolderId, kind: EventKind, path: PathBuf) {
        registry
            .inner
            .monitor_tx
            .send(MonitorMessage::Event(WatchEvent {
                folder_id,
                kind,
                path,
                old_path: None,
            }))
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry();
        let folder = WatchedFolder::new(temp_dir.path());
        let id = registry.create_watch_folder(folder.clone()).unwrap();

        assert!(matches!(
            registry.create_watch_folder(folder),
            Err(EngineError::DuplicateFolder(_))
        ));
        assert_eq!(registry.folders().len(), 1);

        registry.remove_watch_folder(id).unwrap();
        assert!(registry.folder(id).is_none());
        assert!(matches!(
            registry.remove_watch_folder(id),
            Err(EngineError::FolderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_definitions_rejected() {
        let registry = registry();
        let bad_filter = WatchedFolder::new("/watch").with_filter("[oops");
        assert!(matches!(
            registry.create_watch_folder(bad_filter),
            Err(EngineError::InvalidConfig(_))
        ));

        let id = registry.create_watch_folder(WatchedFolder::new("/watch")).unwrap();
        let no_destination = Rule::new("Move nowhere", Action::move_to(""));
        assert!(registry.add_rule(id, no_destination).is_err());
    }

    #[tokio::test]
    async fn test_rules_add_replace_remove() {
        let registry = registry();
        let id = registry.create_watch_folder(WatchedFolder::new("/watch")).unwrap();

        let mut rule = tmp_rule();
        let rule_id = registry.add_rule(id, rule.clone()).unwrap();
        rule.name = "Renamed".into();
        registry.add_rule(id, rule).unwrap();

        let folder = registry.folder(id).unwrap();
        assert_eq!(folder.rules.len(), 1);
        assert_eq!(folder.rules[0].name, "Renamed");

        assert_eq!(registry.remove_rule(id, rule_id).unwrap().id, rule_id);
        assert!(matches!(
            registry.remove_rule(id, rule_id),
            Err(EngineError::RuleNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_missing_root_enters_error() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry();
        let mut rx = registry.subscribe();
        let id = registry
            .create_watch_folder(WatchedFolder::new(temp_dir.path().join("missing")))
            .unwrap();

        let err = registry.start_watching(id).unwrap_err();
        assert!(matches!(err, EngineError::RootMissing(_)));

        let folder = registry.folder(id).unwrap();
        assert_eq!(folder.status, FolderStatus::Error);
        assert!(folder.last_error.is_some());

        match next_event(&mut rx).await {
            EngineEvent::ErrorOccurred {
                folder_id, category, ..
            } => {
                assert_eq!(folder_id, Some(id));
                assert_eq!(category, ErrorCategory::Configuration);
            }
            other => panic!("unexpected event {:?}", other),
        }

        // Error → Stopped → Running once the root exists
        fs::create_dir(temp_dir.path().join("missing")).unwrap();
        registry.stop_watching(id).unwrap();
        registry.start_watching(id).unwrap();
        assert_eq!(registry.folder(id).unwrap().status, FolderStatus::Running);
        assert_eq!(registry.folder(id).unwrap().last_error, None);
    }

    #[tokio::test]
    async fn test_start_from_error_stops_first() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("later");
        let registry = registry();
        let id = registry.create_watch_folder(WatchedFolder::new(&root)).unwrap();

        assert!(registry.start_watching(id).is_err());
        let before = registry.inner.state.lock().slot(id).unwrap().generation;

        fs::create_dir(&root).unwrap();
        registry.start_watching(id).unwrap();

        let state = registry.inner.state.lock();
        let slot = state.slot(id).unwrap();
        assert_eq!(slot.folder.status, FolderStatus::Running);
        assert_eq!(slot.folder.last_error, None);
        assert_eq!(slot.generation, before + 1);
    }

    #[tokio::test]
    async fn test_stop_between_lookup_and_action_skips_action() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.tmp");
        fs::write(&file, "x").unwrap();

        let registry = registry();
        let id = registry
            .create_watch_folder(WatchedFolder::new(temp_dir.path()).with_rules(vec![tmp_rule()]))
            .unwrap();
        registry.start_watching(id).unwrap();

        let (rules, generation) = registry.inner.state.lock().running_rules(id).unwrap();
        registry.stop_watching(id).unwrap();

        let event = WatchEvent {
            folder_id: id,
            kind: EventKind::Created,
            path: file.clone(),
            old_path: None,
        };
        registry.inner.dispatch(event.clone(), rules.clone(), generation).await;
        assert!(file.exists());
        assert!(registry.history(None, 10).is_empty());

        // a restart does not revive work captured before the stop
        registry.start_watching(id).unwrap();
        registry.inner.dispatch(event, rules, generation).await;
        assert!(file.exists());
        assert!(registry.history(None, 10).is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_records_history() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.tmp");
        fs::write(&file, "x").unwrap();

        let registry = registry();
        let mut rx = registry.subscribe();
        let id = registry
            .create_watch_folder(WatchedFolder::new(temp_dir.path()).with_rules(vec![tmp_rule()]))
            .unwrap();
        registry.start_watching(id).unwrap();

        inject(&registry, id, EventKind::Created, file.clone());

        loop {
            if let EngineEvent::RuleExecuted { success, path, .. } = next_event(&mut rx).await {
                assert!(success);
                assert_eq!(path, file);
                break;
            }
        }
        assert!(!file.exists());

        let history = registry.history(Some(id), 10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].rule_name, "Delete temp");
        assert_eq!(registry.folder(id).unwrap().processed_count, 1);
        assert!(registry.folder(id).unwrap().last_event_at.is_some());
    }

    #[tokio::test]
    async fn test_events_for_stopped_folder_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.tmp");
        fs::write(&file, "x").unwrap();

        let registry = registry();
        let id = registry
            .create_watch_folder(WatchedFolder::new(temp_dir.path()).with_rules(vec![tmp_rule()]))
            .unwrap();

        inject(&registry, id, EventKind::Created, file.clone());
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(file.exists());
        assert!(registry.history(None, 10).is_empty());
    }

    #[tokio::test]
    async fn test_stop_cancels_pending_settles() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.tmp");
        fs::write(&file, "x").unwrap();

        let registry = registry();
        let folder = WatchedFolder::new(temp_dir.path())
            .with_settle(Duration::from_millis(400))
            .with_rules(vec![tmp_rule()]);
        let id = registry.create_watch_folder(folder).unwrap();
        registry.start_watching(id).unwrap();

        inject(&registry, id, EventKind::Created, file.clone());
        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.pending_settles() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        registry.stop_watching(id).unwrap();
        assert_eq!(registry.pending_settles(), 0);

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(file.exists());
        assert!(registry.history(None, 10).is_empty());
    }

    #[tokio::test]
    async fn test_monitor_failure_sets_error() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry();
        let mut rx = registry.subscribe();
        let id = registry
            .create_watch_folder(WatchedFolder::new(temp_dir.path()))
            .unwrap();
        registry.start_watching(id).unwrap();

        registry
            .inner
            .monitor_tx
            .send(MonitorMessage::Failed {
                folder_id: id,
                message: "queue overflow".into(),
            })
            .unwrap();

        match next_event(&mut rx).await {
            EngineEvent::ErrorOccurred {
                folder_id, category, ..
            } => {
                assert_eq!(folder_id, Some(id));
                assert_eq!(category, ErrorCategory::Notification);
            }
            other => panic!("unexpected event {:?}", other),
        }
        let folder = registry.folder(id).unwrap();
        assert_eq!(folder.status, FolderStatus::Error);
        assert_eq!(folder.last_error.as_deref(), Some("queue overflow"));

        // restart recovers
        registry.start_watching(id).unwrap();
        assert_eq!(registry.folder(id).unwrap().status, FolderStatus::Running);
    }

    #[tokio::test]
    async fn test_load_failure_is_global_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("folders.json");
        fs::write(&path, "not json").unwrap();

        let registry = registry();
        let mut rx = registry.subscribe();
        assert!(registry.load_from(&ConfigStore::new(&path)).is_err());

        match next_event(&mut rx).await {
            EngineEvent::ErrorOccurred {
                folder_id, category, ..
            } => {
                assert_eq!(folder_id, None);
                assert_eq!(category, ErrorCategory::ConfigurationIo);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_test_rule_ignores_enabled_flag() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.tmp");
        fs::write(&file, "x").unwrap();

        let registry = registry();
        assert!(registry.test_rule(&tmp_rule().disabled(), &file));
        assert!(!registry.test_rule(&tmp_rule(), &temp_dir.path().join("a.txt")));
    }
}
