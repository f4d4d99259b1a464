//! One-shot processing of files already in a folder

use actions::{ActionExecutor, ActionOutcome};
use af_core::{ActionKind, Rule, RuleId, RuleMatcher, RuleSet, WatchedFolder};
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use watcher::{enumerate_files, FolderPatterns};

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileDisposition {
    /// No enabled rule matched
    Unmatched,
    /// Dry run: the action was not executed
    Previewed { destination: Option<PathBuf> },
    Executed(ActionOutcome),
}

/// Per-file entry of a batch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    pub path: PathBuf,
    pub rule_id: Option<RuleId>,
    pub rule_name: Option<String>,
    pub action: Option<ActionKind>,
    pub disposition: FileDisposition,
}

impl FileResult {
    pub fn is_matched(&self) -> bool {
        self.rule_id.is_some()
    }

    /// The action ran (successfully or not)
    pub fn was_executed(&self) -> bool {
        matches!(self.disposition, FileDisposition::Executed(_))
    }
}

/// Reported after every file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    pub current: PathBuf,
    /// Files handled so far, including `current`
    pub processed: usize,
    pub total: usize,
    pub matched: usize,
}

/// Outcome of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingResult {
    pub files: Vec<FileResult>,
    pub total: usize,
    /// Files a rule matched, whatever the action did
    pub matched: usize,
    pub unmatched: usize,
    /// Matched but the action declined (conflict policy, already in place)
    pub skipped: usize,
    pub errored: usize,
    pub dry_run: bool,
}

impl ProcessingResult {
    fn push(&mut self, result: FileResult) {
        if result.is_matched() {
            self.matched += 1;
        } else {
            self.unmatched += 1;
        }
        if let FileDisposition::Executed(outcome) = &result.disposition {
            match outcome {
                ActionOutcome::Skipped { .. } => self.skipped += 1,
                ActionOutcome::Failed { .. } => self.errored += 1,
                ActionOutcome::Completed { .. } => {}
            }
        }
        self.files.push(result);
    }
}

/// Runs a folder's rules over its current contents
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    executor: ActionExecutor,
    matcher: RuleMatcher,
}

impl BatchProcessor {
    pub fn new(executor: ActionExecutor, matcher: RuleMatcher) -> Self {
        Self { executor, matcher }
    }

    /// Process every file under `folder`'s root that its patterns admit
    ///
    /// `on_file` runs after each file with its result and the running totals.
    /// The folder's event mask does not apply here.
    pub async fn process<F>(
        &self,
        folder: &WatchedFolder,
        dry_run: bool,
        mut on_file: F,
    ) -> Result<ProcessingResult>
    where
        F: FnMut(&FileResult, &BatchProgress),
    {
        let patterns = FolderPatterns::from_folder(folder)?;
        let root = folder.root().to_path_buf();
        let recursive = folder.include_subdirectories;
        let files = tokio::task::spawn_blocking(move || enumerate_files(&root, recursive, &patterns))
            .await
            .map_err(|e| anyhow!("Enumeration task failed: {}", e))??;

        info!(
            folder = %folder.name,
            "Processing {} existing files{}",
            files.len(),
            if dry_run { " (dry run)" } else { "" }
        );

        let mut result = ProcessingResult {
            total: files.len(),
            dry_run,
            ..Default::default()
        };

        for path in files {
            let file_result = self.process_file(&folder.rules, path, dry_run).await;
            result.push(file_result);

            let last = result.files.last().ok_or_else(|| anyhow!("result list is empty"))?;
            let progress = BatchProgress {
                current: last.path.clone(),
                processed: result.files.len(),
                total: result.total,
                matched: result.matched,
            };
            on_file(last, &progress);
        }

        debug!(
            "Batch done: {} matched, {} unmatched, {} skipped, {} errored",
            result.matched, result.unmatched, result.skipped, result.errored
        );
        Ok(result)
    }

    async fn process_file(&self, rules: &RuleSet, path: PathBuf, dry_run: bool) -> FileResult {
        let Some(rule) = self.find_match(rules, &path).await else {
            return FileResult {
                path,
                rule_id: None,
                rule_name: None,
                action: None,
                disposition: FileDisposition::Unmatched,
            };
        };

        let disposition = if dry_run {
            FileDisposition::Previewed {
                destination: self.executor.preview(&rule.action, &path),
            }
        } else {
            FileDisposition::Executed(self.executor.execute(&rule.action, &path).await)
        };

        FileResult {
            path,
            rule_id: Some(rule.id),
            rule_name: Some(rule.name),
            action: Some(rule.action.kind),
            disposition,
        }
    }

    /// Condition evaluation may read file contents, so it runs off the runtime
    async fn find_match(&self, rules: &RuleSet, path: &Path) -> Option<Rule> {
        let rules = rules.clone();
        let path = path.to_path_buf();
        let matcher = self.matcher;
        tokio::task::spawn_blocking(move || matcher.find_match(&rules, &path).cloned())
            .await
            .ok()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use af_core::{Action, Condition, ConditionField, ConflictPolicy, Operator};
    use std::fs;
    use tempfile::TempDir;

    fn ext_rule(name: &str, ext: &str, action: Action) -> Rule {
        Rule::new(name, action).with_condition(Condition::new(
            ConditionField::Extension,
            Operator::Equals,
            ext,
        ))
    }

    fn setup() -> (TempDir, WatchedFolder) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("in");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("a.tmp"), "a").unwrap();
        fs::write(root.join("b.pdf"), "b").unwrap();
        fs::write(root.join("c.txt"), "c").unwrap();

        let archive = temp_dir.path().join("archive").to_string_lossy().into_owned();
        let folder = WatchedFolder::new(&root).with_rules(vec![
            ext_rule("Delete temp", "tmp", Action::delete()),
            ext_rule("Archive pdf", "pdf", Action::move_to(archive)),
        ]);
        (temp_dir, folder)
    }

    fn processor() -> BatchProcessor {
        BatchProcessor::new(ActionExecutor::new(), RuleMatcher::default())
    }

    #[tokio::test]
    async fn test_live_run_executes_and_summarises() {
        let (temp_dir, folder) = setup();
        let mut progress_calls = Vec::new();

        let result = processor()
            .process(&folder, false, |_, p| progress_calls.push(p.clone()))
            .await
            .unwrap();

        assert_eq!(result.total, 3);
        assert_eq!(result.matched, 2);
        assert_eq!(result.unmatched, 1);
        assert_eq!(result.errored, 0);
        assert!(!folder.root().join("a.tmp").exists());
        assert!(temp_dir.path().join("archive/b.pdf").exists());

        assert_eq!(progress_calls.len(), 3);
        let last = progress_calls.last().unwrap();
        assert_eq!((last.processed, last.total, last.matched), (3, 3, 2));
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let (temp_dir, folder) = setup();

        let result = processor().process(&folder, true, |_, _| {}).await.unwrap();

        assert!(result.dry_run);
        assert_eq!(result.matched, 2);
        assert!(folder.root().join("a.tmp").exists());
        assert!(folder.root().join("b.pdf").exists());

        let pdf = result.files.iter().find(|f| f.path.ends_with("b.pdf")).unwrap();
        assert_eq!(
            pdf.disposition,
            FileDisposition::Previewed {
                destination: Some(temp_dir.path().join("archive/b.pdf"))
            }
        );
        assert!(!pdf.was_executed());
    }

    #[tokio::test]
    async fn test_skipped_conflicts_are_counted() {
        let (temp_dir, mut folder) = setup();
        let archive = temp_dir.path().join("archive");
        fs::create_dir(&archive).unwrap();
        fs::write(archive.join("b.pdf"), "already here").unwrap();
        folder.rules = vec![ext_rule(
            "Archive pdf",
            "pdf",
            Action::move_to(archive.to_string_lossy().into_owned()).with_conflict(ConflictPolicy::Skip),
        )]
        .into();

        let result = processor().process(&folder, false, |_, _| {}).await.unwrap();

        assert_eq!(result.matched, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.unmatched, 2);
    }

    #[tokio::test]
    async fn test_patterns_limit_candidates() {
        let (_temp_dir, folder) = setup();
        let folder = folder.with_filter("*.pdf");

        let result = processor().process(&folder, true, |_, _| {}).await.unwrap();
        assert_eq!(result.total, 1);
    }

    #[tokio::test]
    async fn test_missing_root_errors() {
        let temp_dir = TempDir::new().unwrap();
        let folder = WatchedFolder::new(temp_dir.path().join("gone"));
        assert!(processor().process(&folder, true, |_, _| {}).await.is_err());
    }
}
