//! Shared utilities for CLI commands

use af_core::{
    Condition, ConditionField, EngineSettings, FolderId, FolderStatus, Operator, Rule, RuleId,
    WatchedFolder,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use engine::WatchRegistry;
use journal::ConfigStore;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory
pub const HOME_ENV: &str = "AUTOFILE_HOME";

const FOLDERS_FILE: &str = "folders.json";
const SETTINGS_FILE: &str = "config.toml";

/// Locations of the persisted documents
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub home: PathBuf,
}

impl AppPaths {
    /// `--home`, then `AUTOFILE_HOME`, then the platform config directory
    pub fn resolve(flag: Option<PathBuf>) -> Result<Self> {
        if let Some(home) = flag {
            return Ok(Self { home });
        }
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self { home: home.into() });
        }
        let base = dirs::config_dir().context("Could not determine the user config directory")?;
        Ok(Self {
            home: base.join("autofile"),
        })
    }

    pub fn folders_file(&self) -> PathBuf {
        self.home.join(FOLDERS_FILE)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.home.join(SETTINGS_FILE)
    }

    pub fn store(&self) -> ConfigStore {
        ConfigStore::new(self.folders_file())
    }

    pub fn load_settings(&self) -> Result<EngineSettings> {
        let path = self.settings_file();
        EngineSettings::load(&path).with_context(|| format!("Failed to load {}", path.display()))
    }
}

/// A registry populated from the persisted folder document
pub struct Session {
    pub settings: EngineSettings,
    pub store: ConfigStore,
    pub registry: WatchRegistry,
}

impl Session {
    pub fn open(paths: AppPaths) -> Result<Self> {
        let settings = paths.load_settings()?;
        let store = paths.store();
        let registry = WatchRegistry::new(&settings);
        registry
            .load_from(&store)
            .with_context(|| format!("Failed to load {}", store.path().display()))?;

        Ok(Self {
            settings,
            store,
            registry,
        })
    }

    pub fn save(&self) -> Result<()> {
        self.registry
            .save_to(&self.store)
            .with_context(|| format!("Failed to save {}", self.store.path().display()))
    }

    /// Resolve a folder reference and return its current definition
    pub fn folder(&self, reference: &str) -> Result<WatchedFolder> {
        resolve_folder(&self.registry.folders(), reference).cloned()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.registry.shutdown();
    }
}

/// Resolve a folder by full id, unique id prefix (4+ chars), name or path
pub fn resolve_folder<'a>(folders: &'a [WatchedFolder], reference: &str) -> Result<&'a WatchedFolder> {
    if let Ok(id) = reference.parse::<FolderId>() {
        return folders
            .iter()
            .find(|f| f.id == id)
            .with_context(|| format!("Watched folder not found: {}", reference));
    }

    if reference.len() >= 4 {
        let matching: Vec<_> = folders
            .iter()
            .filter(|f| f.id.to_string().starts_with(reference))
            .collect();
        match matching.len() {
            1 => return Ok(matching[0]),
            0 => {}
            n => anyhow::bail!("Ambiguous folder prefix '{}': matches {} folders", reference, n),
        }
    }

    let by_name: Vec<_> = folders.iter().filter(|f| f.name == reference).collect();
    match by_name.len() {
        1 => return Ok(by_name[0]),
        0 => {}
        n => anyhow::bail!("Folder name '{}' is shared by {} folders, use the id", reference, n),
    }

    let wanted = Path::new(reference);
    folders
        .iter()
        .find(|f| f.path == wanted)
        .with_context(|| format!("Unknown folder reference: '{}'", reference))
}

/// Resolve a rule by full id, unique id prefix (4+ chars) or name
pub fn resolve_rule<'a>(folder: &'a WatchedFolder, reference: &str) -> Result<&'a Rule> {
    if let Ok(id) = reference.parse::<RuleId>() {
        return folder
            .rules
            .get(id)
            .with_context(|| format!("Rule not found in '{}': {}", folder.name, reference));
    }

    if reference.len() >= 4 {
        let matching: Vec<_> = folder
            .rules
            .iter()
            .filter(|r| r.id.to_string().starts_with(reference))
            .collect();
        match matching.len() {
            1 => return Ok(matching[0]),
            0 => {}
            n => anyhow::bail!("Ambiguous rule prefix '{}': matches {} rules", reference, n),
        }
    }

    folder
        .rules
        .iter()
        .find(|r| r.name == reference)
        .with_context(|| format!("Unknown rule reference in '{}': '{}'", folder.name, reference))
}

/// Parse `FIELD:OPERATOR:VALUE`
///
/// The value keeps any further colons. `Between` bounds are separated by
/// `..`, e.g. `FileSize:Between:1024..4096`. A `!` prefix on the operator
/// makes the comparison case-sensitive.
pub fn parse_condition(text: &str) -> Result<Condition> {
    let mut parts = text.splitn(3, ':');
    let (Some(field), Some(operator), Some(value)) = (parts.next(), parts.next(), parts.next())
    else {
        anyhow::bail!("Condition '{}' is not FIELD:OPERATOR:VALUE", text);
    };

    let field: ConditionField = field.trim().parse()?;
    let (case_sensitive, operator) = match operator.trim().strip_prefix('!') {
        Some(op) => (true, op),
        None => (false, operator.trim()),
    };
    let operator: Operator = operator.parse()?;

    let condition = if operator == Operator::Between {
        let (low, high) = value
            .split_once("..")
            .with_context(|| format!("Between needs LOW..HIGH, got '{}'", value))?;
        Condition::between(field, low, high)
    } else {
        Condition::new(field, operator, value)
    };
    Ok(condition.case_sensitive(case_sensitive))
}

/// Render a condition back into the form `parse_condition` accepts
pub fn format_condition(condition: &Condition) -> String {
    let bang = if condition.case_sensitive { "!" } else { "" };
    match &condition.second_value {
        Some(high) if condition.operator == Operator::Between => format!(
            "{}:{}{}:{}..{}",
            condition.field, bang, condition.operator, condition.value, high
        ),
        _ => format!(
            "{}:{}{}:{}",
            condition.field, bang, condition.operator, condition.value
        ),
    }
}

/// Colored status label
pub fn status_label(status: FolderStatus) -> String {
    match status {
        FolderStatus::Running => "running".green().to_string(),
        FolderStatus::Stopped => "stopped".dimmed().to_string(),
        FolderStatus::Error => "error".red().to_string(),
    }
}

/// Format timestamp as relative time ("2 hours ago")
pub fn format_relative_time(ts: DateTime<Utc>) -> String {
    let seconds = (Utc::now() - ts).num_seconds();
    if seconds < 0 {
        return "in the future".to_string();
    }

    if seconds < 60 {
        format!("{} seconds ago", seconds)
    } else if seconds < 3600 {
        format!("{} minutes ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{} hours ago", seconds / 3600)
    } else if seconds < 604800 {
        format!("{} days ago", seconds / 86400)
    } else {
        format!("{} weeks ago", seconds / 604800)
    }
}

/// Section header in the house style
pub fn print_header(title: &str) {
    println!("{}", title.bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
