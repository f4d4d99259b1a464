//! Engine settings stored as TOML
//!
//! ```toml
//! [engine]
//! history_capacity = 10000
//! content_read_limit_bytes = 10485760
//! default_settle_ms = 1000
//! rename_attempt_limit = 9999
//! ```

use crate::condition::{EvalOptions, DEFAULT_CONTENT_READ_LIMIT};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level settings document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default)]
    pub engine: EngineSection,
}

/// `[engine]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSection {
    /// Maximum execution history entries kept in memory
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Largest file read by `ContentContains` conditions
    #[serde(default = "default_content_read_limit")]
    pub content_read_limit_bytes: u64,

    /// Settle time given to folders created without one
    #[serde(default = "default_settle_ms")]
    pub default_settle_ms: u64,

    /// Highest `(n)` suffix tried when resolving a name conflict
    #[serde(default = "default_rename_attempt_limit")]
    pub rename_attempt_limit: u32,
}

fn default_history_capacity() -> usize {
    10_000
}

fn default_content_read_limit() -> u64 {
    DEFAULT_CONTENT_READ_LIMIT
}

fn default_settle_ms() -> u64 {
    1_000
}

fn default_rename_attempt_limit() -> u32 {
    9_999
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            content_read_limit_bytes: default_content_read_limit(),
            default_settle_ms: default_settle_ms(),
            rename_attempt_limit: default_rename_attempt_limit(),
        }
    }
}

impl EngineSettings {
    /// Load settings from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(EngineError::config_io(path, e)),
        };

        let settings: Self = toml::from_str(&text).map_err(|e| EngineError::config_format(path, e))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Write settings to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::config_io(parent, e))?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| EngineError::config_format(path, e))?;
        std::fs::write(path, text).map_err(|e| EngineError::config_io(path, e))
    }

    /// Check every value is within its supported range
    pub fn validate(&self) -> Result<()> {
        let e = &self.engine;
        if !(100..=1_000_000).contains(&e.history_capacity) {
            return Err(EngineError::InvalidConfig(format!(
                "history_capacity must be 100-1,000,000 (got {})",
                e.history_capacity
            )));
        }
        if !(1024..=1024 * 1024 * 1024).contains(&e.content_read_limit_bytes) {
            return Err(EngineError::InvalidConfig(format!(
                "content_read_limit_bytes must be 1 KiB-1 GiB (got {})",
                e.content_read_limit_bytes
            )));
        }
        if e.default_settle_ms > 600_000 {
            return Err(EngineError::InvalidConfig(format!(
                "default_settle_ms must be 0-600,000 (got {})",
                e.default_settle_ms
            )));
        }
        if e.rename_attempt_limit == 0 {
            return Err(EngineError::InvalidConfig(
                "rename_attempt_limit must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Condition evaluation options derived from these settings
    pub fn eval_options(&self) -> EvalOptions {
        EvalOptions {
            content_read_limit: self.engine.content_read_limit_bytes,
        }
    }
}
