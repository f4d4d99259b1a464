//! Persisted folder configuration
//!
//! The document is a JSON array of watched folders, each with its rules
//! nested inside. Runtime state (`status`, `last_error`) is never written
//! and is reset on load.

use af_core::{EngineError, FolderId, Result, RuleId, RuleSet, WatchedFolder};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Location of the folder configuration document
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every folder; a missing document is an empty list
    pub fn load(&self) -> Result<Vec<WatchedFolder>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No configuration at {:?}, starting empty", self.path);
                return Ok(Vec::new());
            }
            Err(e) => return Err(EngineError::config_io(&self.path, e)),
        };

        let mut folders: Vec<WatchedFolder> =
            serde_json::from_slice(&data).map_err(|e| EngineError::config_format(&self.path, e))?;
        for folder in &mut folders {
            folder.reset_runtime();
        }

        info!("Loaded {} watched folders from {:?}", folders.len(), self.path);
        Ok(folders)
    }

    /// Replace the document with `folders`
    pub fn save(&self, folders: &[WatchedFolder]) -> Result<()> {
        let data =
            serde_json::to_vec_pretty(folders).map_err(|e| EngineError::config_format(&self.path, e))?;
        atomic_write(&self.path, &data).map_err(|e| EngineError::config_io(&self.path, e))?;
        debug!("Saved {} watched folders to {:?}", folders.len(), self.path);
        Ok(())
    }
}

/// Write one folder (with its rules) as a standalone JSON object
pub fn export_folder(folder: &WatchedFolder, path: &Path) -> Result<()> {
    let data = serde_json::to_vec_pretty(folder).map_err(|e| EngineError::config_format(path, e))?;
    atomic_write(path, &data).map_err(|e| EngineError::config_io(path, e))
}

/// Read a folder written by `export_folder`
///
/// The folder and each rule get fresh ids so the import never collides with
/// the folder it was exported from. Counters and runtime state start over.
pub fn import_folder(path: &Path) -> Result<WatchedFolder> {
    let data = fs::read(path).map_err(|e| EngineError::config_io(path, e))?;
    let mut folder: WatchedFolder =
        serde_json::from_slice(&data).map_err(|e| EngineError::config_format(path, e))?;

    folder.id = FolderId::new();
    folder.rules = folder
        .rules
        .iter()
        .cloned()
        .map(|mut rule| {
            rule.id = RuleId::new();
            rule
        })
        .collect::<RuleSet>();
    folder.processed_count = 0;
    folder.last_event_at = None;
    folder.reset_runtime();
    Ok(folder)
}

/// Atomic write helper
///
/// Writes to a temporary sibling, fsyncs it, then renames it over `target`.
/// Parent directories are created as needed.
pub fn atomic_write(target: &Path, data: &[u8]) -> io::Result<()> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let file_name = target
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no file name"))?;
    let tmp = parent.join(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&tmp, target)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
