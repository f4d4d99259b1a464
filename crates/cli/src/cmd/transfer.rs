//! Export and import single folder definitions

use crate::util::{AppPaths, Session};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;

pub fn export(paths: AppPaths, reference: &str, file: &Path) -> Result<()> {
    let session = Session::open(paths)?;
    let folder = session.folder(reference)?;

    session
        .registry
        .export_folder(folder.id, file)
        .with_context(|| format!("Failed to export {}", folder.name))?;

    println!(
        "{} {} to {}",
        "Exported".green(),
        folder.name.bold(),
        file.display().to_string().cyan()
    );
    Ok(())
}

pub fn import(paths: AppPaths, file: &Path) -> Result<()> {
    let session = Session::open(paths)?;

    let id = session
        .registry
        .import_folder(file)
        .with_context(|| format!("Failed to import {}", file.display()))?;
    session.save()?;

    let folder = session.registry.folder(id).context("Folder vanished after import")?;
    println!(
        "{} {} {}",
        "Imported".green(),
        folder.name.bold(),
        format!("({}, {} rules)", id.short(), folder.rules.len()).dimmed()
    );
    Ok(())
}
