//! Engine settings file

use crate::util::{self, AppPaths};
use af_core::EngineSettings;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

pub fn show(paths: AppPaths) -> Result<()> {
    let settings = paths.load_settings()?;
    let file = paths.settings_file();

    util::print_header("Engine Settings");
    println!();
    let source = if file.exists() {
        file.display().to_string()
    } else {
        "built-in defaults".to_string()
    };
    println!("Source:                    {}", source.cyan());
    println!();

    let e = &settings.engine;
    println!("history_capacity          {}", e.history_capacity);
    println!("content_read_limit_bytes  {}", e.content_read_limit_bytes);
    println!("default_settle_ms         {}", e.default_settle_ms);
    println!("rename_attempt_limit      {}", e.rename_attempt_limit);
    Ok(())
}

pub fn path(paths: AppPaths) -> Result<()> {
    println!("Home:          {}", paths.home.display().to_string().cyan());
    println!("Folders:       {}", paths.folders_file().display());
    println!("Settings:      {}", paths.settings_file().display());
    Ok(())
}

pub fn init(paths: AppPaths, force: bool) -> Result<()> {
    let file = paths.settings_file();
    if file.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            file.display()
        );
    }

    EngineSettings::default()
        .save(&file)
        .with_context(|| format!("Failed to write {}", file.display()))?;
    println!("{} {}", "Wrote default settings to".green(), file.display());
    Ok(())
}
