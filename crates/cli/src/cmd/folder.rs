//! Register, unregister and list watched folders

use crate::util::{self, AppPaths, Session};
use crate::FolderAddArgs;
use af_core::{EventKind, WatchedFolder};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::time::Duration;
use watcher::ExclusionRules;

pub fn add(paths: AppPaths, args: FolderAddArgs) -> Result<()> {
    let session = Session::open(paths)?;

    let path = if args.path.is_absolute() {
        args.path
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(args.path)
    };
    if !path.is_dir() {
        println!(
            "{} {} does not exist yet; it must before the folder can be watched",
            "Warning:".yellow(),
            path.display()
        );
    }

    let exclusions = if args.exclusions.is_empty() {
        ExclusionRules::defaults()
    } else {
        args.exclusions
    };
    let settle_ms = args
        .settle_ms
        .unwrap_or(session.settings.engine.default_settle_ms);

    let mut folder = WatchedFolder::new(&path)
        .with_filter(args.filter)
        .recursive(args.recursive)
        .with_exclusions(exclusions)
        .with_settle(Duration::from_millis(settle_ms));
    if let Some(name) = args.name {
        folder = folder.with_name(name);
    }
    if !args.events.is_empty() {
        let events = args
            .events
            .iter()
            .map(|e| e.parse::<EventKind>())
            .collect::<Result<Vec<_>, _>>()?;
        folder = folder.with_events(events);
    }

    let id = session
        .registry
        .create_watch_folder(folder)
        .context("Failed to register folder")?;
    session.save()?;

    let folder = session.registry.folder(id).context("Folder vanished after registration")?;
    println!(
        "{} {} {}",
        "Added folder".green(),
        folder.name.bold(),
        format!("({})", id.short()).dimmed()
    );
    println!("  Path:        {}", folder.path.display().to_string().cyan());
    println!("  Settle:      {} ms", folder.settle_ms);
    println!(
        "  {}",
        "Tip: add rules with 'af rule add', then watch with 'af run'".dimmed()
    );
    Ok(())
}

pub fn remove(paths: AppPaths, reference: &str) -> Result<()> {
    let session = Session::open(paths)?;
    let folder = session.folder(reference)?;

    session
        .registry
        .remove_watch_folder(folder.id)
        .context("Failed to remove folder")?;
    session.save()?;

    println!(
        "{} {} {}",
        "Removed folder".green(),
        folder.name.bold(),
        format!("({} rules)", folder.rules.len()).dimmed()
    );
    Ok(())
}

pub fn list(paths: AppPaths, json: bool) -> Result<()> {
    let session = Session::open(paths)?;
    let folders = session.registry.folders();

    if json {
        println!("{}", serde_json::to_string_pretty(&folders)?);
        return Ok(());
    }

    if folders.is_empty() {
        println!("{}", "No watched folders".dimmed());
        println!("  {}", "Tip: add one with 'af folder add <path>'".dimmed());
        return Ok(());
    }

    util::print_header("Watched Folders");
    for folder in &folders {
        println!();
        println!(
            "{} {} {}",
            folder.id.short().yellow(),
            folder.name.bold(),
            util::status_label(folder.status)
        );
        println!("  Path:        {}", folder.path.display().to_string().cyan());
        println!(
            "  Filter:      {}{}",
            folder.filter,
            if folder.include_subdirectories {
                " (recursive)"
            } else {
                ""
            }
        );
        let events: Vec<_> = folder.events.iter().map(|e| e.as_str()).collect();
        println!("  Events:      {}", events.join(", "));
        if !folder.exclusions.is_empty() {
            println!("  Excludes:    {}", folder.exclusions.join(" ").dimmed());
        }
        println!("  Settle:      {} ms", folder.settle_ms);
        println!("  Rules:       {}", folder.rules.len());
        match folder.last_event_at {
            Some(ts) => println!(
                "  Processed:   {} files, last {}",
                folder.processed_count,
                util::format_relative_time(ts)
            ),
            None => println!("  Processed:   {} files", folder.processed_count),
        }
    }
    Ok(())
}
