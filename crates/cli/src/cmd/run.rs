//! Watch every folder in the foreground

use crate::util::{self, AppPaths, Session};
use af_core::FolderId;
use anyhow::{Context, Result};
use chrono::Local;
use engine::EngineEvent;
use owo_colors::OwoColorize;
use std::collections::HashMap;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

pub async fn run(paths: AppPaths) -> Result<()> {
    let session = Session::open(paths)?;
    let folders = session.registry.folders();
    if folders.is_empty() {
        println!("{}", "No watched folders".dimmed());
        println!("  {}", "Tip: add one with 'af folder add <path>'".dimmed());
        return Ok(());
    }
    let names: HashMap<FolderId, String> = folders.iter().map(|f| (f.id, f.name.clone())).collect();

    // Subscribe first so start-up failures are streamed too
    let mut events = session.registry.subscribe();
    let failures = session.registry.start_all();

    util::print_header("Autofile");
    println!();
    let running = folders.len() - failures.len();
    println!("Watching:      {} of {} folders", running.to_string().green(), folders.len());
    for (id, err) in &failures {
        let name = names.get(id).map(String::as_str).unwrap_or("?");
        println!("  {} {}: {}", "✗".red(), name.bold(), err);
    }
    println!("  {}", "Press Ctrl-C to stop".dimmed());
    println!();

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
            received = events.recv() => match received {
                Ok(event) => print_event(&event, &names),
                Err(RecvError::Lagged(n)) => warn!("Terminal fell behind, {} events not shown", n),
                Err(RecvError::Closed) => break,
            },
        }
    }

    println!();
    println!("{}", "Stopping...".dimmed());
    session.registry.stop_all();
    session.save()?;

    let history = session.registry.history(None, usize::MAX);
    let failed = history.iter().filter(|e| !e.success).count();
    info!("Stopped after {} rule executions", history.len());
    println!(
        "{} {} rule executions, {} not successful",
        "Stopped:".bold(),
        history.len(),
        failed
    );
    Ok(())
}

fn print_event(event: &EngineEvent, names: &HashMap<FolderId, String>) {
    let now = Local::now().format("%H:%M:%S").to_string();
    let folder = event
        .folder_id()
        .and_then(|id| names.get(&id))
        .map(String::as_str)
        .unwrap_or("engine");

    match event {
        EngineEvent::FileEventDetected { kind, path, old_path, .. } => {
            let from = old_path
                .as_ref()
                .map(|p| format!(" (from {})", p.display()))
                .unwrap_or_default();
            println!(
                "{} {} {:<8} {}{}",
                now.dimmed(),
                folder.cyan(),
                kind.to_string(),
                path.display(),
                from.dimmed()
            );
        }
        EngineEvent::RuleExecuted {
            rule_name,
            path,
            destination,
            action,
            success,
            error,
            ..
        } => {
            let target = destination
                .as_ref()
                .map(|d| format!(" -> {}", d.display()))
                .unwrap_or_default();
            let mark = match (success, error) {
                (true, _) => "✓".green().to_string(),
                (false, None) => "-".yellow().to_string(),
                (false, Some(_)) => "✗".red().to_string(),
            };
            println!(
                "{} {} {} {} {} {}{}",
                now.dimmed(),
                folder.cyan(),
                mark,
                rule_name.bold(),
                action,
                path.display(),
                target.dimmed()
            );
            if let Some(error) = error {
                println!("         {}", error.red());
            }
        }
        EngineEvent::ErrorOccurred { message, category, .. } => {
            println!(
                "{} {} {} {}",
                now.dimmed(),
                folder.cyan(),
                format!("[{}]", category).red(),
                message
            );
        }
    }
}
