//! Apply a folder's rules to its existing files

use crate::util::{self, AppPaths, Session};
use actions::ActionOutcome;
use anyhow::{Context, Result};
use engine::{FileDisposition, FileResult};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

pub async fn run(paths: AppPaths, reference: &str, dry_run: bool) -> Result<()> {
    let session = Session::open(paths)?;
    let folder = session.folder(reference)?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {wide_msg}")
            .context("Invalid progress template")?
            .progress_chars("=> "),
    );

    let result = session
        .registry
        .process_existing(folder.id, dry_run, |progress| {
            pb.set_length(progress.total as u64);
            pb.set_position(progress.processed as u64);
            if let Some(name) = progress.current.file_name() {
                pb.set_message(name.to_string_lossy().into_owned());
            }
        })
        .await;
    pb.finish_and_clear();
    let result = result.with_context(|| format!("Failed to process {}", folder.name))?;

    let title = if dry_run {
        format!("Dry run: {}", folder.name)
    } else {
        format!("Processed: {}", folder.name)
    };
    util::print_header(&title);
    println!();

    for file in result.files.iter().filter(|f| f.is_matched()) {
        print_file(file, &folder.path);
    }
    if result.matched > 0 {
        println!();
    }

    println!("Files:         {}", result.total);
    println!("Matched:       {}", result.matched.to_string().green());
    println!("Unmatched:     {}", result.unmatched.to_string().dimmed());
    if !dry_run {
        println!("Skipped:       {}", result.skipped.to_string().yellow());
        println!("Errors:        {}", result.errored.to_string().red());
        session.save()?;
    }
    Ok(())
}

fn print_file(file: &FileResult, root: &std::path::Path) {
    let shown = file.path.strip_prefix(root).unwrap_or(&file.path).display().to_string();
    let rule = file.rule_name.as_deref().unwrap_or_default();
    let action = file.action.map(|a| a.to_string()).unwrap_or_default();

    match &file.disposition {
        FileDisposition::Unmatched => {}
        FileDisposition::Previewed { destination } => {
            let target = destination
                .as_ref()
                .map(|d| format!(" -> {}", d.display()))
                .unwrap_or_default();
            println!(
                "  {} {} {}{}",
                "would".cyan(),
                action,
                shown,
                target.dimmed()
            );
            println!("        {}", format!("rule: {}", rule).dimmed());
        }
        FileDisposition::Executed(outcome) => match outcome {
            ActionOutcome::Completed { destination } => {
                let target = destination
                    .as_ref()
                    .map(|d| format!(" -> {}", d.display()))
                    .unwrap_or_default();
                println!("  {} {} {}{}", "✓".green(), action, shown, target.dimmed());
            }
            ActionOutcome::Skipped { reason } => {
                println!("  {} {} {} {}", "-".yellow(), action, shown, format!("({})", reason).dimmed());
            }
            ActionOutcome::Failed { error } => {
                println!("  {} {} {} {}", "✗".red(), action, shown, error.red());
            }
        },
    }
}
