//! Add, remove and list rules

use crate::util::{self, AppPaths, Session};
use crate::RuleAddArgs;
use af_core::{Action, ActionKind, ConflictPolicy, MatchLogic, Rule};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

/// Assemble the rule described on the command line
fn build_rule(args: RuleAddArgs) -> Result<Rule> {
    let kind: ActionKind = args.action.parse()?;
    let mut action = Action::new(kind);
    if let Some(dest) = args.dest {
        action = action.with_destination(dest);
    }
    if let Some(pattern) = args.rename {
        action.rename_pattern = pattern;
    }
    if let Some(conflict) = args.conflict {
        action = action.with_conflict(conflict.parse::<ConflictPolicy>()?);
    }
    action.script_path = args.script;
    action.script_arguments = args.args;

    let mut rule = Rule::new(args.name, action)
        .with_priority(args.priority)
        .with_logic(args.logic.parse::<MatchLogic>()?);
    for raw in &args.conditions {
        rule = rule.with_condition(util::parse_condition(raw)?);
    }
    if args.disabled {
        rule = rule.disabled();
    }

    rule.validate()?;
    Ok(rule)
}

pub fn add(paths: AppPaths, args: RuleAddArgs) -> Result<()> {
    let session = Session::open(paths)?;
    let folder = session.folder(&args.folder)?;
    let rule = build_rule(args)?;
    let name = rule.name.clone();

    let rule_id = session
        .registry
        .add_rule(folder.id, rule)
        .context("Failed to add rule")?;
    session.save()?;

    println!(
        "{} {} to {} {}",
        "Added rule".green(),
        name.bold(),
        folder.name.bold(),
        format!("({})", rule_id.short()).dimmed()
    );
    Ok(())
}

pub fn remove(paths: AppPaths, folder_ref: &str, rule_ref: &str) -> Result<()> {
    let session = Session::open(paths)?;
    let folder = session.folder(folder_ref)?;
    let rule_id = util::resolve_rule(&folder, rule_ref)?.id;

    let removed = session
        .registry
        .remove_rule(folder.id, rule_id)
        .context("Failed to remove rule")?;
    session.save()?;

    println!(
        "{} {} from {}",
        "Removed rule".green(),
        removed.name.bold(),
        folder.name.bold()
    );
    Ok(())
}

pub fn list(paths: AppPaths, folder_ref: &str) -> Result<()> {
    let session = Session::open(paths)?;
    let folder = session.folder(folder_ref)?;

    util::print_header(&format!("Rules for {}", folder.name));
    if folder.rules.is_empty() {
        println!();
        println!("{}", "No rules".dimmed());
        return Ok(());
    }

    for rule in folder.rules.iter() {
        println!();
        let state = if rule.enabled {
            String::new()
        } else {
            format!(" {}", "(disabled)".dimmed())
        };
        println!(
            "{} {} {}{}",
            rule.id.short().yellow(),
            rule.name.bold(),
            format!("priority {}", rule.priority).dimmed(),
            state
        );
        if rule.conditions.is_empty() {
            println!("  When:        {}", "always".dimmed());
        } else {
            println!("  When {:<7} {}", format!("{}:", rule.logic), util::format_condition(&rule.conditions[0]));
            for condition in &rule.conditions[1..] {
                println!("               {}", util::format_condition(condition));
            }
        }

        let action = &rule.action;
        let mut detail = action.kind.to_string().cyan().to_string();
        if !action.destination.is_empty() {
            detail.push_str(&format!(" -> {}", action.destination));
        }
        if !action.rename_pattern.is_empty() {
            detail.push_str(&format!(" as {}", action.rename_pattern));
        }
        if let Some(script) = &action.script_path {
            detail.push_str(&format!(" {}", script.display()));
        }
        println!("  Then:        {} {}", detail, format!("[{}]", action.conflict).dimmed());
    }
    Ok(())
}
