//! Autofile CLI - af command

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod cmd;
mod util;

/// Autofile - rule-driven file organisation for watched folders
#[derive(Parser)]
#[command(name = "af")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory holding folders.json and config.toml
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch every configured folder until Ctrl-C
    Run {
        /// Also write a daily rolling log file into this directory
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// Manage watched folders
    #[command(subcommand)]
    Folder(FolderCommands),
    /// Manage the rules of a folder
    #[command(subcommand)]
    Rule(RuleCommands),
    /// Apply a folder's rules to the files already in it
    Process {
        /// Folder id, id prefix, name or path
        folder: String,
        /// Report what would happen without touching any file
        #[arg(long)]
        dry_run: bool,
    },
    /// Check whether a rule's conditions hold for a file
    Test {
        folder: String,
        /// Rule id, id prefix or name
        rule: String,
        path: PathBuf,
    },
    /// Write one folder and its rules to a JSON file
    Export { folder: String, file: PathBuf },
    /// Add a folder from a file written by `export`
    Import { file: PathBuf },
    /// Inspect or create the engine settings file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum FolderCommands {
    /// Register a directory
    Add(FolderAddArgs),
    /// Unregister a folder
    Remove { folder: String },
    /// List registered folders
    List {
        /// Print the folder definitions as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
pub struct FolderAddArgs {
    pub path: PathBuf,
    /// Display name (defaults to the directory name)
    #[arg(long)]
    pub name: Option<String>,
    /// Inclusion glob matched against file names
    #[arg(long, default_value = "*")]
    pub filter: String,
    /// Watch subdirectories too
    #[arg(short, long)]
    pub recursive: bool,
    /// Monitored event kinds: created, changed, deleted, renamed
    /// (default: created and renamed)
    #[arg(long = "event", value_name = "KIND")]
    pub events: Vec<String>,
    /// Exclusion pattern; replaces the built-in list when given
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclusions: Vec<String>,
    /// Settle time in milliseconds (default from config.toml)
    #[arg(long)]
    pub settle_ms: Option<u64>,
}

#[derive(Subcommand)]
enum RuleCommands {
    /// Add a rule to a folder
    Add(RuleAddArgs),
    /// Remove a rule from a folder
    Remove { folder: String, rule: String },
    /// List a folder's rules in evaluation order
    List { folder: String },
}

#[derive(Args)]
pub struct RuleAddArgs {
    pub folder: String,
    pub name: String,
    /// Action kind: move, copy, delete, rename, compress, run-script,
    /// create-symlink, notify, add-tag
    #[arg(long)]
    pub action: String,
    /// Condition as FIELD:OPERATOR:VALUE (repeatable)
    #[arg(short = 'w', long = "when", value_name = "CONDITION")]
    pub conditions: Vec<String>,
    /// How conditions combine: all, any, none
    #[arg(long, default_value = "all")]
    pub logic: String,
    /// Lower values are evaluated first
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    pub priority: i32,
    /// Destination template for move, copy, compress and create-symlink
    #[arg(long)]
    pub dest: Option<String>,
    /// Rename template, e.g. "{name}_{date}.{ext}"
    #[arg(long)]
    pub rename: Option<String>,
    /// Conflict policy: skip, overwrite, overwrite-if-newer, rename
    #[arg(long)]
    pub conflict: Option<String>,
    /// Program started by run-script
    #[arg(long)]
    pub script: Option<PathBuf>,
    /// Argument string for run-script; {file} is the quoted source path
    #[arg(long)]
    pub args: Option<String>,
    /// Add the rule disabled
    #[arg(long)]
    pub disabled: bool,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective settings
    Show,
    /// Print the data directory and file locations
    Path,
    /// Write a settings file with default values
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Install the subscriber; keep the guard alive to flush the log file
///
/// `RUST_LOG` overrides `default_level`.
fn init_tracing(log_dir: Option<&Path>, default_level: &str) -> Option<WorkerGuard> {
    let filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_dir {
        Some(dir) => {
            let file = tracing_appender::rolling::daily(dir, "autofile.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(non_blocking)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // One-shot commands keep the terminal for their own output
    let _guard = match &cli.command {
        Commands::Run { log_dir } => init_tracing(log_dir.as_deref(), "info"),
        _ => init_tracing(None, "warn"),
    };

    let paths = util::AppPaths::resolve(cli.home)?;

    match cli.command {
        Commands::Run { .. } => cmd::run::run(paths).await,
        Commands::Folder(folder_cmd) => match folder_cmd {
            FolderCommands::Add(args) => cmd::folder::add(paths, args),
            FolderCommands::Remove { folder } => cmd::folder::remove(paths, &folder),
            FolderCommands::List { json } => cmd::folder::list(paths, json),
        },
        Commands::Rule(rule_cmd) => match rule_cmd {
            RuleCommands::Add(args) => cmd::rule::add(paths, args),
            RuleCommands::Remove { folder, rule } => cmd::rule::remove(paths, &folder, &rule),
            RuleCommands::List { folder } => cmd::rule::list(paths, &folder),
        },
        Commands::Process { folder, dry_run } => cmd::process::run(paths, &folder, dry_run).await,
        Commands::Test { folder, rule, path } => cmd::test::run(paths, &folder, &rule, &path),
        Commands::Export { folder, file } => cmd::transfer::export(paths, &folder, &file),
        Commands::Import { file } => cmd::transfer::import(paths, &file),
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => cmd::config::show(paths),
            ConfigCommands::Path => cmd::config::path(paths),
            ConfigCommands::Init { force } => cmd::config::init(paths, force),
        },
    }
}
