//! Invoke the `af` binary against throwaway data directories

mod common;

use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

struct Fixture {
    _temp_dir: TempDir,
    home: PathBuf,
    watch: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let home = temp_dir.path().join("home");
        let watch = temp_dir.path().join("inbox");
        fs::create_dir_all(&watch).unwrap();
        Self {
            home,
            watch,
            _temp_dir: temp_dir,
        }
    }

    fn watch_str(&self) -> &str {
        self.watch.to_str().unwrap()
    }

    fn add_inbox(&self) -> Result<()> {
        af!(&self.home, "folder", "add", self.watch_str(), "--name", "Inbox").assert_success()?;
        Ok(())
    }

    fn folders_json(&self) -> Result<Vec<serde_json::Value>> {
        let result = af!(&self.home, "folder", "list", "--json").assert_success()?;
        let value: serde_json::Value = serde_json::from_str(&result.stdout)?;
        Ok(value.as_array().cloned().unwrap_or_default())
    }
}

#[test]
fn folder_add_persists_with_defaults() -> Result<()> {
    let fx = Fixture::new();
    let result = af!(&fx.home, "folder", "add", fx.watch_str(), "--name", "Inbox").assert_success()?;
    assert!(result.contains_stdout("Inbox"));
    assert!(result.parse_short_id().is_some());
    assert!(fx.home.join("folders.json").exists());

    let folders = fx.folders_json()?;
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0]["name"], "Inbox");
    assert_eq!(folders[0]["settle_ms"], 1000);
    assert_eq!(folders[0]["events"], serde_json::json!(["Created", "Renamed"]));
    let exclusions = folders[0]["exclusions"].as_array().unwrap();
    assert!(exclusions.iter().any(|p| p == "*.crdownload"));

    let listed = af!(&fx.home, "folder", "list").assert_success()?;
    assert!(listed.contains_stdout("Inbox"));
    assert!(listed.contains_stdout("stopped"));
    Ok(())
}

#[test]
fn folder_remove_by_name() -> Result<()> {
    let fx = Fixture::new();
    fx.add_inbox()?;

    af!(&fx.home, "folder", "remove", "Inbox").assert_success()?;
    assert!(fx.folders_json()?.is_empty());

    let result = af!(&fx.home, "folder", "remove", "Inbox").assert_failure()?;
    assert!(result.contains_stderr("Unknown folder reference"));
    Ok(())
}

#[test]
fn rule_add_list_remove() -> Result<()> {
    let fx = Fixture::new();
    fx.add_inbox()?;

    af!(
        &fx.home, "rule", "add", "Inbox", "Drop logs", "--action", "delete", "--when",
        "extension:equals:log", "--priority", "5"
    )
    .assert_success()?;

    let listed = af!(&fx.home, "rule", "list", "Inbox").assert_success()?;
    assert!(listed.contains_stdout("Drop logs"));
    assert!(listed.contains_stdout("Extension:Equals:log"));

    af!(&fx.home, "rule", "remove", "Inbox", "Drop logs").assert_success()?;
    let listed = af!(&fx.home, "rule", "list", "Inbox").assert_success()?;
    assert!(listed.contains_stdout("No rules"));
    Ok(())
}

#[test]
fn rule_add_rejects_incomplete_action() -> Result<()> {
    let fx = Fixture::new();
    fx.add_inbox()?;

    let result = af!(&fx.home, "rule", "add", "Inbox", "Move it", "--action", "move").assert_failure()?;
    assert!(result.contains_stderr("missing its target"));
    Ok(())
}

#[test]
fn process_dry_run_then_live() -> Result<()> {
    let fx = Fixture::new();
    fx.add_inbox()?;
    fs::write(fx.watch.join("a.log"), "a")?;
    fs::write(fx.watch.join("b.txt"), "b")?;
    af!(
        &fx.home, "rule", "add", "Inbox", "Drop logs", "--action", "delete", "--when",
        "extension:equals:log"
    )
    .assert_success()?;

    let dry = af!(&fx.home, "process", "Inbox", "--dry-run").assert_success()?;
    assert!(dry.contains_stdout("would"));
    assert!(dry.contains_stdout("a.log"));
    assert!(fx.watch.join("a.log").exists());

    af!(&fx.home, "process", "Inbox").assert_success()?;
    assert!(!fx.watch.join("a.log").exists());
    assert!(fx.watch.join("b.txt").exists());

    let folders = fx.folders_json()?;
    assert_eq!(folders[0]["processed_count"], 1);
    Ok(())
}

#[test]
fn test_command_reports_match() -> Result<()> {
    let fx = Fixture::new();
    fx.add_inbox()?;
    let pdf = fx.watch.join("scan.pdf");
    fs::write(&pdf, "pdf")?;
    af!(
        &fx.home, "rule", "add", "Inbox", "Pdfs", "--action", "notify", "--when",
        "extension:equals:pdf"
    )
    .assert_success()?;

    let hit = af!(&fx.home, "test", "Inbox", "Pdfs", pdf.to_str().unwrap()).assert_success()?;
    assert!(hit.contains_stdout("Rule matches"));

    let miss = af!(&fx.home, "test", "Inbox", "Pdfs", fx.watch.join("x.txt").to_str().unwrap())
        .assert_success()?;
    assert!(miss.contains_stdout("Rule does not match"));
    Ok(())
}

#[test]
fn test_command_on_missing_file_still_checks_names() -> Result<()> {
    let fx = Fixture::new();
    fx.add_inbox()?;
    af!(
        &fx.home, "rule", "add", "Inbox", "Pdfs", "--action", "notify", "--when",
        "extension:equals:pdf"
    )
    .assert_success()?;

    let ghost = fx.watch.join("ghost.pdf");
    let result = af!(&fx.home, "test", "Inbox", "Pdfs", ghost.to_str().unwrap()).assert_success()?;
    assert!(result.contains_stdout("conditions that read its metadata or content are false"));
    assert!(result.contains_stdout("Rule matches"));
    Ok(())
}

#[test]
fn export_then_import_adds_copy() -> Result<()> {
    let fx = Fixture::new();
    fx.add_inbox()?;
    af!(&fx.home, "rule", "add", "Inbox", "Ping", "--action", "notify").assert_success()?;

    let export = fx.home.join("inbox-export.json");
    af!(&fx.home, "export", "Inbox", export.to_str().unwrap()).assert_success()?;
    assert!(export.exists());

    let imported = af!(&fx.home, "import", export.to_str().unwrap()).assert_success()?;
    assert!(imported.contains_stdout("1 rules"));

    let folders = fx.folders_json()?;
    assert_eq!(folders.len(), 2);
    assert_ne!(folders[0]["id"], folders[1]["id"]);
    assert_ne!(folders[0]["rules"][0]["id"], folders[1]["rules"][0]["id"]);

    // Names are now ambiguous
    af!(&fx.home, "rule", "list", "Inbox").assert_failure()?;
    Ok(())
}

#[test]
fn config_init_show_and_path() -> Result<()> {
    let fx = Fixture::new();

    let shown = af!(&fx.home, "config", "show").assert_success()?;
    assert!(shown.contains_stdout("built-in defaults"));

    af!(&fx.home, "config", "init").assert_success()?;
    assert!(fx.home.join("config.toml").exists());
    af!(&fx.home, "config", "init").assert_failure()?;
    af!(&fx.home, "config", "init", "--force").assert_success()?;

    fs::write(
        fx.home.join("config.toml"),
        "[engine]\ndefault_settle_ms = 250\n",
    )?;
    let shown = af!(&fx.home, "config", "show").assert_success()?;
    assert!(shown.contains_stdout("250"));

    af!(&fx.home, "folder", "add", fx.watch_str()).assert_success()?;
    assert_eq!(fx.folders_json()?[0]["settle_ms"], 250);

    let path = af!(&fx.home, "config", "path").assert_success()?;
    assert!(path.contains_stdout("folders.json"));
    Ok(())
}

#[test]
fn home_flag_overrides_environment() -> Result<()> {
    let fx = Fixture::new();
    let other = fx.home.join("elsewhere");

    af!(&fx.home, "--home", other.to_str().unwrap(), "folder", "add", fx.watch_str())
        .assert_success()?;
    assert!(other.join("folders.json").exists());
    assert!(!fx.home.join("folders.json").exists());
    Ok(())
}

#[test]
fn invalid_settings_are_reported() -> Result<()> {
    let fx = Fixture::new();
    fs::create_dir_all(&fx.home)?;
    fs::write(fx.home.join("config.toml"), "[engine]\nhistory_capacity = 5\n")?;

    let result = af!(&fx.home, "folder", "list").assert_failure()?;
    assert!(result.contains_stderr("history_capacity"));
    Ok(())
}
