//! Destination and rename templates
//!
//! Placeholders are written `{name}` or `{name:arg}`. Unknown placeholders
//! and unbalanced braces are copied through unchanged.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Rendered in place of `{ext}` in destinations when the file has no extension
pub const NO_EXTENSION: &str = "no_extension";

/// Values available to a rename pattern
#[derive(Debug, Clone)]
pub struct RenameContext {
    pub now: DateTime<Local>,
    pub size: u64,
    /// Value rendered for `{n}`
    pub counter: u64,
    /// Value rendered for `{guid}`
    pub token: String,
}

impl RenameContext {
    /// Context for one rename of a file of `size` bytes
    ///
    /// The counter is not persisted between renames, so `{n}` always renders
    /// as 1.
    pub fn new(size: u64) -> Self {
        Self {
            now: Local::now(),
            size,
            counter: 1,
            token: Uuid::new_v4().simple().to_string()[..8].to_string(),
        }
    }
}

/// Expand a destination template for `source`
///
/// Supports `{date}`, `{year}`, `{month}`, `{day}` and `{ext}`.
pub fn expand_destination(template: &str, source: &Path, now: DateTime<Local>) -> PathBuf {
    let ext = source
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| NO_EXTENSION.to_string());

    let rendered = render(template, |name, _| match name {
        "date" => Some(now.format("%Y-%m-%d").to_string()),
        "year" => Some(now.format("%Y").to_string()),
        "month" => Some(now.format("%m").to_string()),
        "day" => Some(now.format("%d").to_string()),
        "ext" => Some(ext.clone()),
        _ => None,
    });
    PathBuf::from(rendered)
}

/// Expand a rename pattern into a new file name for `source`
///
/// Supports `{name}`, `{ext}`, `{date}`, `{time}`, `{size}`, `{guid}` and
/// `{n}` / `{n:width}`.
pub fn expand_rename(pattern: &str, source: &Path, ctx: &RenameContext) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = source
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();

    let rendered = render(pattern, |name, arg| match name {
        "name" => Some(stem.clone()),
        "ext" => Some(ext.clone()),
        "date" => Some(ctx.now.format("%Y-%m-%d").to_string()),
        "time" => Some(ctx.now.format("%H-%M-%S").to_string()),
        "size" => Some(ctx.size.to_string()),
        "guid" => Some(ctx.token.clone()),
        "n" => {
            let width = arg.and_then(|w| w.trim().parse::<usize>().ok()).unwrap_or(1);
            Some(format!("{:0width$}", ctx.counter, width = width))
        }
        _ => None,
    });

    rendered.trim().trim_end_matches('.').to_string()
}

/// Substitute every `{name[:arg]}` the resolver knows
fn render<F>(template: &str, resolve: F) -> String
where
    F: Fn(&str, Option<&str>) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };

        let inner = &after[..close];
        let (name, arg) = match inner.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (inner, None),
        };

        match resolve(&name.to_ascii_lowercase(), arg) {
            Some(value) => out.push_str(&value),
            None => {
                out.push('{');
                out.push_str(inner);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}
