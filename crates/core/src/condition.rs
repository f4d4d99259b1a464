//! Condition evaluation against live file metadata
//!
//! Evaluation never fails: a field that cannot be read (file vanished,
//! unsupported timestamp, content over the read limit) makes the condition
//! false.

use crate::rule::{Condition, ConditionField, Operator};
use chrono::{DateTime, Local};
use regex::RegexBuilder;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::Path;
use tracing::trace;

/// Largest file `ContentContains` will read (10 MiB)
pub const DEFAULT_CONTENT_READ_LIMIT: u64 = 10 * 1024 * 1024;

/// Knobs for condition evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalOptions {
    /// Files larger than this never satisfy a `ContentContains` condition
    pub content_read_limit: u64,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            content_read_limit: DEFAULT_CONTENT_READ_LIMIT,
        }
    }
}

impl Condition {
    /// Evaluate against `path` with default options
    pub fn evaluate(&self, path: &Path) -> bool {
        self.evaluate_with(path, &EvalOptions::default())
    }

    /// Evaluate against `path`
    pub fn evaluate_with(&self, path: &Path, options: &EvalOptions) -> bool {
        match field_value(self.field, path, options) {
            Ok(Some(actual)) => self.compare(&actual),
            Ok(None) => false,
            Err(e) => {
                trace!("Condition on {} unreadable for {}: {}", self.field, path.display(), e);
                false
            }
        }
    }

    /// Apply the operator to an already extracted field value
    pub fn compare(&self, actual: &str) -> bool {
        let cs = self.case_sensitive;
        let expected = self.normalize_expected(&self.value);

        match self.operator {
            Operator::Equals => text_eq(actual, &expected, cs),
            Operator::NotEquals => !text_eq(actual, &expected, cs),
            Operator::Contains => fold(actual, cs).contains(fold(&expected, cs).as_ref()),
            Operator::NotContains => !fold(actual, cs).contains(fold(&expected, cs).as_ref()),
            Operator::StartsWith => fold(actual, cs).starts_with(fold(&expected, cs).as_ref()),
            Operator::EndsWith => fold(actual, cs).ends_with(fold(&expected, cs).as_ref()),
            Operator::MatchesRegex => RegexBuilder::new(&self.value)
                .case_insensitive(!cs)
                .build()
                .map(|re| re.is_match(actual))
                .unwrap_or(false),
            Operator::GreaterThan => order(actual, &expected) == Ordering::Greater,
            Operator::LessThan => order(actual, &expected) == Ordering::Less,
            Operator::Between => match &self.second_value {
                Some(high) => {
                    let high = self.normalize_expected(high);
                    order(actual, &expected) != Ordering::Less
                        && order(actual, &high) != Ordering::Greater
                }
                None => false,
            },
            Operator::In => self
                .value
                .split([',', ';'])
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .any(|token| text_eq(actual, &self.normalize_expected(token), cs)),
        }
    }

    /// Extensions are compared without their leading dot
    fn normalize_expected<'a>(&self, value: &'a str) -> Cow<'a, str> {
        if self.field == ConditionField::Extension {
            Cow::Borrowed(value.trim().trim_start_matches('.'))
        } else {
            Cow::Borrowed(value)
        }
    }
}

/// Extract the comparison value for `field`
///
/// `Ok(None)` means the field has no value for this file.
fn field_value(field: ConditionField, path: &Path, options: &EvalOptions) -> io::Result<Option<String>> {
    let value = match field {
        ConditionField::FileName => path.file_name().map(|n| n.to_string_lossy().into_owned()),
        ConditionField::Extension => Some(
            path.extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
        ),
        ConditionField::FullPath => Some(path.to_string_lossy().into_owned()),
        ConditionField::FileSize => Some(fs::metadata(path)?.len().to_string()),
        ConditionField::DateModified => Some(format_time(fs::metadata(path)?.modified()?)),
        ConditionField::DateCreated => Some(format_time(fs::metadata(path)?.created()?)),
        ConditionField::Attributes => Some(attributes(path)?),
        ConditionField::ContentContains => {
            let len = fs::metadata(path)?.len();
            if len > options.content_read_limit {
                trace!(
                    "Skipping content of {} ({} bytes over limit {})",
                    path.display(),
                    len,
                    options.content_read_limit
                );
                return Ok(None);
            }
            let bytes = fs::read(path)?;
            Some(String::from_utf8_lossy(&bytes).into_owned())
        }
    };
    Ok(value)
}

/// Timestamps render as `YYYY-MM-DD HH:MM:SS` local time, which orders
/// correctly under ordinal comparison
pub fn format_time(time: std::time::SystemTime) -> String {
    DateTime::<Local>::from(time).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Comma-separated attribute flags, or `Normal`
fn attributes(path: &Path) -> io::Result<String> {
    let meta = fs::symlink_metadata(path)?;
    let mut flags = Vec::new();

    if meta.permissions().readonly() {
        flags.push("ReadOnly");
    }
    if is_hidden(path, &meta) {
        flags.push("Hidden");
    }
    if meta.is_dir() {
        flags.push("Directory");
    }
    if meta.file_type().is_symlink() {
        flags.push("ReparsePoint");
    }

    if flags.is_empty() {
        Ok("Normal".to_string())
    } else {
        Ok(flags.join(", "))
    }
}

#[cfg(windows)]
fn is_hidden(_path: &Path, meta: &fs::Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    meta.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
}

#[cfg(not(windows))]
fn is_hidden(path: &Path, _meta: &fs::Metadata) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

fn fold(s: &str, case_sensitive: bool) -> Cow<'_, str> {
    if case_sensitive {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(s.to_lowercase())
    }
}

fn text_eq(a: &str, b: &str, case_sensitive: bool) -> bool {
    fold(a, case_sensitive) == fold(b, case_sensitive)
}

/// Numeric ordering when both sides parse as integers, ordinal otherwise
fn order(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}
