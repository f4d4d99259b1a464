//! Rule, condition and action definitions

use crate::error::{EngineError, Result};
use crate::id::RuleId;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;

/// Implements `Display` and a forgiving `FromStr` for a fieldless enum.
///
/// Parsing ignores case, `_` and `-`, so `date_modified`, `DateModified` and
/// `date-modified` all resolve to the same variant.
macro_rules! named_enum {
    ($name:ident { $($variant:ident),+ $(,)? }) => {
        impl $name {
            /// Every variant in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Canonical name of the variant
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::error::EngineError;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                let wanted: String = s
                    .chars()
                    .filter(|c| *c != '_' && *c != '-')
                    .flat_map(char::to_lowercase)
                    .collect();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().to_lowercase() == wanted)
                    .ok_or_else(|| {
                        $crate::error::EngineError::InvalidConfig(format!(
                            "unknown {} '{}'",
                            stringify!($name),
                            s
                        ))
                    })
            }
        }
    };
}

pub(crate) use named_enum;

/// File property a condition inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionField {
    FileName,
    Extension,
    FullPath,
    FileSize,
    DateModified,
    DateCreated,
    Attributes,
    ContentContains,
}

named_enum!(ConditionField {
    FileName,
    Extension,
    FullPath,
    FileSize,
    DateModified,
    DateCreated,
    Attributes,
    ContentContains,
});

/// Comparison applied between the field value and the condition value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    MatchesRegex,
    GreaterThan,
    LessThan,
    Between,
    In,
}

named_enum!(Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    MatchesRegex,
    GreaterThan,
    LessThan,
    Between,
    In,
});

/// How a rule combines the results of its conditions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchLogic {
    /// Every condition must hold
    #[default]
    All,
    /// At least one condition must hold
    Any,
    /// No condition may hold
    None,
}

named_enum!(MatchLogic { All, Any, None });

/// A single predicate over one file property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: ConditionField,
    pub operator: Operator,
    pub value: String,

    /// Upper bound for `Between`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_value: Option<String>,

    #[serde(default)]
    pub case_sensitive: bool,
}

impl Condition {
    /// Create a case-insensitive condition
    pub fn new(field: ConditionField, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field,
            operator,
            value: value.into(),
            second_value: None,
            case_sensitive: false,
        }
    }

    /// Create a `Between` condition, inclusive on both ends
    pub fn between(field: ConditionField, low: impl Into<String>, high: impl Into<String>) -> Self {
        Self {
            field,
            operator: Operator::Between,
            value: low.into(),
            second_value: Some(high.into()),
            case_sensitive: false,
        }
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    /// Check structural invariants
    pub fn validate(&self) -> Result<()> {
        if self.operator == Operator::Between && self.second_value.is_none() {
            return Err(EngineError::InvalidConfig(format!(
                "{} Between condition needs two comparison values",
                self.field
            )));
        }
        Ok(())
    }
}

/// Side effect performed when a rule matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Move,
    Copy,
    Delete,
    Rename,
    Compress,
    RunScript,
    CreateSymlink,
    Notify,
    AddTag,
}

named_enum!(ActionKind {
    Move,
    Copy,
    Delete,
    Rename,
    Compress,
    RunScript,
    CreateSymlink,
    Notify,
    AddTag,
});

/// What to do when an action's destination already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictPolicy {
    Skip,
    Overwrite,
    OverwriteIfNewer,
    /// Pick a numbered name such as `report (2).pdf`
    #[default]
    Rename,
}

named_enum!(ConflictPolicy {
    Skip,
    Overwrite,
    OverwriteIfNewer,
    Rename,
});

/// Action attached to a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,

    /// Destination template, e.g. `/archive/{year}/{month}`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination: String,

    /// Rename template, e.g. `{name}_{date}.{ext}`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rename_pattern: String,

    #[serde(default)]
    pub conflict: ConflictPolicy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_path: Option<PathBuf>,

    /// Argument string; `{file}` is replaced by the quoted source path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_arguments: Option<String>,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            destination: String::new(),
            rename_pattern: String::new(),
            conflict: ConflictPolicy::default(),
            script_path: None,
            script_arguments: None,
        }
    }

    pub fn move_to(destination: impl Into<String>) -> Self {
        Self::new(ActionKind::Move).with_destination(destination)
    }

    pub fn copy_to(destination: impl Into<String>) -> Self {
        Self::new(ActionKind::Copy).with_destination(destination)
    }

    pub fn delete() -> Self {
        Self::new(ActionKind::Delete)
    }

    pub fn rename(pattern: impl Into<String>) -> Self {
        Self {
            rename_pattern: pattern.into(),
            ..Self::new(ActionKind::Rename)
        }
    }

    pub fn compress_to(destination: impl Into<String>) -> Self {
        Self::new(ActionKind::Compress).with_destination(destination)
    }

    pub fn run_script(script: impl Into<PathBuf>, arguments: impl Into<String>) -> Self {
        Self {
            script_path: Some(script.into()),
            script_arguments: Some(arguments.into()),
            ..Self::new(ActionKind::RunScript)
        }
    }

    pub fn symlink_at(destination: impl Into<String>) -> Self {
        Self::new(ActionKind::CreateSymlink).with_destination(destination)
    }

    pub fn notify() -> Self {
        Self::new(ActionKind::Notify)
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_conflict(mut self, conflict: ConflictPolicy) -> Self {
        self.conflict = conflict;
        self
    }

    /// Check that the fields the action kind needs are present
    pub fn validate(&self) -> Result<()> {
        let missing = match self.kind {
            ActionKind::Move | ActionKind::Copy | ActionKind::CreateSymlink => {
                self.destination.trim().is_empty()
            }
            ActionKind::Rename => self.rename_pattern.trim().is_empty(),
            ActionKind::RunScript => self.script_path.is_none(),
            _ => false,
        };
        if missing {
            return Err(EngineError::InvalidConfig(format!(
                "{} action is missing its target",
                self.kind
            )));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

/// A named, prioritised condition set with one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: RuleId,

    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Lower values are evaluated first
    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default)]
    pub logic: MatchLogic,

    pub action: Action,
}

impl Rule {
    pub fn new(name: impl Into<String>, action: Action) -> Self {
        Self {
            id: RuleId::new(),
            name: name.into(),
            enabled: true,
            priority: 0,
            conditions: Vec::new(),
            logic: MatchLogic::All,
            action,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_logic(mut self, logic: MatchLogic) -> Self {
        self.logic = logic;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Validate every condition and the action
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::InvalidConfig("rule name is empty".into()));
        }
        for condition in &self.conditions {
            condition.validate()?;
        }
        self.action.validate()
    }
}

/// Priority-ordered, immutable list of rules
///
/// Mutations return a rebuilt set, so a matcher holding a clone never sees a
/// partially updated list. Sorting is stable: rules with equal priority keep
/// their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Rule>", into = "Vec<Rule>")]
pub struct RuleSet(Arc<Vec<Rule>>);

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a new set with `rule` added, replacing any rule with the same id
    pub fn with_rule(&self, rule: Rule) -> Self {
        let mut rules: Vec<Rule> = self.0.iter().filter(|r| r.id != rule.id).cloned().collect();
        rules.push(rule);
        Self::from(rules)
    }

    /// Return a new set without the rule `id`, plus the removed rule
    pub fn without_rule(&self, id: RuleId) -> Option<(Self, Rule)> {
        let removed = self.get(id)?.clone();
        let rules: Vec<Rule> = self.0.iter().filter(|r| r.id != id).cloned().collect();
        Some((Self(Arc::new(rules)), removed))
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.0.iter().find(|r| r.id == id)
    }
}

impl Deref for RuleSet {
    type Target = [Rule];

    fn deref(&self) -> &[Rule] {
        &self.0
    }
}

impl From<Vec<Rule>> for RuleSet {
    fn from(mut rules: Vec<Rule>) -> Self {
        rules.sort_by_key(|r| r.priority);
        Self(Arc::new(rules))
    }
}

impl From<RuleSet> for Vec<Rule> {
    fn from(set: RuleSet) -> Self {
        Arc::try_unwrap(set.0).unwrap_or_else(|shared| (*shared).clone())
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}
