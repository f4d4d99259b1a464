//! Priority-ordered rule matching

use crate::condition::EvalOptions;
use crate::rule::{MatchLogic, Rule};
use std::path::Path;

/// Selects the first enabled rule whose conditions hold for a file
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleMatcher {
    options: EvalOptions,
}

impl RuleMatcher {
    pub fn new(options: EvalOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    /// Find the matching rule for `path`
    ///
    /// Enabled rules are tried in ascending priority; ties keep their order in
    /// `rules`. Returns `None` when nothing matches.
    pub fn find_match<'a>(&self, rules: &'a [Rule], path: &Path) -> Option<&'a Rule> {
        let mut candidates: Vec<&Rule> = rules.iter().filter(|r| r.enabled).collect();
        candidates.sort_by_key(|r| r.priority);
        candidates.into_iter().find(|rule| self.is_satisfied(rule, path))
    }

    /// Whether `rule`'s conditions hold for `path` under its combination logic
    ///
    /// Ignores the enabled flag, so disabled rules can still be tested.
    pub fn is_satisfied(&self, rule: &Rule, path: &Path) -> bool {
        let mut results = rule
            .conditions
            .iter()
            .map(|c| c.evaluate_with(path, &self.options));

        match rule.logic {
            MatchLogic::All => results.all(|hit| hit),
            MatchLogic::Any => results.any(|hit| hit),
            MatchLogic::None => !results.any(|hit| hit),
        }
    }
}
