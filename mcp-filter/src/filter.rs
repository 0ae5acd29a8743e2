//! Ordered include/exclude rule evaluation
//!
//! Rules are tested in the order they were supplied and the first rule whose
//! pattern matches decides the outcome (rsync style). When nothing matches, the
//! outcome depends on the composition of the rule set:
//!
//! - at least one include rule: whitelist mode, unmatched names are excluded
//! - no include rule (empty or exclude-only): open mode, unmatched names pass
//!
//! Evaluation is a pure function of the rule set and the name. A [`Filter`]
//! never changes after construction and can be shared freely across tasks.

use crate::pattern::Pattern;
use rmcp::model::{Prompt, Resource, Tool};
use serde::Serialize;
use std::fmt;

/// Whether a rule admits or hides the names it matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Include,
    Exclude,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Include => write!(f, "include"),
            RuleKind::Exclude => write!(f, "exclude"),
        }
    }
}

/// A single include or exclude rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    kind: RuleKind,
    pattern: Pattern,
}

impl Rule {
    pub fn new(kind: RuleKind, pattern: impl Into<Pattern>) -> Self {
        Self {
            kind,
            pattern: pattern.into(),
        }
    }

    /// Rule that shows names matching `pattern`
    pub fn include(pattern: impl Into<Pattern>) -> Self {
        Self::new(RuleKind::Include, pattern)
    }

    /// Rule that hides names matching `pattern`
    pub fn exclude(pattern: impl Into<Pattern>) -> Self {
        Self::new(RuleKind::Exclude, pattern)
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pattern.matches(name)
    }

    fn decision(&self) -> Decision {
        match self.kind {
            RuleKind::Include => Decision::Include,
            RuleKind::Exclude => Decision::Exclude,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.pattern)
    }
}

/// Outcome of evaluating a name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Include,
    Exclude,
}

impl Decision {
    pub fn is_included(self) -> bool {
        self == Decision::Include
    }
}

/// Default applied to names that no rule matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// No include rule present: unmatched names are included
    Open,
    /// At least one include rule present: unmatched names are excluded
    Whitelist,
}

impl FilterMode {
    fn for_rules(rules: &[Rule]) -> Self {
        if rules.iter().any(|rule| rule.kind == RuleKind::Include) {
            FilterMode::Whitelist
        } else {
            FilterMode::Open
        }
    }

    fn default_decision(self) -> Decision {
        match self {
            FilterMode::Open => Decision::Include,
            FilterMode::Whitelist => Decision::Exclude,
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMode::Open => write!(f, "open"),
            FilterMode::Whitelist => write!(f, "whitelist"),
        }
    }
}

/// Anything the proxy can list and filter by name
pub trait NamedItem {
    fn name(&self) -> &str;
}

impl NamedItem for Tool {
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedItem for Prompt {
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedItem for Resource {
    fn name(&self) -> &str {
        &self.raw.name
    }
}

/// An ordered, immutable rule set with its default mode
#[derive(Debug, Clone, Serialize)]
pub struct Filter {
    rules: Vec<Rule>,
    mode: FilterMode,
}

impl Filter {
    /// Build a filter. Rule order is kept exactly as given.
    pub fn new(rules: Vec<Rule>) -> Self {
        let mode = FilterMode::for_rules(&rules);
        Self { rules, mode }
    }

    /// A filter with no rules, which includes every name
    pub fn passthrough() -> Self {
        Self::new(Vec::new())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    /// True when the rule set is empty
    pub fn is_passthrough(&self) -> bool {
        self.rules.is_empty()
    }

    /// True when both rule kinds are present, so relative order matters
    pub fn is_mixed(&self) -> bool {
        self.mode == FilterMode::Whitelist
            && self.rules.iter().any(|rule| rule.kind == RuleKind::Exclude)
    }

    /// Decide a single name. The first matching rule wins.
    pub fn evaluate(&self, name: &str) -> Decision {
        self.rules
            .iter()
            .find(|rule| rule.matches(name))
            .map(Rule::decision)
            .unwrap_or_else(|| self.mode.default_decision())
    }

    pub fn should_exclude(&self, name: &str) -> bool {
        self.evaluate(name) == Decision::Exclude
    }

    /// Keep the included items, preserving their order.
    pub fn filter_list<T: NamedItem>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .filter(|item| self.evaluate(item.name()).is_included())
            .collect()
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::passthrough()
    }
}

impl FromIterator<Rule> for Filter {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
