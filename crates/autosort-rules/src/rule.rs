//! Rules and rule sets.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use autosort_core::FileDescriptor;

use crate::action::Action;
use crate::condition::{Condition, MatchMode};
use crate::RuleError;

/// A named condition set plus the actions to run when it matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Rule name, also used as its identifier in execution reports.
    pub name: String,

    /// Evaluation order; lower values run first.
    #[serde(default)]
    pub priority: u32,

    /// Disabled rules are never evaluated.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How the conditions combine.
    #[serde(default)]
    pub match_mode: MatchMode,

    /// Stop evaluating later rules once this one matched.
    #[serde(default = "default_true")]
    pub stop_on_match: bool,

    /// Explicit opt-in for a condition-less rule that matches every file.
    #[serde(default)]
    pub match_all_files: bool,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default)]
    pub actions: Vec<Action>,
}

fn default_true() -> bool {
    true
}

impl Rule {
    /// Create an enabled rule with no conditions or actions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            enabled: true,
            match_mode: MatchMode::All,
            stop_on_match: true,
            match_all_files: false,
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the match mode.
    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    /// Set the stop-on-match flag.
    pub fn with_stop_on_match(mut self, stop: bool) -> Self {
        self.stop_on_match = stop;
        self
    }

    /// Set the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Opt in to matching every file when the rule has no conditions.
    pub fn matching_all_files(mut self) -> Self {
        self.match_all_files = true;
        self
    }

    /// Add a condition.
    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Add an action.
    pub fn then(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Check whether the rule matches a file.
    ///
    /// A rule without conditions matches only when `match_all_files` is set,
    /// whatever its match mode.
    pub fn matches(&self, file: &FileDescriptor) -> bool {
        if self.conditions.is_empty() {
            return self.match_all_files;
        }
        self.match_mode.evaluate(&self.conditions, file)
    }

    /// Validate the rule. A rule that fails validation must not be activated.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.name.trim().is_empty() {
            return Err(RuleError::EmptyName {
                priority: self.priority,
            });
        }
        if self.conditions.is_empty() && !self.match_all_files {
            return Err(RuleError::NoConditions {
                rule: self.name.clone(),
            });
        }
        if self.actions.is_empty() {
            return Err(RuleError::NoActions {
                rule: self.name.clone(),
            });
        }

        for (index, condition) in self.conditions.iter().enumerate() {
            condition
                .validate()
                .map_err(|message| RuleError::InvalidCondition {
                    rule: self.name.clone(),
                    index,
                    kind: condition.kind(),
                    message,
                })?;
        }
        for (index, action) in self.actions.iter().enumerate() {
            action
                .validate()
                .map_err(|message| RuleError::InvalidAction {
                    rule: self.name.clone(),
                    index,
                    kind: action.kind(),
                    message,
                })?;
        }

        Ok(())
    }
}

/// An ordered list of rules, as stored by a profile.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Create a rule set.
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Rules sorted by ascending priority; ties keep their stored order.
    pub fn ordered(&self) -> Vec<&Rule> {
        let mut rules: Vec<&Rule> = self.rules.iter().collect();
        rules.sort_by_key(|rule| rule.priority);
        rules
    }

    /// Validate every rule, returning the failures.
    pub fn validate(&self) -> Vec<RuleError> {
        self.rules
            .iter()
            .filter_map(|rule| rule.validate().err())
            .collect()
    }

    /// Parse a rule set from JSON.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a rule set from TOML.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load a rule set from a `.json` or `.toml` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuleError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| RuleError::io(path, e))?;
        match Format::of(path)? {
            Format::Json => Self::from_json(&text).map_err(|e| RuleError::parse(path, e)),
            Format::Toml => Self::from_toml(&text).map_err(|e| RuleError::parse(path, e)),
        }
    }

    /// Save the rule set to a `.json` or `.toml` file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RuleError> {
        let path = path.as_ref();
        let text = match Format::of(path)? {
            Format::Json => self.to_json().map_err(|e| RuleError::parse(path, e))?,
            Format::Toml => self.to_toml().map_err(|e| RuleError::parse(path, e))?,
        };
        fs::write(path, text).map_err(|e| RuleError::io(path, e))
    }
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> Result<Self, RuleError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            _ => Err(RuleError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_condition_rule_never_matches_by_default() {
        let file = FileDescriptor::new("/tmp/anything.txt");
        let rule = Rule::new("Catch-all").then(Action::Ignore {});

        assert!(!rule.matches(&file));
        assert!(matches!(
            rule.validate(),
            Err(RuleError::NoConditions { .. })
        ));

        let rule = rule.matching_all_files();
        assert!(rule.matches(&file));
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_condition_index() {
        let rule = Rule::new("Broken")
            .when(Condition::extension_is("pdf"))
            .when(Condition::name_matches("([", false))
            .then(Action::move_to("/Documents"));

        match rule.validate() {
            Err(RuleError::InvalidCondition { index, kind, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(kind, "nameMatches");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_validate_requires_actions_and_name() {
        let rule = Rule::new("No actions").when(Condition::extension_is("pdf"));
        assert!(matches!(rule.validate(), Err(RuleError::NoActions { .. })));

        let rule = Rule::new(" ")
            .when(Condition::extension_is("pdf"))
            .then(Action::trash());
        assert!(matches!(rule.validate(), Err(RuleError::EmptyName { .. })));
    }

    #[test]
    fn test_ordered_is_stable() {
        let set = RuleSet::new(vec![
            Rule::new("b").with_priority(2),
            Rule::new("a").with_priority(1),
            Rule::new("c").with_priority(2),
        ]);
        let names: Vec<_> = set.ordered().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_rule_defaults_from_json() {
        let rule: Rule = serde_json::from_str(r#"{"name": "Minimal"}"#).unwrap();
        assert!(rule.enabled);
        assert!(rule.stop_on_match);
        assert!(!rule.match_all_files);
        assert_eq!(rule.match_mode, MatchMode::All);
    }
}
