//! Declarative rules for autosort.
//!
//! A [`Rule`] pairs a list of [`Condition`]s, combined under a [`MatchMode`],
//! with an ordered list of [`Action`]s. Conditions are pure predicates over a
//! [`FileDescriptor`](autosort_core::FileDescriptor); actions are data here and
//! are run by `autosort-ops`.
//!
//! Every condition and action serializes to a tagged record
//! `{"type": ..., "args": {...}}`, and a [`RuleSet`] loads from and saves to
//! JSON or TOML:
//!
//! ```rust
//! use autosort_rules::{Action, Condition, Rule, RuleSet, SizeUnit};
//!
//! let rule = Rule::new("Big PDFs")
//!     .when(Condition::extension_is("pdf"))
//!     .when(Condition::size_greater_than(5.0, SizeUnit::Megabytes))
//!     .then(Action::move_to("/Documents"));
//! assert!(rule.validate().is_ok());
//!
//! let json = RuleSet::new(vec![rule]).to_json().unwrap();
//! assert!(json.contains("\"extensionIs\""));
//! ```

mod action;
mod condition;
mod duplicate;
mod error;
mod pattern;
mod rule;
pub mod template;
mod units;

pub use action::{Action, ActionKind, ActionOptions, ConflictPolicy, CounterSettings};
pub use condition::{CONTENT_SCAN_LIMIT, Condition, ConditionGroup, MatchMode};
pub use duplicate::has_duplicate_sibling;
pub use error::RuleError;
pub use pattern::{DateFormatPattern, RegexPattern};
pub use rule::{Rule, RuleSet};
pub use units::{SizeUnit, parse_age, parse_size};
