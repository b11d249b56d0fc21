//! Error types for rule validation and rule-set persistence.

use std::path::PathBuf;

use thiserror::Error;

use crate::ActionKind;

/// Errors raised when a rule is validated, parsed or saved.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The rule has no conditions and did not opt in to matching all files.
    #[error("Rule '{rule}' has no conditions; enable matchAllFiles to match every file")]
    NoConditions { rule: String },

    /// The rule has no actions.
    #[error("Rule '{rule}' has no actions")]
    NoActions { rule: String },

    /// The rule has no name.
    #[error("Rule at priority {priority} has an empty name")]
    EmptyName { priority: u32 },

    /// A condition has malformed parameters.
    #[error("Rule '{rule}', condition #{index} ({kind}): {message}")]
    InvalidCondition {
        rule: String,
        index: usize,
        kind: &'static str,
        message: String,
    },

    /// An action has malformed parameters.
    #[error("Rule '{rule}', action #{index} ({kind}): {message}")]
    InvalidAction {
        rule: String,
        index: usize,
        kind: ActionKind,
        message: String,
    },

    /// A size or duration string could not be parsed.
    #[error("Invalid {what} '{input}'")]
    InvalidQuantity { what: &'static str, input: String },

    /// Reading or writing a rule file failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A rule file could not be parsed or serialized.
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// The rule file extension is neither `.json` nor `.toml`.
    #[error("Unsupported rule file format: {path}")]
    UnsupportedFormat { path: PathBuf },
}

impl RuleError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a parse error with path context.
    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
