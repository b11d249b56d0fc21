//! Action definitions.
//!
//! Only the declarative side lives here; running an action against the
//! filesystem is the job of `autosort-ops`.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::template::{self, DEFAULT_DATE_FORMAT};

/// The kind of an action, shared by action results and undo entries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "lowercase")]
pub enum ActionKind {
    Move,
    Copy,
    Rename,
    Delete,
    Ignore,
    Continue,
}

impl ActionKind {
    /// Whether this kind changes the filesystem.
    pub fn is_mutation(self) -> bool {
        matches!(self, Self::Move | Self::Copy | Self::Rename | Self::Delete)
    }
}

/// What to do when the target path is already occupied.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ConflictPolicy {
    /// Append " (1)", " (2)", ... until the name is free.
    AutoRename,
    /// Replace the existing file.
    Overwrite,
    /// Leave both files alone and report the action as not applied.
    Skip,
}

impl ConflictPolicy {
    /// Policy implied by the safe-mode setting.
    pub fn from_safe_mode(safe_mode: bool) -> Self {
        if safe_mode {
            Self::AutoRename
        } else {
            Self::Overwrite
        }
    }
}

/// Settings for the `{counter}` placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSettings {
    /// First value tried.
    #[serde(default = "default_counter_start")]
    pub start: u32,
    /// Minimum number of digits, zero-padded.
    #[serde(default)]
    pub padding: usize,
}

fn default_counter_start() -> u32 {
    1
}

impl Default for CounterSettings {
    fn default() -> Self {
        Self {
            start: default_counter_start(),
            padding: 0,
        }
    }
}

/// Options shared by move, copy and rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOptions {
    /// Overrides the conflict policy implied by safe mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictPolicy>,

    /// Format of the `{date}` placeholder.
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Settings for the `{counter}` placeholder.
    #[serde(default)]
    pub counter: CounterSettings,

    /// Create missing destination folders.
    #[serde(default = "default_true")]
    pub create_folders: bool,
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ActionOptions {
    fn default() -> Self {
        Self {
            conflict: None,
            date_format: default_date_format(),
            counter: CounterSettings::default(),
            create_folders: true,
        }
    }
}

impl ActionOptions {
    /// Conflict policy in effect for a run with the given safe-mode setting.
    pub fn conflict_policy(&self, safe_mode: bool) -> ConflictPolicy {
        self.conflict
            .unwrap_or_else(|| ConflictPolicy::from_safe_mode(safe_mode))
    }

    fn validate(&self) -> Result<(), String> {
        template::validate_date_format(&self.date_format)
    }
}

/// A unit of filesystem mutation (or a no-op marker) run on a matched file.
///
/// Serializes as `{"type": "<kind>", "args": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "args",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Action {
    /// Move the file into a destination folder (template).
    Move {
        destination: String,
        #[serde(default)]
        options: ActionOptions,
    },
    /// Copy the file into a destination folder (template).
    Copy {
        destination: String,
        #[serde(default)]
        options: ActionOptions,
    },
    /// Rename the file in place; `pattern` is a file-name template.
    Rename {
        pattern: String,
        #[serde(default)]
        options: ActionOptions,
    },
    /// Send the file to the system trash, or delete it outright when
    /// `permanent` is set.
    Delete {
        #[serde(default)]
        permanent: bool,
    },
    /// Stop processing this file without touching it.
    Ignore {},
    /// Logged no-op; never halts processing.
    Continue {},
}

impl Action {
    /// Move into `destination` with default options.
    pub fn move_to(destination: impl Into<String>) -> Self {
        Self::Move {
            destination: destination.into(),
            options: ActionOptions::default(),
        }
    }

    /// Copy into `destination` with default options.
    pub fn copy_to(destination: impl Into<String>) -> Self {
        Self::Copy {
            destination: destination.into(),
            options: ActionOptions::default(),
        }
    }

    /// Rename to `pattern` with default options.
    pub fn rename(pattern: impl Into<String>) -> Self {
        Self::Rename {
            pattern: pattern.into(),
            options: ActionOptions::default(),
        }
    }

    /// Send to the trash.
    pub fn trash() -> Self {
        Self::Delete { permanent: false }
    }

    /// The action's kind.
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Move { .. } => ActionKind::Move,
            Self::Copy { .. } => ActionKind::Copy,
            Self::Rename { .. } => ActionKind::Rename,
            Self::Delete { .. } => ActionKind::Delete,
            Self::Ignore {} => ActionKind::Ignore,
            Self::Continue {} => ActionKind::Continue,
        }
    }

    /// Check the parameters.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Move {
                destination,
                options,
            }
            | Self::Copy {
                destination,
                options,
            } => {
                if destination.trim().is_empty() {
                    return Err("destination must not be empty".to_string());
                }
                template::validate(destination)?;
                options.validate()
            }
            Self::Rename { pattern, options } => {
                if pattern.trim().is_empty() {
                    return Err("pattern must not be empty".to_string());
                }
                if pattern.contains(['/', '\\']) {
                    return Err("pattern must be a file name, not a path".to_string());
                }
                template::validate(pattern)?;
                options.validate()
            }
            Self::Delete { .. } | Self::Ignore {} | Self::Continue {} => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_mutation() {
        assert_eq!(Action::move_to("/x").kind(), ActionKind::Move);
        assert!(ActionKind::Delete.is_mutation());
        assert!(!ActionKind::Ignore.is_mutation());
        assert_eq!(ActionKind::Rename.to_string(), "rename");
    }

    #[test]
    fn test_conflict_policy_from_options() {
        let options = ActionOptions::default();
        assert_eq!(options.conflict_policy(true), ConflictPolicy::AutoRename);
        assert_eq!(options.conflict_policy(false), ConflictPolicy::Overwrite);

        let options = ActionOptions {
            conflict: Some(ConflictPolicy::Skip),
            ..Default::default()
        };
        assert_eq!(options.conflict_policy(true), ConflictPolicy::Skip);
    }

    #[test]
    fn test_validate() {
        assert!(Action::move_to("/Documents/{year}").validate().is_ok());
        assert!(Action::move_to("  ").validate().is_err());
        assert!(Action::move_to("/x/{bogus}").validate().is_err());
        assert!(Action::rename("a/b.txt").validate().is_err());
        assert!(Action::rename("{date}_{name}.{ext}").validate().is_ok());

        let bad_date = Action::Rename {
            pattern: "{date}.{ext}".into(),
            options: ActionOptions {
                date_format: "%Q".into(),
                ..Default::default()
            },
        };
        assert!(bad_date.validate().is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(Action::move_to("/Documents")).unwrap();
        assert_eq!(json["type"], "move");
        assert_eq!(json["args"]["destination"], "/Documents");
        assert_eq!(json["args"]["options"]["createFolders"], true);

        let ignore = serde_json::to_value(Action::Ignore {}).unwrap();
        assert_eq!(ignore["type"], "ignore");

        let parsed: Action =
            serde_json::from_str(r#"{"type": "copy", "args": {"destination": "/Backup"}}"#)
                .unwrap();
        assert_eq!(parsed, Action::copy_to("/Backup"));
    }
}
