//! Declarative predicates over a [`FileDescriptor`].

use std::fs::File;
use std::io::Read;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use autosort_core::{ColorLabel, DateField, FileDescriptor};

use crate::duplicate::has_duplicate_sibling;
use crate::pattern::{DateFormatPattern, RegexPattern};
use crate::units::SizeUnit;

/// Maximum number of bytes read by `contentContains`.
pub const CONTENT_SCAN_LIMIT: u64 = 1024 * 1024;

/// A single predicate over file attributes.
///
/// Serializes as `{"type": "<kind>", "args": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "args",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Condition {
    /// File name contains a substring.
    NameContains {
        value: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    /// File name starts with a prefix.
    NameStartsWith {
        value: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    /// File name ends with a suffix.
    NameEndsWith {
        value: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    /// File name equals a value.
    NameEquals {
        value: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    /// File name matches a regular expression.
    NameMatches {
        pattern: RegexPattern,
        #[serde(default)]
        case_sensitive: bool,
    },
    /// Extension is one of the listed extensions (case-insensitive, dot optional).
    ExtensionIs { extensions: Vec<String> },
    /// Size is strictly greater than a byte count.
    SizeGreaterThan { bytes: u64 },
    /// Size is strictly less than a byte count.
    SizeLessThan { bytes: u64 },
    /// The selected timestamp is more than `seconds` in the past.
    AgeGreaterThan {
        seconds: u64,
        #[serde(default)]
        field: DateField,
    },
    /// The selected timestamp is strictly before a date.
    DateBefore {
        date: DateTime<Utc>,
        #[serde(default)]
        field: DateField,
    },
    /// The selected timestamp is strictly after a date.
    DateAfter {
        date: DateTime<Utc>,
        #[serde(default)]
        field: DateField,
    },
    /// Path of the containing folder contains a substring.
    ParentFolderContains {
        value: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    /// Hidden flag equals `value`.
    IsHidden {
        #[serde(default = "default_true")]
        value: bool,
    },
    /// System flag equals `value`.
    IsSystem {
        #[serde(default = "default_true")]
        value: bool,
    },
    /// Read-only flag equals `value`.
    IsReadOnly {
        #[serde(default = "default_true")]
        value: bool,
    },
    /// Directory flag equals `value`.
    IsDirectory {
        #[serde(default = "default_true")]
        value: bool,
    },
    /// The first [`CONTENT_SCAN_LIMIT`] bytes contain a string.
    ContentContains {
        value: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    /// File name contains a calendar date in the given format.
    DatePattern { format: DateFormatPattern },
    /// Color label equals `color`.
    ColorIs { color: ColorLabel },
    /// File carries a tag (case-insensitive).
    HasTag { tag: String },
    /// Metadata value under `key` contains a substring.
    MetadataContains {
        key: String,
        value: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    /// Metadata value under `key` equals a value.
    MetadataEquals {
        key: String,
        value: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    /// Whether another file in the same folder has identical content.
    IsDuplicate {
        #[serde(default = "default_true")]
        value: bool,
    },
}

fn default_true() -> bool {
    true
}

impl Condition {
    /// Case-insensitive "name contains".
    pub fn name_contains(value: impl Into<String>) -> Self {
        Self::NameContains {
            value: value.into(),
            case_sensitive: false,
        }
    }

    /// Regex match on the file name.
    pub fn name_matches(pattern: impl Into<RegexPattern>, case_sensitive: bool) -> Self {
        Self::NameMatches {
            pattern: pattern.into(),
            case_sensitive,
        }
    }

    /// Extension is `ext`.
    pub fn extension_is(ext: impl Into<String>) -> Self {
        Self::ExtensionIs {
            extensions: vec![ext.into()],
        }
    }

    /// Size greater than `amount` of `unit`, converted to bytes now.
    pub fn size_greater_than(amount: f64, unit: SizeUnit) -> Self {
        Self::SizeGreaterThan {
            bytes: unit.to_bytes(amount),
        }
    }

    /// Modified more than `days` days ago.
    pub fn older_than_days(days: u64) -> Self {
        Self::AgeGreaterThan {
            seconds: days.saturating_mul(86_400),
            field: DateField::Modified,
        }
    }

    /// Short kind name, as used in the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NameContains { .. } => "nameContains",
            Self::NameStartsWith { .. } => "nameStartsWith",
            Self::NameEndsWith { .. } => "nameEndsWith",
            Self::NameEquals { .. } => "nameEquals",
            Self::NameMatches { .. } => "nameMatches",
            Self::ExtensionIs { .. } => "extensionIs",
            Self::SizeGreaterThan { .. } => "sizeGreaterThan",
            Self::SizeLessThan { .. } => "sizeLessThan",
            Self::AgeGreaterThan { .. } => "ageGreaterThan",
            Self::DateBefore { .. } => "dateBefore",
            Self::DateAfter { .. } => "dateAfter",
            Self::ParentFolderContains { .. } => "parentFolderContains",
            Self::IsHidden { .. } => "isHidden",
            Self::IsSystem { .. } => "isSystem",
            Self::IsReadOnly { .. } => "isReadOnly",
            Self::IsDirectory { .. } => "isDirectory",
            Self::ContentContains { .. } => "contentContains",
            Self::DatePattern { .. } => "datePattern",
            Self::ColorIs { .. } => "colorIs",
            Self::HasTag { .. } => "hasTag",
            Self::MetadataContains { .. } => "metadataContains",
            Self::MetadataEquals { .. } => "metadataEquals",
            Self::IsDuplicate { .. } => "isDuplicate",
        }
    }

    /// Check the parameters. Called when a rule is saved or activated, never
    /// during evaluation.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::NameContains { value, .. }
            | Self::NameStartsWith { value, .. }
            | Self::NameEndsWith { value, .. }
            | Self::NameEquals { value, .. }
            | Self::ParentFolderContains { value, .. }
            | Self::ContentContains { value, .. } => non_empty("value", value),
            Self::NameMatches { pattern, .. } => pattern
                .validate()
                .map_err(|e| format!("invalid regex: {e}")),
            Self::ExtensionIs { extensions } => {
                if extensions.is_empty() {
                    return Err("at least one extension is required".to_string());
                }
                extensions
                    .iter()
                    .try_for_each(|ext| non_empty("extension", ext.trim_start_matches('.')))
            }
            Self::DatePattern { format } => format.validate(),
            Self::HasTag { tag } => non_empty("tag", tag),
            Self::MetadataContains { key, .. } | Self::MetadataEquals { key, .. } => {
                non_empty("key", key)
            }
            Self::SizeGreaterThan { .. }
            | Self::SizeLessThan { .. }
            | Self::AgeGreaterThan { .. }
            | Self::DateBefore { .. }
            | Self::DateAfter { .. }
            | Self::IsHidden { .. }
            | Self::IsSystem { .. }
            | Self::IsReadOnly { .. }
            | Self::IsDirectory { .. }
            | Self::ColorIs { .. }
            | Self::IsDuplicate { .. } => Ok(()),
        }
    }

    /// Evaluate the predicate. Total: missing attributes and unreadable
    /// content evaluate to `false`.
    pub fn evaluate(&self, file: &FileDescriptor) -> bool {
        match self {
            Self::NameContains {
                value,
                case_sensitive,
            } => text_match(&file.name, value, *case_sensitive, |h, n| h.contains(n)),
            Self::NameStartsWith {
                value,
                case_sensitive,
            } => text_match(&file.name, value, *case_sensitive, |h, n| h.starts_with(n)),
            Self::NameEndsWith {
                value,
                case_sensitive,
            } => text_match(&file.name, value, *case_sensitive, |h, n| h.ends_with(n)),
            Self::NameEquals {
                value,
                case_sensitive,
            } => text_match(&file.name, value, *case_sensitive, |h, n| h == n),
            Self::NameMatches {
                pattern,
                case_sensitive,
            } => pattern.is_match(&file.name, *case_sensitive),
            Self::ExtensionIs { extensions } => file.extension.as_deref().is_some_and(|ext| {
                extensions
                    .iter()
                    .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
            }),
            Self::SizeGreaterThan { bytes } => file.size > *bytes,
            Self::SizeLessThan { bytes } => file.size < *bytes,
            Self::AgeGreaterThan { seconds, field } => file
                .timestamps
                .get(*field)
                .and_then(|t| SystemTime::now().duration_since(t).ok())
                .is_some_and(|age| age > Duration::from_secs(*seconds)),
            Self::DateBefore { date, field } => file
                .timestamps
                .get(*field)
                .is_some_and(|t| DateTime::<Utc>::from(t) < *date),
            Self::DateAfter { date, field } => file
                .timestamps
                .get(*field)
                .is_some_and(|t| DateTime::<Utc>::from(t) > *date),
            Self::ParentFolderContains {
                value,
                case_sensitive,
            } => text_match(
                &file.parent.to_string_lossy(),
                value,
                *case_sensitive,
                |h, n| h.contains(n),
            ),
            Self::IsHidden { value } => file.hidden == *value,
            Self::IsSystem { value } => file.system == *value,
            Self::IsReadOnly { value } => file.read_only == *value,
            Self::IsDirectory { value } => file.is_dir == *value,
            Self::ContentContains {
                value,
                case_sensitive,
            } => read_prefix(file).is_some_and(|content| {
                text_match(&content, value, *case_sensitive, |h, n| h.contains(n))
            }),
            Self::DatePattern { format } => format.find_in(&file.name),
            Self::ColorIs { color } => file.color == *color,
            Self::HasTag { tag } => file.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)),
            Self::MetadataContains {
                key,
                value,
                case_sensitive,
            } => file.metadata.get(key).is_some_and(|actual| {
                text_match(actual, value, *case_sensitive, |h, n| h.contains(n))
            }),
            Self::MetadataEquals {
                key,
                value,
                case_sensitive,
            } => file
                .metadata
                .get(key)
                .is_some_and(|actual| text_match(actual, value, *case_sensitive, |h, n| h == n)),
            Self::IsDuplicate { value } => has_duplicate_sibling(file) == *value,
        }
    }
}

fn non_empty(what: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        Err(format!("{what} must not be empty"))
    } else {
        Ok(())
    }
}

fn text_match(haystack: &str, needle: &str, case_sensitive: bool, op: fn(&str, &str) -> bool) -> bool {
    if case_sensitive {
        op(haystack, needle)
    } else {
        op(&haystack.to_lowercase(), &needle.to_lowercase())
    }
}

fn read_prefix(file: &FileDescriptor) -> Option<String> {
    if file.is_dir {
        return None;
    }
    let mut buffer = Vec::new();
    File::open(&file.path)
        .ok()?
        .take(CONTENT_SCAN_LIMIT)
        .read_to_end(&mut buffer)
        .ok()?;
    Some(String::from_utf8_lossy(&buffer).into_owned())
}

/// How a group combines its conditions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MatchMode {
    /// Every condition holds (empty set: true).
    #[default]
    All,
    /// At least one condition holds (empty set: false).
    Any,
    /// No condition holds (empty set: true).
    None,
}

impl MatchMode {
    /// Combine `conditions` for `file` under this mode.
    pub fn evaluate(self, conditions: &[Condition], file: &FileDescriptor) -> bool {
        match self {
            Self::All => conditions.iter().all(|c| c.evaluate(file)),
            Self::Any => conditions.iter().any(|c| c.evaluate(file)),
            Self::None => !conditions.iter().any(|c| c.evaluate(file)),
        }
    }
}

/// A set of conditions combined under a match mode.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionGroup {
    pub mode: MatchMode,
    pub conditions: Vec<Condition>,
}

impl ConditionGroup {
    /// Create a group.
    pub fn new(mode: MatchMode, conditions: Vec<Condition>) -> Self {
        Self { mode, conditions }
    }

    /// Evaluate the group against a file.
    pub fn evaluate(&self, file: &FileDescriptor) -> bool {
        self.mode.evaluate(&self.conditions, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autosort_core::Timestamps;

    fn pdf() -> FileDescriptor {
        FileDescriptor::new("/home/user/Downloads/Report-Final.PDF").with_size(6 * 1024 * 1024)
    }

    #[test]
    fn test_name_conditions_case_flags() {
        let file = pdf();
        assert!(Condition::name_contains("report").evaluate(&file));
        assert!(
            !Condition::NameContains {
                value: "report".into(),
                case_sensitive: true
            }
            .evaluate(&file)
        );
        assert!(
            Condition::NameStartsWith {
                value: "Report".into(),
                case_sensitive: true
            }
            .evaluate(&file)
        );
        assert!(
            Condition::NameEndsWith {
                value: ".pdf".into(),
                case_sensitive: false
            }
            .evaluate(&file)
        );
        assert!(
            Condition::NameEquals {
                value: "report-final.pdf".into(),
                case_sensitive: false
            }
            .evaluate(&file)
        );
        assert!(Condition::name_matches(r"^report-\w+\.pdf$", false).evaluate(&file));
    }

    #[test]
    fn test_extension_is() {
        let file = pdf();
        assert!(Condition::extension_is("pdf").evaluate(&file));
        assert!(Condition::extension_is(".PDF").evaluate(&file));
        assert!(!Condition::extension_is("doc").evaluate(&file));
        assert!(!Condition::extension_is("pdf").evaluate(&FileDescriptor::new("/tmp/README")));
    }

    #[test]
    fn test_size_is_strict() {
        let file = FileDescriptor::new("/tmp/a.bin").with_size(100);
        assert!(!Condition::SizeGreaterThan { bytes: 100 }.evaluate(&file));
        assert!(Condition::SizeGreaterThan { bytes: 99 }.evaluate(&file));
        assert!(!Condition::SizeLessThan { bytes: 100 }.evaluate(&file));
        assert!(Condition::size_greater_than(5.0, SizeUnit::Megabytes).evaluate(&pdf()));
    }

    #[test]
    fn test_age_and_dates() {
        let old = SystemTime::now() - Duration::from_secs(10 * 24 * 60 * 60);
        let file = FileDescriptor::new("/tmp/old.log")
            .with_timestamps(Timestamps::with_modified(old));

        assert!(Condition::older_than_days(7).evaluate(&file));
        assert!(!Condition::older_than_days(30).evaluate(&file));

        let cutoff = Utc::now() - chrono::TimeDelta::days(5);
        assert!(
            Condition::DateBefore {
                date: cutoff,
                field: DateField::Modified
            }
            .evaluate(&file)
        );
        assert!(
            !Condition::DateAfter {
                date: cutoff,
                field: DateField::Modified
            }
            .evaluate(&file)
        );
        // No creation time recorded: never matches.
        assert!(
            !Condition::DateBefore {
                date: cutoff,
                field: DateField::Created
            }
            .evaluate(&file)
        );
    }

    #[test]
    fn test_flags_and_platform_attributes() {
        let file = FileDescriptor::new("/tmp/.cache")
            .with_color(ColorLabel::Red)
            .with_tag("Work")
            .with_metadata("artist", "Daft Punk");

        assert!(Condition::IsHidden { value: true }.evaluate(&file));
        assert!(Condition::IsDirectory { value: false }.evaluate(&file));
        assert!(
            Condition::ColorIs {
                color: ColorLabel::Red
            }
            .evaluate(&file)
        );
        assert!(Condition::HasTag { tag: "work".into() }.evaluate(&file));
        assert!(
            Condition::MetadataContains {
                key: "artist".into(),
                value: "daft".into(),
                case_sensitive: false
            }
            .evaluate(&file)
        );
        assert!(
            !Condition::MetadataEquals {
                key: "album".into(),
                value: "Discovery".into(),
                case_sensitive: false
            }
            .evaluate(&file)
        );
    }

    #[test]
    fn test_parent_folder_contains() {
        let file = pdf();
        assert!(
            Condition::ParentFolderContains {
                value: "downloads".into(),
                case_sensitive: false
            }
            .evaluate(&file)
        );
    }

    #[test]
    fn test_content_contains_missing_file_is_false() {
        let file = FileDescriptor::new("/definitely/not/here.txt");
        assert!(
            !Condition::ContentContains {
                value: "x".into(),
                case_sensitive: false
            }
            .evaluate(&file)
        );
    }

    #[test]
    fn test_match_modes() {
        let file = FileDescriptor::new("/docs/final.docx");
        let draft = vec![Condition::name_contains("draft")];

        // NONE holds when nothing matched.
        assert!(ConditionGroup::new(MatchMode::None, draft.clone()).evaluate(&file));
        assert!(!ConditionGroup::new(MatchMode::All, draft.clone()).evaluate(&file));
        assert!(!ConditionGroup::new(MatchMode::Any, draft).evaluate(&file));

        assert!(MatchMode::All.evaluate(&[], &file));
        assert!(!MatchMode::Any.evaluate(&[], &file));
        assert!(MatchMode::None.evaluate(&[], &file));

        let mixed = vec![Condition::name_contains("final"), Condition::extension_is("pdf")];
        assert!(MatchMode::Any.evaluate(&mixed, &file));
        assert!(!MatchMode::All.evaluate(&mixed, &file));
        assert!(!MatchMode::None.evaluate(&mixed, &file));
    }

    #[test]
    fn test_validate() {
        assert!(Condition::name_contains("").validate().is_err());
        assert!(Condition::name_matches("(", false).validate().is_err());
        assert!(Condition::ExtensionIs { extensions: vec![] }.validate().is_err());
        assert!(Condition::extension_is(".").validate().is_err());
        assert!(
            Condition::DatePattern {
                format: "%H".into()
            }
            .validate()
            .is_err()
        );
        assert!(Condition::older_than_days(3).validate().is_ok());
    }

    #[test]
    fn test_older_than_days_saturates() {
        let condition = Condition::older_than_days(u64::MAX);
        assert!(matches!(
            condition,
            Condition::AgeGreaterThan { seconds: u64::MAX, .. }
        ));
        assert!(!condition.evaluate(&FileDescriptor::new("/tmp/new.log")));
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(Condition::name_contains("draft")).unwrap();
        assert_eq!(json["type"], "nameContains");
        assert_eq!(json["args"]["value"], "draft");
        assert_eq!(json["args"]["caseSensitive"], false);

        let parsed: Condition =
            serde_json::from_str(r#"{"type": "isHidden", "args": {}}"#).unwrap();
        assert_eq!(parsed, Condition::IsHidden { value: true });
    }
}
