//! Patterns compiled once and cached inside their condition.

use std::fmt;
use std::sync::OnceLock;

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// A regular expression stored as its source text.
///
/// The compiled regex is built lazily for each case mode and reused for every
/// later evaluation. Serializes as a plain string.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RegexPattern {
    source: String,
    sensitive: OnceLock<Option<Regex>>,
    insensitive: OnceLock<Option<Regex>>,
}

impl RegexPattern {
    /// Create a pattern from its source text.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            sensitive: OnceLock::new(),
            insensitive: OnceLock::new(),
        }
    }

    /// The source text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Check that the pattern compiles.
    pub fn validate(&self) -> Result<(), regex::Error> {
        self.build(true).map(|_| ())
    }

    /// Test `haystack` against the pattern. Invalid patterns never match.
    pub fn is_match(&self, haystack: &str, case_sensitive: bool) -> bool {
        let cell = if case_sensitive {
            &self.sensitive
        } else {
            &self.insensitive
        };
        cell.get_or_init(|| self.build(case_sensitive).ok())
            .as_ref()
            .is_some_and(|re| re.is_match(haystack))
    }

    fn build(&self, case_sensitive: bool) -> Result<Regex, regex::Error> {
        RegexBuilder::new(&self.source)
            .case_insensitive(!case_sensitive)
            .build()
    }
}

impl From<String> for RegexPattern {
    fn from(source: String) -> Self {
        Self::new(source)
    }
}

impl From<&str> for RegexPattern {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl From<RegexPattern> for String {
    fn from(pattern: RegexPattern) -> Self {
        pattern.source
    }
}

impl PartialEq for RegexPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Debug for RegexPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RegexPattern").field(&self.source).finish()
    }
}

/// A strftime-style date format searched for inside file names
/// (e.g. `%Y-%m-%d` finds "invoice-2024-03-15.pdf").
///
/// Supported specifiers: `%Y %y %m %d %H %M %S %%`.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DateFormatPattern {
    format: String,
    matcher: OnceLock<Option<Regex>>,
}

impl DateFormatPattern {
    /// Create a pattern from a strftime format.
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            matcher: OnceLock::new(),
        }
    }

    /// The strftime format.
    pub fn as_str(&self) -> &str {
        &self.format
    }

    /// Check that the format only uses supported specifiers and names at
    /// least one date component.
    pub fn validate(&self) -> Result<(), String> {
        if StrftimeItems::new(&self.format).any(|item| matches!(item, Item::Error)) {
            return Err(format!("'{}' is not a valid date format", self.format));
        }
        format_to_regex(&self.format).map(|_| ())
    }

    /// Check if `name` contains a real calendar date in this format.
    pub fn find_in(&self, name: &str) -> bool {
        let Some(re) = self
            .matcher
            .get_or_init(|| {
                format_to_regex(&self.format)
                    .ok()
                    .and_then(|source| Regex::new(&source).ok())
            })
            .as_ref()
        else {
            return false;
        };

        // Regex candidates like "2024-13-45" still have to parse.
        re.find_iter(name)
            .any(|candidate| parses_as_date(candidate.as_str(), &self.format))
    }
}

fn parses_as_date(candidate: &str, format: &str) -> bool {
    NaiveDateTime::parse_from_str(candidate, format).is_ok()
        || NaiveDate::parse_from_str(candidate, format).is_ok()
}

fn format_to_regex(format: &str) -> Result<String, String> {
    let mut source = String::new();
    let mut has_date = false;
    let mut chars = format.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            source.push_str(&regex::escape(&c.to_string()));
            continue;
        }
        match chars.next() {
            Some('Y') => {
                source.push_str(r"\d{4}");
                has_date = true;
            }
            Some('y' | 'm' | 'd') => {
                source.push_str(r"\d{2}");
                has_date = true;
            }
            Some('H' | 'M' | 'S') => source.push_str(r"\d{2}"),
            Some('%') => source.push('%'),
            Some(other) => return Err(format!("unsupported specifier '%{other}'")),
            None => return Err("format ends with a lone '%'".to_string()),
        }
    }

    if !has_date {
        return Err(format!("'{format}' has no year, month or day"));
    }
    Ok(source)
}

impl From<String> for DateFormatPattern {
    fn from(format: String) -> Self {
        Self::new(format)
    }
}

impl From<&str> for DateFormatPattern {
    fn from(format: &str) -> Self {
        Self::new(format)
    }
}

impl From<DateFormatPattern> for String {
    fn from(pattern: DateFormatPattern) -> Self {
        pattern.format
    }
}

impl PartialEq for DateFormatPattern {
    fn eq(&self, other: &Self) -> bool {
        self.format == other.format
    }
}

impl fmt::Debug for DateFormatPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DateFormatPattern").field(&self.format).finish()
    }
}
