//! Organize configuration types.

use std::sync::OnceLock;

use derive_builder::Builder;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Settings for one preview/organize pass, merged from profile and global
/// settings by the caller.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(rename_all = "camelCase")]
pub struct OrganizeConfig {
    /// Compute intended outcomes without touching the filesystem.
    #[builder(default = "false")]
    #[serde(default)]
    pub dry_run: bool,

    /// Rename instead of overwriting when a target path is occupied.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub safe_mode: bool,

    /// Descend into subfolders during a manual organize pass.
    #[builder(default = "false")]
    #[serde(default)]
    pub include_subfolders: bool,

    /// Include hidden entries during a manual organize pass.
    #[builder(default = "false")]
    #[serde(default)]
    pub include_hidden: bool,

    /// Glob patterns for file names that are never organized.
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    #[builder(setter(skip))]
    #[serde(skip)]
    ignore_matcher: OnceLock<GlobSet>,
}

fn default_true() -> bool {
    true
}

impl OrganizeConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref patterns) = self.ignore_patterns {
            for pattern in patterns {
                Glob::new(pattern).map_err(|e| format!("Invalid ignore pattern '{pattern}': {e}"))?;
            }
        }
        Ok(())
    }
}

impl OrganizeConfig {
    /// Create a new config builder.
    pub fn builder() -> OrganizeConfigBuilder {
        OrganizeConfigBuilder::default()
    }

    /// Default config for a real organize pass.
    pub fn new() -> Self {
        Self {
            dry_run: false,
            safe_mode: true,
            include_subfolders: false,
            include_hidden: false,
            ignore_patterns: Vec::new(),
            ignore_matcher: OnceLock::new(),
        }
    }

    /// Default config for a preview pass.
    pub fn preview() -> Self {
        Self {
            dry_run: true,
            ..Self::new()
        }
    }

    /// Copy of this config with `dry_run` set.
    pub fn with_dry_run(&self, dry_run: bool) -> Self {
        Self {
            dry_run,
            ..self.clone()
        }
    }

    /// Check that every ignore pattern compiles.
    pub fn validate(&self) -> Result<(), CoreError> {
        build_glob_set(&self.ignore_patterns).map(|_| ())
    }

    /// Check if a file name matches one of the ignore patterns.
    ///
    /// Patterns that fail to compile never match; [`validate`](Self::validate)
    /// reports them.
    pub fn should_ignore(&self, name: &str) -> bool {
        if self.ignore_patterns.is_empty() {
            return false;
        }
        self.ignore_matcher
            .get_or_init(|| build_glob_set(&self.ignore_patterns).unwrap_or_else(|_| GlobSet::empty()))
            .is_match(name)
    }

    /// Check if hidden files should be skipped.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }
}

impl Default for OrganizeConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, CoreError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            CoreError::invalid_config(format!("invalid ignore pattern '{pattern}': {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| CoreError::invalid_config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = OrganizeConfig::builder()
            .dry_run(true)
            .safe_mode(false)
            .include_subfolders(true)
            .build()
            .unwrap();

        assert!(config.dry_run);
        assert!(!config.safe_mode);
        assert!(config.include_subfolders);
        assert!(config.ignore_patterns.is_empty());
    }

    #[test]
    fn test_config_defaults() {
        let config = OrganizeConfig::default();
        assert!(!config.dry_run);
        assert!(config.safe_mode);
        assert!(OrganizeConfig::preview().dry_run);
    }

    #[test]
    fn test_builder_rejects_bad_glob() {
        let result = OrganizeConfig::builder()
            .ignore_patterns(vec!["[unclosed".to_string()])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_should_ignore() {
        let config = OrganizeConfig::builder()
            .ignore_patterns(vec!["*.part".to_string(), "desktop.ini".to_string()])
            .build()
            .unwrap();

        assert!(config.should_ignore("movie.mkv.part"));
        assert!(config.should_ignore("desktop.ini"));
        assert!(!config.should_ignore("movie.mkv"));
    }

    #[test]
    fn test_should_skip_hidden() {
        let mut config = OrganizeConfig::new();
        assert!(config.should_skip_hidden(".DS_Store"));

        config.include_hidden = true;
        assert!(!config.should_skip_hidden(".DS_Store"));
    }

    #[test]
    fn test_serde_defaults() {
        let config: OrganizeConfig = serde_json::from_str(r#"{"dryRun": true}"#).unwrap();
        assert!(config.dry_run);
        assert!(config.safe_mode);
    }
}
