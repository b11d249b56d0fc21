//! Structured results of running one action.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use autosort_rules::ActionKind;

/// What an action did, or would have done in a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMeta {
    pub kind: ActionKind,
    /// Path of the file the action ran on.
    pub src: PathBuf,
    /// Where the file (or its copy) ended up.
    pub dst: Option<PathBuf>,
    pub old_name: Option<String>,
    pub new_name: Option<String>,
    /// The target was occupied and a free name was picked instead.
    pub collision_handled: bool,
    /// No filesystem mutation took place.
    pub was_dry_run: bool,
    /// Delete bypassed the trash.
    #[serde(default)]
    pub permanent: bool,
}

impl ActionMeta {
    /// Meta for an action on `src` with no destination.
    pub fn new(kind: ActionKind, src: impl Into<PathBuf>, was_dry_run: bool) -> Self {
        Self {
            kind,
            src: src.into(),
            dst: None,
            old_name: None,
            new_name: None,
            collision_handled: false,
            was_dry_run,
            permanent: false,
        }
    }

    /// Set the destination and derive the old and new names from the paths.
    pub fn with_dst(mut self, dst: impl Into<PathBuf>) -> Self {
        let dst = dst.into();
        self.old_name = file_name(&self.src);
        self.new_name = file_name(&dst);
        self.dst = Some(dst);
        self
    }

    pub fn with_collision_handled(mut self, handled: bool) -> Self {
        self.collision_handled = handled;
        self
    }

    pub fn with_permanent(mut self, permanent: bool) -> Self {
        self.permanent = permanent;
        self
    }
}

fn file_name(path: &std::path::Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Outcome of one action run: a log line plus, on success, what happened.
///
/// `meta` is present exactly when `ok` is true; the two constructors are
/// the only way to build a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    ok: bool,
    log: String,
    meta: Option<ActionMeta>,
}

impl ExecutionResult {
    /// A successful (or previewed) action.
    pub fn success(log: impl Into<String>, meta: ActionMeta) -> Self {
        Self {
            ok: true,
            log: log.into(),
            meta: Some(meta),
        }
    }

    /// An action that was not applied.
    pub fn failure(log: impl Into<String>) -> Self {
        Self {
            ok: false,
            log: log.into(),
            meta: None,
        }
    }

    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn log(&self) -> &str {
        &self.log
    }

    pub fn meta(&self) -> Option<&ActionMeta> {
        self.meta.as_ref()
    }

    pub fn into_meta(self) -> Option<ActionMeta> {
        self.meta
    }
}

/// Prefix a log line for a dry run.
pub(crate) fn log_line(dry_run: bool, body: impl AsRef<str>) -> String {
    if dry_run {
        format!("preview: {}", body.as_ref())
    } else {
        body.as_ref().to_string()
    }
}
