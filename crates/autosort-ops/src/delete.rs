//! Delete action and trash restore.

use std::fs;
use std::path::Path;

use tracing::debug;

use autosort_core::{FileDescriptor, OrganizeConfig};
use autosort_rules::ActionKind;

use crate::action::{check_source, describe, error_line};
use crate::result::{ActionMeta, ExecutionResult, log_line};

/// Send `file` to the trash, or remove it outright when `permanent`.
pub(crate) fn run_delete(
    file: &FileDescriptor,
    permanent: bool,
    config: &OrganizeConfig,
) -> ExecutionResult {
    let dry_run = config.dry_run;
    let src = &file.path;

    if !dry_run {
        if let Err(message) = check_source(file) {
            return ExecutionResult::failure(error_line(dry_run, ActionKind::Delete, src, message));
        }
        let outcome = if permanent {
            remove(src).map_err(|e| describe(&e))
        } else {
            trash::delete(src).map_err(|e| format!("cannot move to trash: {e}"))
        };
        if let Err(message) = outcome {
            return ExecutionResult::failure(error_line(dry_run, ActionKind::Delete, src, message));
        }
        debug!(path = %src.display(), permanent, "deleted");
    }

    let how = if permanent { "permanently" } else { "to trash" };
    let mut meta = ActionMeta::new(ActionKind::Delete, src, dry_run).with_permanent(permanent);
    meta.old_name = Some(file.name.to_string());

    ExecutionResult::success(
        log_line(dry_run, format!("delete: {} ({how})", src.display())),
        meta,
    )
}

fn remove(path: &Path) -> std::io::Result<()> {
    if path.symlink_metadata()?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Put the most recently trashed item that came from `original` back.
#[cfg(any(
    target_os = "windows",
    all(
        unix,
        not(target_os = "macos"),
        not(target_os = "ios"),
        not(target_os = "android")
    )
))]
pub(crate) fn restore_from_trash(original: &Path) -> Result<(), String> {
    let items = trash::os_limited::list().map_err(|e| e.to_string())?;
    let item = items
        .into_iter()
        .filter(|item| item.original_path() == original)
        .max_by_key(|item| item.time_deleted)
        .ok_or_else(|| format!("{} is not in the trash", original.display()))?;
    trash::os_limited::restore_all([item]).map_err(|e| e.to_string())
}

#[cfg(not(any(
    target_os = "windows",
    all(
        unix,
        not(target_os = "macos"),
        not(target_os = "ios"),
        not(target_os = "android")
    )
)))]
pub(crate) fn restore_from_trash(original: &Path) -> Result<(), String> {
    Err(format!(
        "restoring {} from the trash is not supported on this platform",
        original.display()
    ))
}
