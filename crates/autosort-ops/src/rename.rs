//! Rename action.

use std::path::Path;

use tracing::debug;

use autosort_core::{FileDescriptor, OrganizeConfig};
use autosort_rules::{ActionKind, ActionOptions};

use crate::action::{check_source, counter_for, describe, error_line, render};
use crate::conflict::{Placement, claim, place};
use crate::move_op::{move_item, remove_existing};
use crate::result::{ActionMeta, ExecutionResult, log_line};

/// Rename `file` in place to the name rendered from `pattern`.
pub(crate) fn run_rename(
    file: &FileDescriptor,
    pattern: &str,
    options: &ActionOptions,
    config: &OrganizeConfig,
) -> ExecutionResult {
    let dry_run = config.dry_run;
    let src = &file.path;

    if !dry_run && let Err(message) = check_source(file) {
        return ExecutionResult::failure(error_line(dry_run, ActionKind::Rename, src, message));
    }

    let start = options.counter.start;
    let new_name = rendered_name(pattern, file, options, start);
    if let Err(message) = validate_filename(&new_name) {
        return ExecutionResult::failure(error_line(
            dry_run,
            ActionKind::Rename,
            src,
            format!("invalid name '{new_name}': {message}"),
        ));
    }

    let policy = options.conflict_policy(config.safe_mode);
    let mut placement = place(
        |n| file.parent.join(rendered_name(pattern, file, options, n)),
        counter_for(pattern, options),
        Some(src),
        policy,
    );
    let target = placement.path().to_path_buf();

    if target == *src {
        return ExecutionResult::success(
            log_line(dry_run, format!("rename: {} unchanged", file.name)),
            ActionMeta::new(ActionKind::Rename, src, dry_run).with_dst(&target),
        );
    }
    if let Placement::Skip(_) = placement {
        return skipped(dry_run, &target);
    }

    if !dry_run {
        if let Placement::Overwrite(_) = placement
            && let Err(e) = remove_existing(&target)
        {
            return ExecutionResult::failure(error_line(
                dry_run,
                ActionKind::Rename,
                src,
                format!("cannot replace {}: {}", target.display(), describe(&e)),
            ));
        }
        placement = match claim(placement, policy, |dst| move_item(src, dst)) {
            Ok(Placement::Skip(taken)) => return skipped(dry_run, &taken),
            Ok(claimed) => claimed,
            Err(e) => {
                return ExecutionResult::failure(error_line(
                    dry_run,
                    ActionKind::Rename,
                    src,
                    describe(&e),
                ));
            }
        };
        debug!(src = %src.display(), dst = %placement.path().display(), "renamed");
    }

    let target = placement.path();
    let target_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    ExecutionResult::success(
        log_line(
            dry_run,
            format!(
                "rename: {} -> {}{}",
                file.name,
                target_name,
                placement.log_suffix()
            ),
        ),
        ActionMeta::new(ActionKind::Rename, src, dry_run)
            .with_dst(target)
            .with_collision_handled(placement.collision_handled()),
    )
}

fn skipped(dry_run: bool, target: &Path) -> ExecutionResult {
    ExecutionResult::failure(log_line(
        dry_run,
        format!("skipped: rename: {} already exists", target.display()),
    ))
}

/// Render a file name; a trailing dot left by an empty `{ext}` is dropped.
fn rendered_name(pattern: &str, file: &FileDescriptor, options: &ActionOptions, n: u32) -> String {
    let name = render(pattern, file, options, n);
    name.trim_end_matches('.').to_string()
}

/// Validate a filename for cross-platform compatibility.
pub fn validate_filename(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name cannot be empty".into());
    }

    if name.len() > 255 {
        return Err("Name is too long (max 255 characters)".into());
    }

    // Check for invalid characters
    let invalid_chars = ['/', '\0'];
    for c in invalid_chars {
        if name.contains(c) {
            return Err(format!("Name cannot contain '{}'", c));
        }
    }

    #[cfg(target_os = "windows")]
    {
        let windows_invalid = ['\\', ':', '*', '?', '"', '<', '>', '|'];
        for c in windows_invalid {
            if name.contains(c) {
                return Err(format!("Name cannot contain '{}'", c));
            }
        }

        let reserved = [
            "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
            "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
        ];
        let upper_name = name.to_uppercase();
        let base_name = upper_name.split('.').next().unwrap_or("");
        if reserved.contains(&base_name) {
            return Err("Reserved filename".into());
        }
    }

    if name.starts_with(' ') || name.ends_with(' ') {
        return Err("Name cannot start or end with spaces".into());
    }

    if name == "." || name == ".." {
        return Err("'.' and '..' are reserved names".into());
    }

    Ok(())
}
