//! Copy action.

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use autosort_core::{FileDescriptor, OrganizeConfig};
use autosort_rules::{ActionKind, ActionOptions};

use crate::action::{
    check_source, counter_for, describe, destination_folder, ensure_folder, error_line,
};
use crate::conflict::{Placement, claim, place};
use crate::move_op::{remove_existing, reserve};
use crate::result::{ActionMeta, ExecutionResult, log_line};

/// Copy `file` into the folder rendered from `destination`.
pub(crate) fn run_copy(
    file: &FileDescriptor,
    destination: &str,
    options: &ActionOptions,
    config: &OrganizeConfig,
) -> ExecutionResult {
    let dry_run = config.dry_run;
    let src = &file.path;

    if !dry_run && let Err(message) = check_source(file) {
        return ExecutionResult::failure(error_line(dry_run, ActionKind::Copy, src, message));
    }

    // The source itself counts as occupied: a copy never lands on its original.
    let policy = options.conflict_policy(config.safe_mode);
    let mut placement = place(
        |n| destination_folder(destination, file, options, n).join(file.name.as_str()),
        counter_for(destination, options),
        None,
        policy,
    );
    let target = placement.path().to_path_buf();

    if target == *src || (file.is_dir && target.starts_with(src)) {
        return ExecutionResult::failure(error_line(
            dry_run,
            ActionKind::Copy,
            src,
            "cannot copy onto itself",
        ));
    }
    if let Placement::Skip(_) = placement {
        return skipped(dry_run, &target);
    }
    if let Err(message) = ensure_folder(&target, options, dry_run) {
        return ExecutionResult::failure(error_line(dry_run, ActionKind::Copy, src, message));
    }

    if !dry_run {
        if let Placement::Overwrite(_) = placement
            && let Err(e) = remove_existing(&target)
        {
            return ExecutionResult::failure(error_line(
                dry_run,
                ActionKind::Copy,
                src,
                format!("cannot replace {}: {}", target.display(), describe(&e)),
            ));
        }
        placement = match claim(placement, policy, |dst| copy_item(src, dst)) {
            Ok(Placement::Skip(taken)) => return skipped(dry_run, &taken),
            Ok(claimed) => claimed,
            Err(e) => {
                return ExecutionResult::failure(error_line(
                    dry_run,
                    ActionKind::Copy,
                    src,
                    format!("failed to copy: {}", describe(&e)),
                ));
            }
        };
        debug!(src = %src.display(), dst = %placement.path().display(), "copied");
    }

    let target = placement.path();
    ExecutionResult::success(
        log_line(
            dry_run,
            format!(
                "copy: {} -> {}{}",
                src.display(),
                target.display(),
                placement.log_suffix()
            ),
        ),
        ActionMeta::new(ActionKind::Copy, src, dry_run)
            .with_dst(target)
            .with_collision_handled(placement.collision_handled()),
    )
}

fn skipped(dry_run: bool, target: &Path) -> ExecutionResult {
    ExecutionResult::failure(log_line(
        dry_run,
        format!("skipped: copy: {} already exists", target.display()),
    ))
}

/// Copy a single item (file or directory), keeping the modification time.
///
/// Fails with `AlreadyExists` instead of replacing anything at `dest`.
pub(crate) fn copy_item(source: &Path, dest: &Path) -> io::Result<()> {
    let is_dir = source.is_dir();
    reserve(dest, is_dir)?;

    let copied = if is_dir {
        copy_dir_recursive(source, dest)
    } else {
        fs::copy(source, dest).map(drop)
    };
    if let Err(e) = copied {
        if let Err(cleanup) = remove_existing(dest) {
            debug!(path = %dest.display(), error = %cleanup, "cannot remove partial copy");
        }
        return Err(e);
    }

    if !is_dir && let Err(e) = copy_modified(source, dest) {
        debug!(path = %dest.display(), error = %e, "cannot keep modification time");
    }
    Ok(())
}

fn copy_modified(source: &Path, dest: &Path) -> io::Result<()> {
    let modified = fs::metadata(source)?.modified()?;
    fs::File::options()
        .write(true)
        .open(dest)?
        .set_modified(modified)
}

/// Recursively copy the contents of `source` into `dest`, creating it if
/// needed.
pub(crate) fn copy_dir_recursive(source: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;

    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if path.is_dir() {
            copy_dir_recursive(&path, &dest_path)?;
        } else {
            fs::copy(&path, &dest_path)?;
        }
    }

    Ok(())
}
