//! Move action.

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
use crate::copy::copy_dir_recursive;
use crate::result::{ActionMeta, ExecutionResult, log_line};

/// Move `file` into the folder rendered from `destination`.
pub(crate) fn run_move(
    file: &FileDescriptor,
    destination: &str,
    options: &ActionOptions,
    config: &OrganizeConfig,
) -> ExecutionResult {
    let dry_run = config.dry_run;
    let src = &file.path;

    if !dry_run && let Err(message) = check_source(file) {
        return ExecutionResult::failure(error_line(dry_run, ActionKind::Move, src, message));
    }

    let policy = options.conflict_policy(config.safe_mode);
    let mut placement = place(
        |n| destination_folder(destination, file, options, n).join(file.name.as_str()),
        counter_for(destination, options),
        Some(src),
        policy,
    );
    let target = placement.path().to_path_buf();

    if target == *src {
        return ExecutionResult::success(
            log_line(dry_run, format!("move: {} already in place", src.display())),
            ActionMeta::new(ActionKind::Move, src, dry_run).with_dst(&target),
        );
    }
    if file.is_dir && target.starts_with(src) {
        return ExecutionResult::failure(error_line(
            dry_run,
            ActionKind::Move,
            src,
            "cannot move a folder into itself",
        ));
    }
    if let Placement::Skip(_) = placement {
        return skipped(dry_run, &target);
    }
    if let Err(message) = ensure_folder(&target, options, dry_run) {
        return ExecutionResult::failure(error_line(dry_run, ActionKind::Move, src, message));
    }

    if !dry_run {
        if let Placement::Overwrite(_) = placement
            && let Err(e) = remove_existing(&target)
        {
            return ExecutionResult::failure(error_line(
                dry_run,
                ActionKind::Move,
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
                    ActionKind::Move,
                    src,
                    describe(&e),
                ));
            }
        };
        debug!(src = %src.display(), dst = %placement.path().display(), "moved");
    }

    let target = placement.path();
    ExecutionResult::success(
        log_line(
            dry_run,
            format!(
                "move: {} -> {}{}",
                src.display(),
                target.display(),
                placement.log_suffix()
            ),
        ),
        ActionMeta::new(ActionKind::Move, src, dry_run)
            .with_dst(target)
            .with_collision_handled(placement.collision_handled()),
    )
}

fn skipped(dry_run: bool, target: &Path) -> ExecutionResult {
    ExecutionResult::failure(log_line(
        dry_run,
        format!("skipped: move: {} already exists", target.display()),
    ))
}

/// Remove whatever occupies `path` so it can be replaced.
pub(crate) fn remove_existing(path: &Path) -> io::Result<()> {
    if path.symlink_metadata()?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Create an empty placeholder at `dest`, failing with `AlreadyExists` if
/// anything is there.
pub(crate) fn reserve(dest: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        fs::create_dir(dest)
    } else {
        fs::File::options()
            .write(true)
            .create_new(true)
            .open(dest)
            .map(drop)
    }
}

fn release(dest: &Path, is_dir: bool) {
    let released = if is_dir {
        fs::remove_dir(dest)
    } else {
        fs::remove_file(dest)
    };
    if let Err(e) = released {
        debug!(path = %dest.display(), error = %e, "cannot remove placeholder");
    }
}

/// Move a single item (file or directory) to `dest`.
///
/// Never replaces an existing item: when `dest` is taken the move fails
/// with `AlreadyExists` and nothing changes.
pub(crate) fn move_item(source: &Path, dest: &Path) -> io::Result<()> {
    let is_dir = source.symlink_metadata()?.is_dir();
    reserve(dest, is_dir)?;

    // Rename over our own placeholder (fast path for same filesystem)
    let err = match fs::rename(source, dest) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    // Directories cannot replace a placeholder on every platform; those and
    // cross-filesystem moves fall back to copy + delete.
    if err.kind() != io::ErrorKind::CrossesDevices && !is_dir {
        release(dest, is_dir);
        return Err(err);
    }

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

    if is_dir {
        fs::remove_dir_all(source)
    } else {
        fs::remove_file(source)
    }
}
