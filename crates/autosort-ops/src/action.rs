//! Running actions against the filesystem.

use std::io;
use std::path::{Path, PathBuf};

use autosort_core::{FileDescriptor, OrganizeConfig};
use autosort_rules::template::{self, TemplateContext};
use autosort_rules::{Action, ActionKind, ActionOptions, CounterSettings};

use crate::copy::run_copy;
use crate::delete::run_delete;
use crate::move_op::run_move;
use crate::rename::run_rename;
use crate::result::{ActionMeta, ExecutionResult, log_line};

/// Execution of a declarative [`Action`].
pub trait ActionExt {
    /// Run the action on `file`.
    ///
    /// Expected failures (missing source, occupied target under the skip
    /// policy, permission errors) come back as a failed result, never as a
    /// panic. In a dry run nothing on disk changes.
    fn run(&self, file: &FileDescriptor, config: &OrganizeConfig) -> ExecutionResult;
}

impl ActionExt for Action {
    fn run(&self, file: &FileDescriptor, config: &OrganizeConfig) -> ExecutionResult {
        match self {
            Action::Move {
                destination,
                options,
            } => run_move(file, destination, options, config),
            Action::Copy {
                destination,
                options,
            } => run_copy(file, destination, options, config),
            Action::Rename { pattern, options } => run_rename(file, pattern, options, config),
            Action::Delete { permanent } => run_delete(file, *permanent, config),
            Action::Ignore {} => ExecutionResult::success(
                log_line(config.dry_run, format!("ignore: {}", file.path.display())),
                ActionMeta::new(ActionKind::Ignore, &file.path, config.dry_run),
            ),
            Action::Continue {} => ExecutionResult::success(
                log_line(config.dry_run, format!("continue: {}", file.path.display())),
                ActionMeta::new(ActionKind::Continue, &file.path, config.dry_run),
            ),
        }
    }
}

/// Render `template` for `file` with a counter value.
pub(crate) fn render(
    template: &str,
    file: &FileDescriptor,
    options: &ActionOptions,
    counter: u32,
) -> String {
    let ctx = TemplateContext {
        file,
        date_format: &options.date_format,
        counter,
        counter_width: options.counter.padding,
    };
    template::render(template, &ctx)
}

/// Counter settings when `template` uses `{counter}`.
pub(crate) fn counter_for(template: &str, options: &ActionOptions) -> Option<CounterSettings> {
    template::uses_counter(template).then_some(options.counter)
}

/// Render a destination folder template; relative results resolve against
/// the file's parent folder.
pub(crate) fn destination_folder(
    destination: &str,
    file: &FileDescriptor,
    options: &ActionOptions,
    counter: u32,
) -> PathBuf {
    let folder = PathBuf::from(render(destination, file, options, counter));
    if folder.is_absolute() {
        folder
    } else {
        file.parent.join(folder)
    }
}

/// Make sure the folder a target lands in exists.
///
/// Missing folders are created only in a real run with `create_folders`
/// set; a dry run just reports what would happen.
pub(crate) fn ensure_folder(
    target: &Path,
    options: &ActionOptions,
    dry_run: bool,
) -> Result<(), String> {
    let Some(folder) = target.parent() else {
        return Ok(());
    };
    if folder.is_dir() {
        return Ok(());
    }
    if folder.exists() {
        return Err(format!("{} is not a folder", folder.display()));
    }
    if !options.create_folders {
        return Err(format!("destination folder {} does not exist", folder.display()));
    }
    if dry_run {
        return Ok(());
    }
    std::fs::create_dir_all(folder)
        .map_err(|e| format!("cannot create {}: {}", folder.display(), describe(&e)))
}

/// Check that the file an action runs on is still there.
pub(crate) fn check_source(file: &FileDescriptor) -> Result<(), String> {
    match file.path.symlink_metadata() {
        Ok(_) => Ok(()),
        Err(e) => Err(format!("source {}", describe(&e))),
    }
}

/// Short description of an I/O error for a log line.
pub(crate) fn describe(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "not found".to_string(),
        io::ErrorKind::PermissionDenied => "permission denied".to_string(),
        _ => err.to_string(),
    }
}

/// Log line for a failed action, prefixed like every other preview line.
pub(crate) fn error_line(
    dry_run: bool,
    kind: ActionKind,
    path: &Path,
    message: impl AsRef<str>,
) -> String {
    log_line(
        dry_run,
        format!("error: {kind} {}: {}", path.display(), message.as_ref()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ignore_and_continue_do_not_mutate() {
        let file = FileDescriptor::new("/nowhere/a.txt");
        let config = OrganizeConfig::new();

        let result = Action::Ignore {}.run(&file, &config);
        assert!(result.ok());
        assert_eq!(result.log(), "ignore: /nowhere/a.txt");
        assert_eq!(result.meta().map(|m| m.kind), Some(ActionKind::Ignore));

        let result = Action::Continue {}.run(&file, &config.with_dry_run(true));
        assert_eq!(result.log(), "preview: continue: /nowhere/a.txt");
    }

    #[test]
    fn test_destination_folder_relative_to_parent() {
        let file = FileDescriptor::new("/home/me/Downloads/a.pdf");
        let options = ActionOptions::default();
        assert_eq!(
            destination_folder("PDFs/{ext}", &file, &options, 1),
            PathBuf::from("/home/me/Downloads/PDFs/pdf")
        );
        assert_eq!(
            destination_folder("/Archive", &file, &options, 1),
            PathBuf::from("/Archive")
        );
    }

    #[test]
    fn test_preview_failure_is_prefixed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "x").unwrap();
        let file = FileDescriptor::from_path(&path).unwrap();
        let action = Action::Move {
            destination: dir.path().join("missing").to_string_lossy().into_owned(),
            options: ActionOptions {
                create_folders: false,
                ..Default::default()
            },
        };

        let preview = action.run(&file, &OrganizeConfig::preview());
        assert!(!preview.ok());
        assert!(
            preview.log().starts_with("preview: error: move "),
            "{}",
            preview.log()
        );

        let real = action.run(&file, &OrganizeConfig::new());
        assert!(real.log().starts_with("error: move "), "{}", real.log());
        assert!(path.exists());
    }

    #[test]
    fn test_ensure_folder_respects_create_flag() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("new").join("a.txt");
        let no_create = ActionOptions {
            create_folders: false,
            ..Default::default()
        };

        assert!(ensure_folder(&target, &no_create, false).is_err());
        assert!(ensure_folder(&target, &ActionOptions::default(), true).is_ok());
        assert!(!dir.path().join("new").exists());

        ensure_folder(&target, &ActionOptions::default(), false).unwrap();
        assert!(dir.path().join("new").is_dir());
    }
}
