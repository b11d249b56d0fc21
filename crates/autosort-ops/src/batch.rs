//! Manual organize pass over a folder.

use std::path::{Path, PathBuf};
use std::time::Duration;

use jwalk::{Parallelism, WalkDir};
use rayon::prelude::*;
use tracing::{info, warn};

use autosort_core::{CoreError, FileDescriptor, OrganizeConfig};
use autosort_rules::Rule;

use crate::executor::{ExecutionReport, RuleExecutor};

/// Run `rules` over every file in `root`.
///
/// Only the top level is visited unless `include_subfolders` is set.
/// Entries matching an ignore pattern are skipped (ignored folders are not
/// descended into), as are hidden entries unless `include_hidden` is set.
/// Files are collected before any action runs, then processed in parallel.
pub fn organize_folder(
    root: &Path,
    rules: &[Rule],
    config: &OrganizeConfig,
    executor: &RuleExecutor,
) -> Result<Vec<ExecutionReport>, CoreError> {
    let metadata = std::fs::metadata(root).map_err(|e| CoreError::io(root, e))?;
    if !metadata.is_dir() {
        return Err(CoreError::NotADirectory {
            path: root.to_path_buf(),
        });
    }
    config.validate()?;

    let files = collect_files(root, config);
    info!(root = %root.display(), files = files.len(), dry_run = config.dry_run, "organizing");

    Ok(files
        .par_iter()
        .map(|file| executor.execute(rules, file, config))
        .collect())
}

/// Files under `root` that an organize pass should look at.
pub fn collect_files(root: &Path, config: &OrganizeConfig) -> Vec<FileDescriptor> {
    let filter = config.clone();
    let walker = WalkDir::new(root)
        .parallelism(Parallelism::RayonDefaultPool {
            busy_timeout: Duration::from_millis(100),
        })
        .skip_hidden(!config.include_hidden)
        .follow_links(false)
        .min_depth(1)
        .max_depth(if config.include_subfolders { usize::MAX } else { 1 })
        .process_read_dir(move |_depth, _path, _state, children| {
            children.retain(|entry| match entry {
                Ok(entry) => !filter.should_ignore(&entry.file_name.to_string_lossy()),
                Err(_) => true,
            });
        });

    let mut files = Vec::new();
    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                warn!(error = %err, "cannot read entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path: PathBuf = entry.path();
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot read metadata");
                continue;
            }
        };
        let file = FileDescriptor::from_metadata(path, &metadata);
        if file.hidden && !config.include_hidden {
            continue;
        }
        files.push(file);
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join(".hidden"), "h").unwrap();
        fs::write(dir.path().join("skip.tmp"), "t").unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("b.txt"), "b").unwrap();
        dir
    }

    fn names(files: &[FileDescriptor]) -> Vec<String> {
        files.iter().map(|f| f.name.to_string()).collect()
    }

    #[test]
    fn test_collect_top_level_only() {
        let dir = tree();
        let config = OrganizeConfig::builder()
            .ignore_patterns(vec!["*.tmp".to_string()])
            .build()
            .unwrap();

        assert_eq!(names(&collect_files(dir.path(), &config)), vec!["a.txt"]);
    }

    #[test]
    fn test_collect_recursive_with_hidden() {
        let dir = tree();
        let config = OrganizeConfig::builder()
            .include_subfolders(true)
            .include_hidden(true)
            .build()
            .unwrap();

        let mut found = names(&collect_files(dir.path(), &config));
        found.sort();
        assert_eq!(found, vec![".hidden", "a.txt", "b.txt", "skip.tmp"]);
    }

    #[test]
    fn test_organize_rejects_file_root() {
        let dir = tree();
        let executor = RuleExecutor::new(Default::default());
        let result = organize_folder(&dir.path().join("a.txt"), &[], &OrganizeConfig::new(), &executor);
        assert!(matches!(result, Err(CoreError::NotADirectory { .. })));
    }
}
