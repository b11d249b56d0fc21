//! Target resolution and collision handling.

use std::io;
use std::path::{Path, PathBuf};

use autosort_rules::{ConflictPolicy, CounterSettings};

/// Upper bound on `{counter}` values tried before falling back to the
/// conflict policy.
const COUNTER_LIMIT: u32 = 10_000;

/// Fresh names tried by [`claim`] before it gives up.
const CLAIM_ATTEMPTS: u32 = 100;

/// Where an action should write, after collision handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Placement {
    /// The target is free (or is the source itself).
    Free(PathBuf),
    /// The target was occupied; a free sibling name was picked.
    Renamed(PathBuf),
    /// The target is occupied and will be replaced.
    Overwrite(PathBuf),
    /// The target is occupied and the action must not run.
    Skip(PathBuf),
}

impl Placement {
    pub(crate) fn path(&self) -> &Path {
        match self {
            Self::Free(p) | Self::Renamed(p) | Self::Overwrite(p) | Self::Skip(p) => p,
        }
    }

    pub(crate) fn collision_handled(&self) -> bool {
        matches!(self, Self::Renamed(_))
    }

    /// Suffix appended to the action's log line.
    pub(crate) fn log_suffix(&self) -> &'static str {
        match self {
            Self::Renamed(_) => " (renamed to avoid a name collision)",
            Self::Overwrite(_) => " (overwrote existing file)",
            Self::Free(_) | Self::Skip(_) => "",
        }
    }
}

/// Check if something already exists at `path`, dangling symlinks included.
pub(crate) fn occupied(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Pick the path an action writes to.
///
/// `candidate` renders the target for a counter value. When the template
/// uses `{counter}` the counter steps from its start value until a free
/// name comes up; otherwise (or when it runs out) an occupied target is
/// handled by `policy`. When `source` is given, a target equal to it is
/// treated as free.
pub(crate) fn place(
    candidate: impl Fn(u32) -> PathBuf,
    counter: Option<CounterSettings>,
    source: Option<&Path>,
    policy: ConflictPolicy,
) -> Placement {
    let is_free = |path: &Path| source == Some(path) || !occupied(path);

    let start = counter.map(|c| c.start).unwrap_or(1);
    if counter.is_some() {
        for value in start..start.saturating_add(COUNTER_LIMIT) {
            let path = candidate(value);
            if is_free(&path) {
                return if value == start {
                    Placement::Free(path)
                } else {
                    Placement::Renamed(path)
                };
            }
        }
    }

    let path = candidate(start);
    if is_free(&path) {
        return Placement::Free(path);
    }

    match policy {
        ConflictPolicy::AutoRename => Placement::Renamed(auto_rename_path(&path)),
        ConflictPolicy::Overwrite => Placement::Overwrite(path),
        ConflictPolicy::Skip => Placement::Skip(path),
    }
}

/// Write to the placement's path, falling back to a fresh name whenever
/// another writer took it after [`place`] looked.
///
/// `write` must fail with `AlreadyExists` instead of replacing an existing
/// item. Under the skip policy a lost race turns into [`Placement::Skip`];
/// otherwise the write is retried under the next free sibling name.
pub(crate) fn claim(
    placement: Placement,
    policy: ConflictPolicy,
    mut write: impl FnMut(&Path) -> io::Result<()>,
) -> io::Result<Placement> {
    let base = match &placement {
        Placement::Renamed(path) => unnumbered(path),
        other => other.path().to_path_buf(),
    };
    let mut placement = placement;

    for _ in 0..CLAIM_ATTEMPTS {
        match write(placement.path()) {
            Ok(()) => return Ok(placement),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if matches!(policy, ConflictPolicy::Skip) {
                    return Ok(Placement::Skip(placement.path().to_path_buf()));
                }
                placement = Placement::Renamed(auto_rename_path(&base));
            }
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name left next to {}", base.display()),
    ))
}

/// Strip a trailing " (N)" added by [`auto_rename_path`].
fn unnumbered(path: &Path) -> PathBuf {
    let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return path.to_path_buf();
    };
    let (stem, extension) = match file_name.rfind('.') {
        Some(dot) if dot > 0 => (&file_name[..dot], Some(&file_name[dot..])),
        _ => (file_name.as_str(), None),
    };
    let Some(open) = stem.rfind(" (") else {
        return path.to_path_buf();
    };
    let number = &stem[open + 2..];
    let Some(digits) = number.strip_suffix(')') else {
        return path.to_path_buf();
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return path.to_path_buf();
    }
    path.with_file_name(format!("{}{}", &stem[..open], extension.unwrap_or_default()))
}

/// Generate a free sibling path to avoid a conflict.
///
/// For "file.txt", tries "file (1).txt", "file (2).txt", etc.
pub fn auto_rename_path(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new(""));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    // Dot-files such as ".env" keep the whole name as their stem.
    let (stem, extension) = match file_name.rfind('.') {
        Some(dot) if dot > 0 => (&file_name[..dot], Some(&file_name[dot + 1..])),
        _ => (file_name.as_str(), None),
    };

    for i in 1..1000 {
        let new_name = match extension {
            Some(ext) => format!("{stem} ({i}).{ext}"),
            None => format!("{stem} ({i})"),
        };

        let new_path = parent.join(&new_name);
        if !occupied(&new_path) {
            return new_path;
        }
    }

    // Fallback: use timestamp
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let new_name = match extension {
        Some(ext) => format!("{stem}_{timestamp}.{ext}"),
        None => format!("{stem}_{timestamp}"),
    };

    parent.join(&new_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_auto_rename_path() {
        let path = PathBuf::from("/tmp/autosort-missing-dir/test.txt");
        let renamed = auto_rename_path(&path);
        assert_eq!(renamed, PathBuf::from("/tmp/autosort-missing-dir/test (1).txt"));
    }

    #[test]
    fn test_auto_rename_no_extension() {
        let path = PathBuf::from("/tmp/autosort-missing-dir/testfile");
        let renamed = auto_rename_path(&path);
        assert!(renamed.to_string_lossy().ends_with("testfile (1)"));
    }

    #[test]
    fn test_auto_rename_skips_taken_names() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        fs::write(dir.path().join("a (1).txt"), "").unwrap();

        let renamed = auto_rename_path(&dir.path().join("a.txt"));
        assert_eq!(renamed, dir.path().join("a (2).txt"));
    }

    #[test]
    fn test_place_policies() {
        let dir = TempDir::new().unwrap();
        let taken = dir.path().join("taken.txt");
        fs::write(&taken, "").unwrap();
        let target = |_: u32| taken.clone();

        assert_eq!(
            place(target, None, None, ConflictPolicy::AutoRename),
            Placement::Renamed(dir.path().join("taken (1).txt"))
        );
        assert_eq!(
            place(target, None, None, ConflictPolicy::Overwrite),
            Placement::Overwrite(taken.clone())
        );
        assert_eq!(
            place(target, None, None, ConflictPolicy::Skip),
            Placement::Skip(taken.clone())
        );
        assert_eq!(
            place(target, None, Some(&taken), ConflictPolicy::Skip),
            Placement::Free(taken.clone())
        );
    }

    #[test]
    fn test_unnumbered() {
        assert_eq!(unnumbered(Path::new("/t/x (12).txt")), PathBuf::from("/t/x.txt"));
        assert_eq!(unnumbered(Path::new("/t/x (1)")), PathBuf::from("/t/x"));
        assert_eq!(unnumbered(Path::new("/t/x (a).txt")), PathBuf::from("/t/x (a).txt"));
        assert_eq!(unnumbered(Path::new("/t/plain.txt")), PathBuf::from("/t/plain.txt"));
    }

    #[test]
    fn test_claim_retries_after_lost_race() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("x.txt");
        let mut attempts = Vec::new();

        // Another writer creates the target between `place` and the write.
        let placement = place(|_| target.clone(), None, None, ConflictPolicy::AutoRename);
        assert_eq!(placement, Placement::Free(target.clone()));
        fs::write(&target, "theirs").unwrap();

        let claimed = claim(placement, ConflictPolicy::AutoRename, |dst| {
            attempts.push(dst.to_path_buf());
            fs::File::options().write(true).create_new(true).open(dst).map(drop)
        })
        .unwrap();

        assert_eq!(claimed, Placement::Renamed(dir.path().join("x (1).txt")));
        assert_eq!(attempts, vec![target.clone(), dir.path().join("x (1).txt")]);
        assert_eq!(fs::read_to_string(&target).unwrap(), "theirs");
    }

    #[test]
    fn test_claim_renamed_retry_restarts_from_base_name() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("x.txt"), "").unwrap();
        fs::write(dir.path().join("x (1).txt"), "").unwrap();

        let claimed = claim(
            Placement::Renamed(dir.path().join("x (1).txt")),
            ConflictPolicy::AutoRename,
            |dst| fs::File::options().write(true).create_new(true).open(dst).map(drop),
        )
        .unwrap();
        assert_eq!(claimed, Placement::Renamed(dir.path().join("x (2).txt")));
    }

    #[test]
    fn test_claim_skip_policy_and_other_errors() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("x.txt");
        fs::write(&target, "").unwrap();

        let claimed = claim(Placement::Free(target.clone()), ConflictPolicy::Skip, |dst| {
            fs::File::options().write(true).create_new(true).open(dst).map(drop)
        })
        .unwrap();
        assert_eq!(claimed, Placement::Skip(target.clone()));

        let err = claim(Placement::Free(target), ConflictPolicy::AutoRename, |_| {
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        })
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_place_steps_counter() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("img_01.jpg"), "").unwrap();
        fs::write(dir.path().join("img_02.jpg"), "").unwrap();

        let counter = CounterSettings {
            start: 1,
            padding: 2,
        };
        let placement = place(
            |n| dir.path().join(format!("img_{n:02}.jpg")),
            Some(counter),
            None,
            ConflictPolicy::Skip,
        );
        assert_eq!(placement, Placement::Renamed(dir.path().join("img_03.jpg")));
        assert!(placement.collision_handled());
    }
}
