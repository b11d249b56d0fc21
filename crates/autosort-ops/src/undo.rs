//! Undo history for applied actions.
//!
//! Every real (non-preview) move, copy, rename and delete is recorded as an
//! [`UndoEntry`] in a bounded LIFO history. Reversal checks that the file it
//! expects is still there before touching anything, and never overwrites:
//! when the original location is occupied the file comes back under a
//! collision-safe name.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use autosort_rules::{ActionKind, ConflictPolicy};

use crate::conflict::{claim, occupied, place};
use crate::delete::restore_from_trash;
use crate::move_op::move_item;
use crate::result::ActionMeta;

/// Default number of entries kept.
pub const DEFAULT_UNDO_CAPACITY: usize = 200;

/// Lifecycle of an undo entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum UndoStatus {
    /// The action is in effect.
    #[default]
    Applied,
    /// The action was reversed.
    Undone,
    /// Reversal was attempted and failed.
    Failed,
}

/// A recorded filesystem mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoEntry {
    /// Unique ID for this entry.
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Where the file was before the action.
    pub src: PathBuf,
    /// Where the action put it (the copy, for copies; `src` for deletes).
    pub dst: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    pub collision_handled: bool,
    pub was_dry_run: bool,
    #[serde(default)]
    pub permanent: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: UndoStatus,
}

impl UndoEntry {
    /// Build an entry from an action's meta.
    ///
    /// Returns `None` for previews, for kinds that change nothing on disk
    /// and for moves or renames that left the file where it was.
    pub fn from_meta(id: u64, meta: &ActionMeta) -> Option<Self> {
        if meta.was_dry_run || !meta.kind.is_mutation() {
            return None;
        }
        let dst = match meta.kind {
            ActionKind::Delete => meta.src.clone(),
            _ => meta.dst.clone()?,
        };
        if matches!(meta.kind, ActionKind::Move | ActionKind::Rename) && dst == meta.src {
            return None;
        }

        Some(Self {
            id,
            kind: meta.kind,
            src: meta.src.clone(),
            dst,
            old_name: meta.old_name.clone(),
            new_name: meta.new_name.clone(),
            collision_handled: meta.collision_handled,
            was_dry_run: false,
            permanent: meta.permanent,
            timestamp: Utc::now(),
            status: UndoStatus::Applied,
        })
    }

    /// Check if this entry can be reversed at all.
    pub fn can_undo(&self) -> bool {
        !(self.kind == ActionKind::Delete && self.permanent)
    }

    /// Human-readable description of the recorded action.
    pub fn description(&self) -> String {
        match self.kind {
            ActionKind::Move => format!("Moved {} -> {}", self.src.display(), self.dst.display()),
            ActionKind::Copy => format!("Copied {} -> {}", self.src.display(), self.dst.display()),
            ActionKind::Rename => format!(
                "Renamed '{}' to '{}'",
                self.old_name.as_deref().unwrap_or_default(),
                self.new_name.as_deref().unwrap_or_default()
            ),
            ActionKind::Delete if self.permanent => {
                format!("Permanently deleted {}", self.src.display())
            }
            ActionKind::Delete => format!("Moved {} to trash", self.src.display()),
            ActionKind::Ignore | ActionKind::Continue => format!("{} {}", self.kind, self.src.display()),
        }
    }
}

/// Errors raised while undoing an entry.
#[derive(Debug, Error)]
pub enum UndoError {
    /// The history is empty.
    #[error("Nothing to undo")]
    NothingToUndo,

    /// No entry with that ID.
    #[error("No undo entry with id {id}")]
    EntryNotFound { id: u64 },

    /// The file the reversal would act on is gone.
    #[error("Cannot undo: {path} no longer exists")]
    MissingTarget { path: PathBuf },

    /// The recorded action cannot be reversed.
    #[error("Cannot undo entry {id}: {reason}")]
    NotReversible { id: u64, reason: String },

    /// The platform cannot perform this reversal.
    #[error("Cannot undo entry {id}: {message}")]
    Unsupported { id: u64, message: String },

    /// Permission denied while reversing.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// The history file could not be read or written.
    #[error("Failed to persist undo history at {path}: {message}")]
    Persist { path: PathBuf, message: String },
}

impl UndoError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::MissingTarget { path },
            _ => Self::Io {
                path,
                message: source.to_string(),
            },
        }
    }

    fn persist(path: &Path, message: impl ToString) -> Self {
        Self::Persist {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Bounded history, newest entry at the front.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UndoLog {
    entries: VecDeque<UndoEntry>,
    #[serde(skip, default = "default_capacity")]
    max_entries: usize,
    next_id: u64,
}

fn default_capacity() -> usize {
    DEFAULT_UNDO_CAPACITY
}

impl UndoLog {
    fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_entries.min(1000)),
            max_entries: max_entries.max(1),
            next_id: 1,
        }
    }

    fn push(&mut self, meta: &ActionMeta) -> Option<u64> {
        let entry = UndoEntry::from_meta(self.next_id, meta)?;
        self.next_id += 1;

        // Remove oldest entry if at capacity
        while self.entries.len() >= self.max_entries {
            self.entries.pop_back();
        }
        let id = entry.id;
        self.entries.push_front(entry);
        Some(id)
    }

    fn take(&mut self, id: u64) -> Option<UndoEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        self.entries.remove(index)
    }
}

/// Thread-safe LIFO undo history.
///
/// Shared between the rule executor (which records) and whoever offers undo
/// to the user; construct one and hand out an `Arc`.
#[derive(Debug)]
pub struct UndoManager {
    log: Mutex<UndoLog>,
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_CAPACITY)
    }
}

impl UndoManager {
    /// Create an empty history keeping at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            log: Mutex::new(UndoLog::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, UndoLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an applied action.
    ///
    /// Returns the new entry's ID, or `None` when the action is not
    /// recordable (a preview, a no-op kind, a move onto itself).
    pub fn record(&self, meta: &ActionMeta) -> Option<u64> {
        let id = self.lock().push(meta)?;
        info!(id, kind = %meta.kind, src = %meta.src.display(), "recorded undo entry");
        Some(id)
    }

    /// Snapshot of the history, newest first.
    pub fn history(&self) -> Vec<UndoEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Check if the history is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Maximum number of entries kept.
    pub fn capacity(&self) -> usize {
        self.lock().max_entries
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Reverse the most recent entry.
    ///
    /// The entry leaves the history whether or not the reversal succeeds.
    pub fn undo_last(&self) -> Result<UndoEntry, UndoError> {
        let mut log = self.lock();
        let entry = log.entries.pop_front().ok_or(UndoError::NothingToUndo)?;
        finish(reverse(&entry), entry)
    }

    /// Reverse an arbitrary entry.
    ///
    /// The entry leaves the history whether or not the reversal succeeds.
    pub fn undo_entry(&self, id: u64) -> Result<UndoEntry, UndoError> {
        let mut log = self.lock();
        let entry = log.take(id).ok_or(UndoError::EntryNotFound { id })?;
        finish(reverse(&entry), entry)
    }

    /// Write the history to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), UndoError> {
        let path = path.as_ref();
        let json = {
            let log = self.lock();
            serde_json::to_string_pretty(&*log).map_err(|e| UndoError::persist(path, e))?
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| UndoError::persist(path, e))?;
        }
        fs::write(path, json).map_err(|e| UndoError::persist(path, e))
    }

    /// Load a history written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>, capacity: usize) -> Result<Self, UndoError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| UndoError::persist(path, e))?;
        let mut log: UndoLog =
            serde_json::from_str(&text).map_err(|e| UndoError::persist(path, e))?;
        log.max_entries = capacity.max(1);
        log.entries.truncate(log.max_entries);
        if let Some(max_id) = log.entries.iter().map(|e| e.id).max() {
            log.next_id = log.next_id.max(max_id + 1);
        }
        Ok(Self {
            log: Mutex::new(log),
        })
    }

    /// Load a history, or start an empty one when the file does not exist.
    pub fn load_or_new(path: impl AsRef<Path>, capacity: usize) -> Result<Self, UndoError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path, capacity)
        } else {
            Ok(Self::new(capacity))
        }
    }
}

fn finish(outcome: Result<PathBuf, UndoError>, mut entry: UndoEntry) -> Result<UndoEntry, UndoError> {
    match outcome {
        Ok(restored) => {
            info!(id = entry.id, kind = %entry.kind, path = %restored.display(), "undone");
            entry.status = UndoStatus::Undone;
            Ok(entry)
        }
        Err(e) => {
            warn!(id = entry.id, kind = %entry.kind, error = %e, "undo failed");
            Err(e)
        }
    }
}

/// Reverse one entry, returning the path the file is back at (or, for a
/// copy, the path that was removed).
fn reverse(entry: &UndoEntry) -> Result<PathBuf, UndoError> {
    match entry.kind {
        ActionKind::Move | ActionKind::Rename => move_back(&entry.dst, &entry.src),
        ActionKind::Copy => {
            if !occupied(&entry.dst) {
                return Err(UndoError::MissingTarget {
                    path: entry.dst.clone(),
                });
            }
            let removed = if entry.dst.is_dir() {
                fs::remove_dir_all(&entry.dst)
            } else {
                fs::remove_file(&entry.dst)
            };
            removed.map_err(|e| UndoError::io(&entry.dst, e))?;
            Ok(entry.dst.clone())
        }
        ActionKind::Delete if entry.permanent => Err(UndoError::NotReversible {
            id: entry.id,
            reason: format!("{} was permanently deleted", entry.src.display()),
        }),
        ActionKind::Delete => {
            if occupied(&entry.src) {
                return Err(UndoError::NotReversible {
                    id: entry.id,
                    reason: format!("{} is occupied by another file", entry.src.display()),
                });
            }
            restore_from_trash(&entry.src).map_err(|message| UndoError::Unsupported {
                id: entry.id,
                message,
            })?;
            Ok(entry.src.clone())
        }
        ActionKind::Ignore | ActionKind::Continue => Err(UndoError::NotReversible {
            id: entry.id,
            reason: format!("{} changes nothing", entry.kind),
        }),
    }
}

/// Move `current` back to `original`, recreating its folder and picking a
/// collision-safe name if `original` has been taken since.
fn move_back(current: &Path, original: &Path) -> Result<PathBuf, UndoError> {
    if !occupied(current) {
        return Err(UndoError::MissingTarget {
            path: current.to_path_buf(),
        });
    }

    if let Some(parent) = original.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| UndoError::io(parent, e))?;
    }

    let placement = place(
        |_| original.to_path_buf(),
        None,
        None,
        ConflictPolicy::AutoRename,
    );
    let placement = claim(placement, ConflictPolicy::AutoRename, |dst| {
        move_item(current, dst)
    })
    .map_err(|e| UndoError::io(current, e))?;
    Ok(placement.path().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn move_meta(src: &str, dst: &str) -> ActionMeta {
        ActionMeta::new(ActionKind::Move, src, false).with_dst(dst)
    }

    #[test]
    fn test_from_meta_filters() {
        assert!(UndoEntry::from_meta(1, &move_meta("/a/x.txt", "/b/x.txt")).is_some());
        assert!(UndoEntry::from_meta(1, &move_meta("/a/x.txt", "/a/x.txt")).is_none());

        let preview = ActionMeta::new(ActionKind::Move, "/a/x.txt", true).with_dst("/b/x.txt");
        assert!(UndoEntry::from_meta(1, &preview).is_none());

        let ignore = ActionMeta::new(ActionKind::Ignore, "/a/x.txt", false);
        assert!(UndoEntry::from_meta(1, &ignore).is_none());

        let delete = ActionMeta::new(ActionKind::Delete, "/a/x.txt", false);
        let entry = UndoEntry::from_meta(1, &delete).unwrap();
        assert_eq!(entry.dst, PathBuf::from("/a/x.txt"));
    }

    #[test]
    fn test_history_newest_first() {
        let manager = UndoManager::new(10);
        manager.record(&move_meta("/a/1.txt", "/b/1.txt"));
        manager.record(&move_meta("/a/2.txt", "/b/2.txt"));

        let history = manager.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].src, PathBuf::from("/a/2.txt"));
        assert_eq!(history[1].src, PathBuf::from("/a/1.txt"));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let manager = UndoManager::default();
        for i in 1..=201 {
            manager.record(&move_meta(&format!("/a/{i}.txt"), &format!("/b/{i}.txt")));
        }

        let history = manager.history();
        assert_eq!(history.len(), DEFAULT_UNDO_CAPACITY);
        assert_eq!(history[0].id, 201);
        assert!(history.iter().all(|e| e.id != 1));
        assert_eq!(history.last().map(|e| e.id), Some(2));
    }

    #[test]
    fn test_concurrent_workers() {
        let manager = UndoManager::new(50);

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let manager = &manager;
                scope.spawn(move || {
                    for i in 0..40 {
                        manager.record(&move_meta(
                            &format!("/a/{worker}-{i}.txt"),
                            &format!("/b/{worker}-{i}.txt"),
                        ));
                        if i % 10 == 0 {
                            assert!(manager.history().len() <= 50);
                            // Reversal fails (nothing on disk) but must not
                            // disturb the other workers.
                            let _ = manager.undo_last();
                        }
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..20 {
                    let _ = manager.undo_entry(u64::MAX);
                    assert!(manager.len() <= 50);
                }
            });
        });

        let history = manager.history();
        assert_eq!(history.len(), 50);
        let mut ids: Vec<u64> = history.iter().map(|e| e.id).collect();
        assert!(ids.windows(2).all(|w| w[0] > w[1]), "newest first");
        ids.dedup();
        assert_eq!(ids.len(), 50);
        assert!(ids.iter().all(|&id| (1..=320).contains(&id)));

        // IDs keep counting after a clear from another thread.
        std::thread::scope(|scope| {
            scope.spawn(|| manager.clear());
        });
        assert!(manager.is_empty());
        let next = manager.record(&move_meta("/a/z.txt", "/b/z.txt"));
        assert_eq!(next, Some(321));
    }

    #[test]
    fn test_undo_missing_target_drops_entry() {
        let manager = UndoManager::new(10);
        manager.record(&move_meta("/nowhere/a.txt", "/nowhere/b/a.txt"));

        assert!(matches!(
            manager.undo_last(),
            Err(UndoError::MissingTarget { .. })
        ));
        assert!(manager.is_empty());
        assert!(matches!(manager.undo_last(), Err(UndoError::NothingToUndo)));
    }

    #[test]
    fn test_undo_permanent_delete_not_reversible() {
        let manager = UndoManager::new(10);
        let meta = ActionMeta::new(ActionKind::Delete, "/a/x.txt", false).with_permanent(true);
        let id = manager.record(&meta).unwrap();

        assert!(!manager.history()[0].can_undo());
        assert!(matches!(
            manager.undo_entry(id),
            Err(UndoError::NotReversible { .. })
        ));
        assert!(matches!(
            manager.undo_entry(id),
            Err(UndoError::EntryNotFound { .. })
        ));
    }

    #[test]
    fn test_undo_move_into_recreated_folder() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("inbox").join("a.txt");
        let moved = dir.path().join("a.txt");
        fs::write(&moved, "a").unwrap();

        let manager = UndoManager::new(10);
        manager.record(&move_meta(
            &original.to_string_lossy(),
            &moved.to_string_lossy(),
        ));
        let entry = manager.undo_last().unwrap();

        assert_eq!(entry.status, UndoStatus::Undone);
        assert_eq!(fs::read_to_string(&original).unwrap(), "a");
        assert!(!moved.exists());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("undo.json");

        let manager = UndoManager::new(10);
        manager.record(&move_meta("/a/1.txt", "/b/1.txt"));
        manager.record(&move_meta("/a/2.txt", "/b/2.txt"));
        manager.save(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["entries"][0]["type"], "move");
        assert_eq!(json["entries"][0]["status"], "applied");
        assert_eq!(json["entries"][0]["collisionHandled"], false);

        let loaded = UndoManager::load(&path, 10).unwrap();
        assert_eq!(loaded.history(), manager.history());
        let id = loaded.record(&move_meta("/a/3.txt", "/b/3.txt")).unwrap();
        assert_eq!(id, 3);

        let fresh = UndoManager::load_or_new(dir.path().join("missing.json"), 10).unwrap();
        assert!(fresh.is_empty());
    }
}
