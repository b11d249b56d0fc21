//! Content-based duplicate detection for the `isDuplicate` condition.
//!
//! Mirrors a cut-down version of a size-then-hash duplicate finder: siblings
//! are first filtered by size, and only same-size candidates are hashed with
//! BLAKE3.

use std::fs;
use std::path::Path;

use blake3::Hasher;

use autosort_core::FileDescriptor;

/// Check if another file in the same folder has identical content.
///
/// I/O failures count as "no duplicate".
pub fn has_duplicate_sibling(file: &FileDescriptor) -> bool {
    if file.is_dir {
        return false;
    }
    let Ok(entries) = fs::read_dir(&file.parent) else {
        return false;
    };

    let candidates: Vec<_> = entries
        .flatten()
        .filter(|entry| entry.path() != file.path)
        .filter(|entry| {
            entry
                .metadata()
                .is_ok_and(|m| m.is_file() && m.len() == file.size)
        })
        .map(|entry| entry.path())
        .collect();

    if candidates.is_empty() {
        return false;
    }

    let Some(own_hash) = content_hash(&file.path) else {
        return false;
    };
    candidates
        .iter()
        .any(|candidate| content_hash(candidate).is_some_and(|hash| hash == own_hash))
}

fn content_hash(path: &Path) -> Option<blake3::Hash> {
    let mut hasher = Hasher::new();
    hasher.update_mmap(path).ok()?;
    Some(hasher.finalize())
}
