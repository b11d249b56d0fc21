//! File descriptor types.

use std::collections::BTreeMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::CoreError;

/// File metadata timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    /// Last modification time.
    pub modified: SystemTime,
    /// Last access time (if available).
    pub accessed: Option<SystemTime>,
    /// Creation time (if available, platform-dependent).
    pub created: Option<SystemTime>,
}

impl Timestamps {
    /// Create timestamps with only modified time.
    pub fn with_modified(modified: SystemTime) -> Self {
        Self {
            modified,
            accessed: None,
            created: None,
        }
    }

    /// Create timestamps with all available times.
    pub fn new(
        modified: SystemTime,
        accessed: Option<SystemTime>,
        created: Option<SystemTime>,
    ) -> Self {
        Self {
            modified,
            accessed,
            created,
        }
    }

    /// Read the timestamps from file metadata.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            accessed: metadata.accessed().ok(),
            created: metadata.created().ok(),
        }
    }

    /// Get the timestamp selected by `field`.
    pub fn get(&self, field: DateField) -> Option<SystemTime> {
        match field {
            DateField::Modified => Some(self.modified),
            DateField::Accessed => self.accessed,
            DateField::Created => self.created,
        }
    }
}

/// Which timestamp a date condition looks at.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "lowercase")]
pub enum DateField {
    Created,
    #[default]
    Modified,
    Accessed,
}

/// Finder-style color label attached to a file by the host platform.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ColorLabel {
    #[default]
    None,
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Gray,
}

/// Immutable snapshot of one filesystem entry.
///
/// A descriptor is built fresh for every evaluation and never mutated;
/// relocating a file produces a new descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Absolute path to the entry.
    pub path: PathBuf,

    /// File name including extension.
    pub name: CompactString,

    /// Extension without the leading dot.
    pub extension: Option<CompactString>,

    /// Size in bytes (zero for directories).
    pub size: u64,

    /// File metadata timestamps.
    pub timestamps: Timestamps,

    /// Hidden entry (dot-file, or hidden attribute on Windows).
    pub hidden: bool,

    /// System entry (Windows system attribute).
    pub system: bool,

    /// Read-only permissions.
    pub read_only: bool,

    /// Entry is a directory.
    pub is_dir: bool,

    /// Folder containing the entry.
    pub parent: PathBuf,

    /// Color label supplied by the host platform.
    #[serde(default)]
    pub color: ColorLabel,

    /// Tags supplied by the host platform.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Free-form metadata (EXIF, ID3, document properties, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl FileDescriptor {
    /// Create a descriptor for `path` with default attributes, without
    /// touching the disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (name, extension, parent) = split_path(&path);
        let hidden = name.starts_with('.');
        Self {
            path,
            name,
            extension,
            size: 0,
            timestamps: Timestamps::with_modified(SystemTime::now()),
            hidden,
            system: false,
            read_only: false,
            is_dir: false,
            parent,
            color: ColorLabel::None,
            tags: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Snapshot an entry from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| CoreError::io(path, e))?
                .join(path)
        };
        let metadata = std::fs::metadata(&path).map_err(|e| CoreError::io(&path, e))?;
        Ok(Self::from_metadata(path, &metadata))
    }

    /// Build a descriptor from already-fetched metadata.
    pub fn from_metadata(path: PathBuf, metadata: &Metadata) -> Self {
        let (name, extension, parent) = split_path(&path);
        let hidden = name.starts_with('.') || has_hidden_attribute(metadata);
        Self {
            name,
            extension,
            parent,
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            timestamps: Timestamps::from_metadata(metadata),
            hidden,
            system: has_system_attribute(metadata),
            read_only: metadata.permissions().readonly(),
            is_dir: metadata.is_dir(),
            color: ColorLabel::None,
            tags: Vec::new(),
            metadata: BTreeMap::new(),
            path,
        }
    }

    /// Derive a snapshot of this entry at another location.
    ///
    /// Every attribute except the location-derived ones is carried over.
    pub fn relocated(&self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (name, extension, parent) = split_path(&path);
        Self {
            path,
            name,
            extension,
            parent,
            ..self.clone()
        }
    }

    /// Set the size in bytes.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Set the timestamps.
    pub fn with_timestamps(mut self, timestamps: Timestamps) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Set the color label.
    pub fn with_color(mut self, color: ColorLabel) -> Self {
        self.color = color;
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the hidden/system/read-only/directory flags.
    pub fn with_flags(mut self, hidden: bool, system: bool, read_only: bool, is_dir: bool) -> Self {
        self.hidden = hidden;
        self.system = system;
        self.read_only = read_only;
        self.is_dir = is_dir;
        self
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        match &self.extension {
            Some(ext) if self.name.len() > ext.len() + 1 => {
                &self.name[..self.name.len() - ext.len() - 1]
            }
            _ => &self.name,
        }
    }

    /// Name of the containing folder.
    pub fn parent_name(&self) -> &str {
        self.parent
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
    }
}

fn split_path(path: &Path) -> (CompactString, Option<CompactString>, PathBuf) {
    let name = path
        .file_name()
        .map(|n| CompactString::from(n.to_string_lossy().as_ref()))
        .unwrap_or_default();
    // Dot-files like ".bashrc" have no extension.
    let extension = path
        .extension()
        .map(|e| CompactString::from(e.to_string_lossy().as_ref()));
    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
    (name, extension, parent)
}

#[cfg(windows)]
fn has_hidden_attribute(metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    metadata.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
}

#[cfg(not(windows))]
fn has_hidden_attribute(_metadata: &Metadata) -> bool {
    false
}

#[cfg(windows)]
fn has_system_attribute(metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;
    metadata.file_attributes() & FILE_ATTRIBUTE_SYSTEM != 0
}

#[cfg(not(windows))]
fn has_system_attribute(_metadata: &Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_splits_path() {
        let file = FileDescriptor::new("/home/user/Downloads/report.final.pdf");
        assert_eq!(file.name, "report.final.pdf");
        assert_eq!(file.extension.as_deref(), Some("pdf"));
        assert_eq!(file.stem(), "report.final");
        assert_eq!(file.parent, PathBuf::from("/home/user/Downloads"));
        assert_eq!(file.parent_name(), "Downloads");
        assert!(!file.hidden);
    }

    #[test]
    fn test_dotfile_is_hidden_without_extension() {
        let file = FileDescriptor::new("/home/user/.bashrc");
        assert!(file.hidden);
        assert!(file.extension.is_none());
        assert_eq!(file.stem(), ".bashrc");
    }

    #[test]
    fn test_relocated_keeps_attributes() {
        let file = FileDescriptor::new("/a/report.txt")
            .with_size(42)
            .with_tag("work");
        let moved = file.relocated("/b/summary.md");

        assert_eq!(moved.name, "summary.md");
        assert_eq!(moved.extension.as_deref(), Some("md"));
        assert_eq!(moved.parent, PathBuf::from("/b"));
        assert_eq!(moved.size, 42);
        assert_eq!(moved.tags, vec!["work".to_string()]);
        // The original snapshot is untouched.
        assert_eq!(file.path, PathBuf::from("/a/report.txt"));
    }

    #[test]
    fn test_timestamps_get() {
        let now = SystemTime::now();
        let ts = Timestamps::with_modified(now);
        assert_eq!(ts.get(DateField::Modified), Some(now));
        assert_eq!(ts.get(DateField::Created), None);
    }

    #[test]
    fn test_color_label_parse() {
        assert_eq!("Red".parse::<ColorLabel>().unwrap(), ColorLabel::Red);
        assert_eq!(ColorLabel::Purple.to_string(), "purple");
    }
}
