//! Normalized filesystem change records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of change a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChangeType {
    /// Placeholder carried by the empty record
    #[default]
    None,
    NewFile,
    NewFolder,
    Modified,
    Deleted,
    Renamed,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeType::None => "None",
            ChangeType::NewFile => "NewFile",
            ChangeType::NewFolder => "NewFolder",
            ChangeType::Modified => "Modified",
            ChangeType::Deleted => "Deleted",
            ChangeType::Renamed => "Renamed",
        };
        f.write_str(name)
    }
}

/// One detected filesystem change
///
/// Records are immutable once built. `old_path`/`old_name` are only
/// populated for `Renamed`, in which case `path`/`name` describe the
/// new location.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeRecord {
    change_type: ChangeType,
    path: PathBuf,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    old_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    old_name: Option<String>,
}

impl ChangeRecord {
    /// Build a single-path record (`NewFile`, `NewFolder`, `Modified`, `Deleted`)
    pub fn new(change_type: ChangeType, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = base_name(&path);
        Self {
            change_type,
            path,
            name,
            old_path: None,
            old_name: None,
        }
    }

    /// Build a `Renamed` record
    pub fn renamed(old_path: impl Into<PathBuf>, new_path: impl Into<PathBuf>) -> Self {
        let old_path = old_path.into();
        let path = new_path.into();
        Self {
            change_type: ChangeType::Renamed,
            name: base_name(&path),
            old_name: Some(base_name(&old_path)),
            old_path: Some(old_path),
            path,
        }
    }

    /// The record handed out when nothing was pending
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn change_type(&self) -> ChangeType {
        self.change_type
    }

    /// Path the change refers to (the new path for renames)
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn old_path(&self) -> Option<&Path> {
        self.old_path.as_deref()
    }

    pub fn old_name(&self) -> Option<&str> {
        self.old_name.as_deref()
    }

    pub fn is_rename(&self) -> bool {
        self.change_type == ChangeType::Renamed
    }

    pub fn is_empty(&self) -> bool {
        self.change_type == ChangeType::None
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
