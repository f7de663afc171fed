//! Notification-category mask
//!
//! Selects which kinds of metadata changes a session reacts to, e.g. only
//! directory name changes. The default mask covers file names, directory
//! names and write times.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;
use thiserror::Error;

/// A single category of change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyCategory {
    FileName,
    DirectoryName,
    Attributes,
    Size,
    LastWrite,
    LastAccess,
    CreationTime,
    Security,
}

impl NotifyCategory {
    pub const ALL: [NotifyCategory; 8] = [
        NotifyCategory::FileName,
        NotifyCategory::DirectoryName,
        NotifyCategory::Attributes,
        NotifyCategory::Size,
        NotifyCategory::LastWrite,
        NotifyCategory::LastAccess,
        NotifyCategory::CreationTime,
        NotifyCategory::Security,
    ];

    fn bit(self) -> u8 {
        match self {
            NotifyCategory::FileName => 1 << 0,
            NotifyCategory::DirectoryName => 1 << 1,
            NotifyCategory::Attributes => 1 << 2,
            NotifyCategory::Size => 1 << 3,
            NotifyCategory::LastWrite => 1 << 4,
            NotifyCategory::LastAccess => 1 << 5,
            NotifyCategory::CreationTime => 1 << 6,
            NotifyCategory::Security => 1 << 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NotifyCategory::FileName => "file_name",
            NotifyCategory::DirectoryName => "directory_name",
            NotifyCategory::Attributes => "attributes",
            NotifyCategory::Size => "size",
            NotifyCategory::LastWrite => "last_write",
            NotifyCategory::LastAccess => "last_access",
            NotifyCategory::CreationTime => "creation_time",
            NotifyCategory::Security => "security",
        }
    }
}

impl fmt::Display for NotifyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown notification category '{0}'")]
pub struct ParseCategoryError(String);

impl FromStr for NotifyCategory {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        NotifyCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

/// Bit set of notification categories
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotifyFilter(u8);

impl NotifyFilter {
    pub const EMPTY: NotifyFilter = NotifyFilter(0);

    pub fn from_categories<I>(categories: I) -> Self
    where
        I: IntoIterator<Item = NotifyCategory>,
    {
        categories
            .into_iter()
            .fold(Self::EMPTY, |filter, category| filter | category)
    }

    pub fn all() -> Self {
        Self::from_categories(NotifyCategory::ALL)
    }

    pub fn contains(self, category: NotifyCategory) -> bool {
        self.0 & category.bit() != 0
    }

    /// True when the two sets share at least one category
    pub fn intersects(self, other: NotifyFilter) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn categories(self) -> impl Iterator<Item = NotifyCategory> {
        NotifyCategory::ALL
            .into_iter()
            .filter(move |category| self.contains(*category))
    }
}

impl Default for NotifyFilter {
    fn default() -> Self {
        NotifyCategory::FileName | NotifyCategory::DirectoryName | NotifyCategory::LastWrite
    }
}

impl From<NotifyCategory> for NotifyFilter {
    fn from(category: NotifyCategory) -> Self {
        NotifyFilter(category.bit())
    }
}

impl BitOr for NotifyFilter {
    type Output = NotifyFilter;

    fn bitor(self, rhs: NotifyFilter) -> NotifyFilter {
        NotifyFilter(self.0 | rhs.0)
    }
}

impl BitOr<NotifyCategory> for NotifyFilter {
    type Output = NotifyFilter;

    fn bitor(self, rhs: NotifyCategory) -> NotifyFilter {
        NotifyFilter(self.0 | rhs.bit())
    }
}

impl BitOr for NotifyCategory {
    type Output = NotifyFilter;

    fn bitor(self, rhs: NotifyCategory) -> NotifyFilter {
        NotifyFilter(self.bit() | rhs.bit())
    }
}

impl BitOrAssign<NotifyCategory> for NotifyFilter {
    fn bitor_assign(&mut self, rhs: NotifyCategory) {
        self.0 |= rhs.bit();
    }
}

impl fmt::Debug for NotifyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.categories()).finish()
    }
}
