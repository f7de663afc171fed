//! Name filter for watch sessions
//!
//! A session carries at most one glob pattern (e.g. `*.xml`). The pattern
//! is compiled with `globset` and applied to entry base names, so it
//! matches at any depth below the root. There is no negation or comment
//! syntax: `!` and `#` are ordinary characters.

use crate::error::{Result, WatchError};
use globset::{Glob, GlobMatcher};
use std::path::Path;

/// Compiled name filter
pub struct NameFilter {
    /// Source pattern (None = match everything)
    pattern: Option<String>,

    /// Compiled matcher
    matcher: Option<GlobMatcher>,
}

impl NameFilter {
    /// Filter that lets every entry through
    pub fn all() -> Self {
        Self {
            pattern: None,
            matcher: None,
        }
    }

    /// Compile a filter
    ///
    /// Blank patterns match everything.
    pub fn compile(pattern: Option<&str>) -> Result<Self> {
        let pattern = match pattern.map(str::trim) {
            Some(p) if !p.is_empty() => p,
            _ => return Ok(Self::all()),
        };

        let matcher = Glob::new(pattern)
            .map_err(|source| WatchError::Filter {
                pattern: pattern.to_string(),
                source,
            })?
            .compile_matcher();

        Ok(Self {
            pattern: Some(pattern.to_string()),
            matcher: Some(matcher),
        })
    }

    /// Check whether an entry passes the filter
    ///
    /// Only the final component of `path` is matched.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(matcher) = &self.matcher else {
            return true;
        };

        match path.file_name() {
            Some(name) => matcher.is_match(name),
            None => false,
        }
    }

    /// Rename passes when either side matches
    pub fn matches_rename(&self, from: &Path, to: &Path) -> bool {
        self.matches(from) || self.matches(to)
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub fn is_everything(&self) -> bool {
        self.matcher.is_none()
    }
}
