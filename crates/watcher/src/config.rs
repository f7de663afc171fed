//! Watch session configuration

use crate::notify_filter::{NotifyCategory, NotifyFilter};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default number of raw notifications buffered ahead of the classifier
pub const DEFAULT_BUFFER_CAPACITY: usize = 100 * 1024;

/// Smallest accepted raw buffer
pub const MIN_BUFFER_CAPACITY: usize = 1024;

/// Configuration for one watch session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Root directory to watch (created on open if missing)
    pub path: PathBuf,

    /// Glob matched against entry names, e.g. `*.xml` (default: everything)
    #[serde(default)]
    pub filter: Option<String>,

    /// Notification categories to react to (default: file name,
    /// directory name and last write)
    #[serde(default)]
    pub notify: Option<Vec<NotifyCategory>>,

    /// Raw notifications held between the OS watcher and the classifier
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Readiness polling for newly created files
    #[serde(default)]
    pub open_retry: OpenRetry,

    /// Window after a `NewFile` during which modifications of that path
    /// are dropped
    #[serde(default = "default_modify_suppression_ms")]
    pub modify_suppression_ms: u64,
}

impl WatchConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            filter: None,
            notify: None,
            buffer_capacity: default_buffer_capacity(),
            open_retry: OpenRetry::default(),
            modify_suppression_ms: default_modify_suppression_ms(),
        }
    }

    pub fn with_filter(mut self, pattern: impl Into<String>) -> Self {
        self.filter = Some(pattern.into());
        self
    }

    pub fn with_notify<I>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = NotifyCategory>,
    {
        self.notify = Some(categories.into_iter().collect());
        self
    }

    pub fn with_open_retry(mut self, open_retry: OpenRetry) -> Self {
        self.open_retry = open_retry;
        self
    }

    pub fn with_modify_suppression(mut self, window: Duration) -> Self {
        self.modify_suppression_ms = window.as_millis() as u64;
        self
    }

    /// Filter pattern, with blank patterns treated as absent
    pub fn filter_pattern(&self) -> Option<&str> {
        self.filter
            .as_deref()
            .map(str::trim)
            .filter(|pattern| !pattern.is_empty())
    }

    /// Effective category mask
    ///
    /// An absent or empty list falls back to the default mask.
    pub fn notify_filter(&self) -> NotifyFilter {
        match &self.notify {
            Some(categories) if !categories.is_empty() => {
                NotifyFilter::from_categories(categories.iter().copied())
            }
            _ => NotifyFilter::default(),
        }
    }

    pub fn effective_buffer_capacity(&self) -> usize {
        self.buffer_capacity.max(MIN_BUFFER_CAPACITY)
    }

    pub fn modify_suppression(&self) -> Duration {
        Duration::from_millis(self.modify_suppression_ms)
    }
}

/// Retry policy for the "created but still being written" race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRetry {
    /// Delay between open attempts
    #[serde(default = "default_retry_interval_ms")]
    pub interval_ms: u64,

    /// Attempts before giving up; `None` or `0` waits as long as it takes
    #[serde(default = "default_max_attempts")]
    pub max_attempts: Option<u32>,
}

impl OpenRetry {
    /// Keep trying until the file opens or the session closes
    pub fn unbounded() -> Self {
        Self {
            interval_ms: default_retry_interval_ms(),
            max_attempts: None,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Effective attempt cap
    pub fn limit(&self) -> Option<u32> {
        self.max_attempts.filter(|attempts| *attempts > 0)
    }
}

impl Default for OpenRetry {
    fn default() -> Self {
        Self {
            interval_ms: default_retry_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_modify_suppression_ms() -> u64 {
    500
}

fn default_retry_interval_ms() -> u64 {
    100
}

fn default_max_attempts() -> Option<u32> {
    // One minute at the default interval
    Some(600)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WatchConfig::new("/tmp/watch");
        assert!(config.filter_pattern().is_none());
        assert_eq!(config.notify_filter(), NotifyFilter::default());
        assert_eq!(config.effective_buffer_capacity(), 100 * 1024);
        assert_eq!(config.open_retry.interval(), Duration::from_millis(100));
        assert_eq!(config.open_retry.max_attempts, Some(600));
        assert_eq!(config.modify_suppression(), Duration::from_millis(500));
    }

    #[test]
    fn test_zero_attempts_is_unbounded() {
        let retry = OpenRetry {
            interval_ms: 100,
            max_attempts: Some(0),
        };
        assert_eq!(retry.limit(), None);
        assert_eq!(OpenRetry::unbounded().limit(), None);
        assert_eq!(OpenRetry::default().limit(), Some(600));
    }

    #[test]
    fn test_blank_filter_means_everything() {
        let config = WatchConfig::new("/tmp/watch").with_filter("   ");
        assert!(config.filter_pattern().is_none());
    }

    #[test]
    fn test_buffer_floor() {
        let mut config = WatchConfig::new("/tmp/watch");
        config.buffer_capacity = 8;
        assert_eq!(config.effective_buffer_capacity(), MIN_BUFFER_CAPACITY);
    }

    #[test]
    fn test_toml_minimal_entry() {
        let config: WatchConfig = toml::from_str(r#"path = "/srv/inbox""#).unwrap();
        assert_eq!(config.path, PathBuf::from("/srv/inbox"));
        assert_eq!(config.open_retry, OpenRetry::default());
        assert_eq!(config.buffer_capacity, DEFAULT_BUFFER_CAPACITY);
    }

    #[test]
    fn test_toml_full_entry() {
        let config: WatchConfig = toml::from_str(
            r#"
            path = "/srv/inbox"
            filter = "*.xml"
            notify = ["directory_name"]
            modify_suppression_ms = 250

            [open_retry]
            interval_ms = 50
            max_attempts = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.filter_pattern(), Some("*.xml"));
        let mask = config.notify_filter();
        assert!(mask.contains(NotifyCategory::DirectoryName));
        assert!(!mask.contains(NotifyCategory::FileName));
        assert_eq!(config.open_retry.max_attempts, Some(20));
        assert_eq!(config.modify_suppression(), Duration::from_millis(250));
    }
}
