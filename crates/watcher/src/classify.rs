//! Classification of raw notifications into change records
//!
//! Rules:
//! - created directory -> `NewFolder`
//! - created file -> `NewFile`, once the file can be opened exclusively
//! - created pipe, socket or device -> `NewFile`, without waiting
//! - changed directory -> dropped (its children report the real changes)
//! - changed file -> `Modified`, unless it was created moments ago
//! - removed -> `Deleted` (nothing left to inspect)
//! - renamed -> `Renamed`, always, and never deduplicated

use crate::config::{OpenRetry, WatchConfig};
use crate::entry::{self, EntryKind, Readiness};
use crate::error::{Result, WatchError};
use crate::filter::NameFilter;
use crate::notify_filter::{NotifyCategory, NotifyFilter};
use crate::raw::{KindHint, RawChange};
use dashmap::DashMap;
use dirwatch_core::{ChangeRecord, ChangeType};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Paths that produced a `NewFile`, stamped with when
pub type RecentCreates = Arc<DashMap<PathBuf, Instant>>;

/// Classifier for one session activation
pub struct Classifier {
    filter: NameFilter,
    mask: NotifyFilter,
    open_retry: OpenRetry,
    suppression: Duration,
    recent_creates: RecentCreates,
}

impl Classifier {
    pub fn new(
        filter: NameFilter,
        mask: NotifyFilter,
        open_retry: OpenRetry,
        suppression: Duration,
        recent_creates: RecentCreates,
    ) -> Self {
        Self {
            filter,
            mask,
            open_retry,
            suppression,
            recent_creates,
        }
    }

    /// Build a classifier from session config
    pub fn from_config(config: &WatchConfig, recent_creates: RecentCreates) -> Result<Self> {
        let filter = NameFilter::compile(config.filter_pattern())?;
        Ok(Self::new(
            filter,
            config.notify_filter(),
            config.open_retry,
            config.modify_suppression(),
            recent_creates,
        ))
    }

    /// Classify one raw change
    ///
    /// `Ok(None)` means the change was filtered or dropped. `cancel` aborts
    /// the readiness wait for new files.
    pub fn classify(&self, change: RawChange, cancel: &AtomicBool) -> Result<Option<ChangeRecord>> {
        match change {
            RawChange::Created { path, .. } => self.on_created(path, cancel),
            RawChange::Changed { path, categories } => self.on_changed(path, categories),
            RawChange::Removed { path, hint } => Ok(self.on_removed(path, hint)),
            RawChange::Renamed { from, to } => Ok(self.on_renamed(from, to)),
        }
    }

    fn on_created(&self, path: PathBuf, cancel: &AtomicBool) -> Result<Option<ChangeRecord>> {
        // The backend's file/folder hint is not trusted; ask the filesystem
        let kind = match entry::inspect(&path)? {
            EntryKind::NotFound => return Err(WatchError::Vanished(path)),
            kind => kind,
        };

        if !self.passes_name_checks(&path, kind.is_dir()) {
            return Ok(None);
        }

        if kind.is_dir() {
            return Ok(Some(ChangeRecord::new(ChangeType::NewFolder, path)));
        }

        // Only regular files have writers worth waiting for
        let readiness = match kind {
            EntryKind::File => entry::wait_until_openable(&path, &self.open_retry, cancel)?,
            _ => Readiness::Ready,
        };

        match readiness {
            Readiness::Ready => {}
            Readiness::GaveUp { attempts } => {
                warn!(
                    "{} still locked after {} attempts, reporting it anyway",
                    path.display(),
                    attempts
                );
            }
            Readiness::Cancelled => {
                debug!("Dropping creation of {} (session closing)", path.display());
                return Ok(None);
            }
        }

        self.recent_creates.insert(path.clone(), Instant::now());
        Ok(Some(ChangeRecord::new(ChangeType::NewFile, path)))
    }

    fn on_changed(&self, path: PathBuf, categories: NotifyFilter) -> Result<Option<ChangeRecord>> {
        if !self.mask.intersects(categories) {
            return Ok(None);
        }

        match entry::inspect(&path)? {
            EntryKind::NotFound => Err(WatchError::Vanished(path)),
            EntryKind::Directory => {
                trace!("Ignoring directory change on {}", path.display());
                Ok(None)
            }
            EntryKind::File | EntryKind::Special => {
                if !self.filter.matches(&path) {
                    return Ok(None);
                }
                if self.recently_created(&path) {
                    trace!("Suppressing modify right after create: {}", path.display());
                    return Ok(None);
                }
                Ok(Some(ChangeRecord::new(ChangeType::Modified, path)))
            }
        }
    }

    fn on_removed(&self, path: PathBuf, hint: KindHint) -> Option<ChangeRecord> {
        let name_mask_ok = match hint {
            KindHint::File => self.mask.contains(NotifyCategory::FileName),
            KindHint::Folder => self.mask.contains(NotifyCategory::DirectoryName),
            KindHint::Unknown => self.accepts_names(),
        };
        if !name_mask_ok || !self.filter.matches(&path) {
            return None;
        }

        self.recent_creates.remove(&path);
        Some(ChangeRecord::new(ChangeType::Deleted, path))
    }

    fn on_renamed(&self, from: PathBuf, to: PathBuf) -> Option<ChangeRecord> {
        // Renames are never fatal: an entry gone again counts as either kind
        let kind = entry::inspect(&to).unwrap_or(EntryKind::NotFound);
        let name_mask_ok = match kind {
            EntryKind::Directory => self.mask.contains(NotifyCategory::DirectoryName),
            EntryKind::File | EntryKind::Special => self.mask.contains(NotifyCategory::FileName),
            EntryKind::NotFound => self.accepts_names(),
        };
        if !name_mask_ok || !self.filter.matches_rename(&from, &to) {
            return None;
        }

        if let Some((_, stamp)) = self.recent_creates.remove(&from) {
            self.recent_creates.insert(to.clone(), stamp);
        }
        Some(ChangeRecord::renamed(from, to))
    }

    fn passes_name_checks(&self, path: &Path, is_dir: bool) -> bool {
        let category = if is_dir {
            NotifyCategory::DirectoryName
        } else {
            NotifyCategory::FileName
        };
        self.mask.contains(category) && self.filter.matches(path)
    }

    fn accepts_names(&self) -> bool {
        self.mask
            .intersects(NotifyCategory::FileName | NotifyCategory::DirectoryName)
    }

    fn recently_created(&self, path: &Path) -> bool {
        match self.recent_creates.get(path) {
            Some(stamp) => stamp.elapsed() < self.suppression,
            None => false,
        }
    }

    /// Drop suppression stamps older than the window
    pub fn prune(&self) {
        let window = self.suppression;
        self.recent_creates.retain(|_, stamp| stamp.elapsed() < window);
    }
}
