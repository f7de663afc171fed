//! Translation of `notify` events into raw change categories
//!
//! Backends disagree on how much they tell us. inotify reports a rename as
//! a "from" half, a "to" half and a paired event carrying both paths;
//! other backends only send one path. Everything is folded into the four
//! categories the classifier understands: created, changed, removed and
//! renamed.

use crate::error::{Result, WatchError};
use crate::notify_filter::{NotifyCategory, NotifyFilter};
use notify::event::{CreateKind, DataChange, Flag, MetadataKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::trace;

/// How long a "from" half waits for its partner before it counts as a
/// move out of the watched tree
pub const MOVE_PAIRING_WINDOW: Duration = Duration::from_millis(250);

/// Entry type reported by the backend, when it reports one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindHint {
    File,
    Folder,
    Unknown,
}

/// Raw notification, prior to classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawChange {
    Created { path: PathBuf, hint: KindHint },
    Changed { path: PathBuf, categories: NotifyFilter },
    Removed { path: PathBuf, hint: KindHint },
    Renamed { from: PathBuf, to: PathBuf },
}

impl RawChange {
    pub fn path(&self) -> &PathBuf {
        match self {
            RawChange::Created { path, .. }
            | RawChange::Changed { path, .. }
            | RawChange::Removed { path, .. } => path,
            RawChange::Renamed { to, .. } => to,
        }
    }
}

/// Stateful translator (one per session activation)
#[derive(Default)]
pub struct Translator {
    /// Unpaired rename "from" halves by tracker cookie
    pending_moves: HashMap<usize, (PathBuf, Instant)>,
}

impl Translator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one backend event
    ///
    /// A rescan flag means the kernel queue overflowed and is reported as
    /// `WatchError::Overflow`.
    pub fn translate(&mut self, event: Event) -> Result<Vec<RawChange>> {
        if event.flag() == Some(Flag::Rescan) {
            return Err(WatchError::Overflow);
        }

        let tracker = event.tracker();
        let mut paths = event.paths.into_iter();

        let changes = match event.kind {
            EventKind::Create(kind) => paths
                .map(|path| RawChange::Created {
                    path,
                    hint: create_hint(kind),
                })
                .collect(),

            EventKind::Remove(kind) => paths
                .map(|path| RawChange::Removed {
                    path,
                    hint: remove_hint(kind),
                })
                .collect(),

            EventKind::Modify(ModifyKind::Name(mode)) => match mode {
                RenameMode::Both => match (paths.next(), paths.next()) {
                    (Some(from), Some(to)) => {
                        if let Some(cookie) = tracker {
                            self.pending_moves.remove(&cookie);
                        }
                        vec![RawChange::Renamed { from, to }]
                    }
                    (Some(path), None) => vec![exists_or_removed(path)],
                    _ => Vec::new(),
                },
                RenameMode::From => match (paths.next(), tracker) {
                    (Some(path), Some(cookie)) => {
                        self.pending_moves.insert(cookie, (path, Instant::now()));
                        Vec::new()
                    }
                    (Some(path), None) => vec![RawChange::Removed {
                        path,
                        hint: KindHint::Unknown,
                    }],
                    _ => Vec::new(),
                },
                RenameMode::To => match paths.next() {
                    // The paired event follows; wait for it
                    Some(_) if tracker.is_some_and(|c| self.pending_moves.contains_key(&c)) => {
                        Vec::new()
                    }
                    Some(path) => vec![RawChange::Created {
                        path,
                        hint: KindHint::Unknown,
                    }],
                    None => Vec::new(),
                },
                RenameMode::Any | RenameMode::Other => paths.map(exists_or_removed).collect(),
            },

            EventKind::Modify(kind) => {
                let categories = modify_categories(kind);
                paths
                    .map(|path| RawChange::Changed { path, categories })
                    .collect()
            }

            EventKind::Access(_) | EventKind::Any | EventKind::Other => {
                trace!("Ignoring event kind {:?}", event.kind);
                Vec::new()
            }
        };

        Ok(changes)
    }

    /// Flush "from" halves that never found a partner
    pub fn flush_expired(&mut self, window: Duration) -> Vec<RawChange> {
        let mut expired = Vec::new();
        self.pending_moves.retain(|_, (path, since)| {
            if since.elapsed() > window {
                expired.push(RawChange::Removed {
                    path: std::mem::take(path),
                    hint: KindHint::Unknown,
                });
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn pending_moves(&self) -> usize {
        self.pending_moves.len()
    }
}

fn create_hint(kind: CreateKind) -> KindHint {
    match kind {
        CreateKind::File => KindHint::File,
        CreateKind::Folder => KindHint::Folder,
        _ => KindHint::Unknown,
    }
}

fn remove_hint(kind: RemoveKind) -> KindHint {
    match kind {
        RemoveKind::File => KindHint::File,
        RemoveKind::Folder => KindHint::Folder,
        _ => KindHint::Unknown,
    }
}

/// Single-path rename notification: the entry either arrived or left
fn exists_or_removed(path: PathBuf) -> RawChange {
    if path.exists() {
        RawChange::Created {
            path,
            hint: KindHint::Unknown,
        }
    } else {
        RawChange::Removed {
            path,
            hint: KindHint::Unknown,
        }
    }
}

/// Categories a modification belongs to
fn modify_categories(kind: ModifyKind) -> NotifyFilter {
    match kind {
        ModifyKind::Data(DataChange::Size) => NotifyCategory::Size.into(),
        ModifyKind::Data(_) => NotifyCategory::LastWrite | NotifyCategory::Size,
        ModifyKind::Metadata(MetadataKind::AccessTime) => NotifyCategory::LastAccess.into(),
        ModifyKind::Metadata(MetadataKind::WriteTime) => NotifyCategory::LastWrite.into(),
        ModifyKind::Metadata(MetadataKind::Permissions | MetadataKind::Ownership) => {
            NotifyCategory::Security.into()
        }
        // inotify's IN_ATTRIB (chmod, chown, link count) arrives as Metadata(Any)
        ModifyKind::Metadata(_) => NotifyCategory::Attributes | NotifyCategory::Security,
        ModifyKind::Name(_) | ModifyKind::Any | ModifyKind::Other => {
            NotifyCategory::LastWrite | NotifyCategory::Size
        }
    }
}
