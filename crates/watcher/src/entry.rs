//! Entry inspection and readiness polling
//!
//! A create notification can arrive while the writer still holds the file
//! (e.g. a copy in progress). Before a new file is reported we poll until
//! it can be opened exclusively.

use crate::config::OpenRetry;
use crate::error::{Result, WatchError};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;

/// What a path currently points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file
    File,
    Directory,
    /// FIFO, socket or device node
    Special,
    NotFound,
}

impl EntryKind {
    pub fn is_dir(self) -> bool {
        self == EntryKind::Directory
    }
}

/// Query the entry kind of `path`
///
/// Symlinks are followed.
pub fn inspect(path: &Path) -> Result<EntryKind> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(EntryKind::Directory),
        Ok(metadata) if metadata.is_file() => Ok(EntryKind::File),
        Ok(_) => Ok(EntryKind::Special),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(EntryKind::NotFound),
        Err(e) => Err(WatchError::io(path, e)),
    }
}

/// Outcome of waiting for a new file to become openable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// The attempt cap ran out while the file was still held
    GaveUp { attempts: u32 },
    /// The session closed mid-wait
    Cancelled,
}

/// Poll until `path` opens exclusively
///
/// Fails with `Vanished` if the file disappears while waiting.
pub fn wait_until_openable(path: &Path, retry: &OpenRetry, cancel: &AtomicBool) -> Result<Readiness> {
    let limit = retry.limit();
    let mut attempts = 0u32;

    loop {
        if cancel.load(Ordering::Acquire) {
            return Ok(Readiness::Cancelled);
        }

        attempts += 1;
        match try_open_exclusive(path) {
            Ok(()) => return Ok(Readiness::Ready),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(WatchError::Vanished(path.to_path_buf()));
            }
            Err(e) => {
                tracing::trace!("{} not openable yet (attempt {}): {}", path.display(), attempts, e);
            }
        }

        if let Some(max) = limit {
            if attempts >= max {
                return Ok(Readiness::GaveUp { attempts });
            }
        }

        sleep(retry.interval());
    }
}

/// Open `path` and immediately release it, failing if another handle
/// holds it exclusively
#[cfg(unix)]
pub fn try_open_exclusive(path: &Path) -> io::Result<()> {
    use nix::fcntl::{flock, FlockArg, OFlag};
    use std::fs::OpenOptions;
    use std::os::unix::fs::OpenOptionsExt;
    use std::os::unix::io::AsRawFd;

    // Non-blocking so a FIFO without a writer cannot stall the open
    let file = OpenOptions::new()
        .read(true)
        .custom_flags(OFlag::O_NONBLOCK.bits())
        .open(path)?;
    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        // Closing the descriptor releases the lock
        Ok(()) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

#[cfg(windows)]
pub fn try_open_exclusive(path: &Path) -> io::Result<()> {
    use std::fs::OpenOptions;
    use std::os::windows::fs::OpenOptionsExt;

    OpenOptions::new().read(true).share_mode(0).open(path).map(drop)
}

#[cfg(not(any(unix, windows)))]
pub fn try_open_exclusive(path: &Path) -> io::Result<()> {
    std::fs::File::open(path).map(drop)
}
