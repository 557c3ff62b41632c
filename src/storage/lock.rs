//! Advisory lock on an open task tree
//!
//! An open tree owns a zero-byte `tree.lck` file in its root directory, held
//! with an exclusive `fs2` lock. The file's mere presence keeps other
//! processes out unless they explicitly ignore it.
//!
//! Every held lock is also recorded in a process-wide registry so an
//! interrupt handler can remove the files before the process dies.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use fs2::FileExt;
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use super::error::{io_err, Result, StoreError};

/// Lock file name in the tree root
pub const LOCK_FILE: &str = "tree.lck";

/// Lock files currently held by this process
pub struct LockRegistry {
    paths: Mutex<HashSet<PathBuf>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self {
            paths: Mutex::new(HashSet::new()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.paths.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, path: &Path) {
        self.guard().insert(path.to_path_buf());
    }

    pub fn unregister(&self, path: &Path) {
        self.guard().remove(path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.guard().contains(path)
    }

    /// Deletes every registered lock file, ignoring failures
    pub fn remove_all(&self) {
        for path in self.guard().drain() {
            let _ = fs::remove_file(&path);
        }
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global registry of held lock files
pub static LOCK_REGISTRY: Lazy<LockRegistry> = Lazy::new(LockRegistry::new);

/// Removes held lock files on Ctrl+C, then exits with the conventional code
pub fn install_interrupt_handler() -> std::result::Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        LOCK_REGISTRY.remove_all();
        std::process::exit(130);
    })
}

/// The lock held by an open store
#[derive(Debug)]
pub struct TreeLock {
    path: PathBuf,
    file: Option<File>,
    released: bool,
}

impl TreeLock {
    /// Returns true if `dir` carries a lock file
    pub fn is_present(dir: &Path) -> bool {
        dir.join(LOCK_FILE).exists()
    }

    /// Creates and locks `dir/tree.lck`.
    ///
    /// With `ignore_lock` an existing or contended lock only logs a warning.
    pub fn acquire(dir: &Path, ignore_lock: bool) -> Result<Self> {
        let path = dir.join(LOCK_FILE);

        if path.exists() {
            if !ignore_lock {
                return Err(StoreError::Locked(dir.to_path_buf()));
            }
            warn!(path = %path.display(), "ignoring existing lock file");
        }

        let file = File::create(&path).map_err(io_err(&path))?;
        let file = match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Some(file),
            Err(err) if ignore_lock => {
                warn!(path = %path.display(), error = %err, "lock is held elsewhere, continuing");
                None
            }
            Err(_) => return Err(StoreError::Locked(dir.to_path_buf())),
        };

        LOCK_REGISTRY.register(&path);
        debug!(path = %path.display(), "acquired tree lock");

        Ok(Self {
            path,
            file,
            released: false,
        })
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Unlocks and deletes the lock file; calling it again is a no-op
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }

        // Closing the handle drops the advisory lock
        self.file = None;

        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(io_err(&self.path)(err)),
        }

        LOCK_REGISTRY.unregister(&self.path);
        self.released = true;
        debug!(path = %self.path.display(), "released tree lock");
        Ok(())
    }
}

impl Drop for TreeLock {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(error = %err, "failed to release tree lock");
        }
    }
}
