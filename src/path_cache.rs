//! Path-existence micro-cache.
//!
//! Resolution probes the same directories and files over and over: every
//! search-path entry is combined with every include name, and deep
//! include paths share long prefixes. The [`PathExistence`] seam lets
//! the scanner memoize those probes once per process. Implementations
//! are thread-safe and append-only: a path's existence is assumed
//! stable for the cache's lifetime, which holds because action inputs
//! are laid out before scanning starts.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ahash::AHashMap;

/// Memoizing existence probe over exec-root-relative (or absolute)
/// fragments.
pub trait PathExistence: Send + Sync {
    /// Whether `exec_path` names an existing regular file. `is_source`
    /// distinguishes source lookups from output lookups for
    /// implementations that track them differently.
    fn file_exists(&self, exec_path: &Path, is_source: bool) -> bool;

    /// Whether `exec_path` names an existing directory.
    fn directory_exists(&self, exec_path: &Path) -> bool;
}

/// Filesystem-backed cache resolving fragments beneath an exec root.
pub struct FsPathCache {
    exec_root: PathBuf,
    files: Mutex<AHashMap<PathBuf, bool>>,
    dirs: Mutex<AHashMap<PathBuf, bool>>,
}

impl FsPathCache {
    /// Creates a cache stat'ing beneath `exec_root` (absolute fragments
    /// are probed as-is).
    pub fn new(exec_root: PathBuf) -> Self {
        Self {
            exec_root,
            files: Mutex::new(AHashMap::new()),
            dirs: Mutex::new(AHashMap::new()),
        }
    }

    fn on_disk(&self, exec_path: &Path) -> PathBuf {
        if exec_path.is_absolute() {
            exec_path.to_path_buf()
        } else {
            self.exec_root.join(exec_path)
        }
    }
}

impl PathExistence for FsPathCache {
    fn file_exists(&self, exec_path: &Path, _is_source: bool) -> bool {
        if let Some(&hit) = self
            .files
            .lock()
            .expect("path cache poisoned")
            .get(exec_path)
        {
            return hit;
        }
        let exists = self.on_disk(exec_path).is_file();
        self.files
            .lock()
            .expect("path cache poisoned")
            .insert(exec_path.to_path_buf(), exists);
        exists
    }

    fn directory_exists(&self, exec_path: &Path) -> bool {
        if let Some(&hit) = self
            .dirs
            .lock()
            .expect("path cache poisoned")
            .get(exec_path)
        {
            return hit;
        }
        let exists = self.on_disk(exec_path).is_dir();
        self.dirs
            .lock()
            .expect("path cache poisoned")
            .insert(exec_path.to_path_buf(), exists);
        exists
    }
}
