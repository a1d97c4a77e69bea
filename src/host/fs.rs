//! Filesystem Access
//!
//! Synchronous, side-effect-free filesystem probes shared by configuration
//! loading, snapshot loading and module resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use walkdir::WalkDir;

/// Filesystem probes used by every component that touches disk
pub trait FileSystem: Send + Sync {
    /// Whether a regular file exists at `path`
    fn file_exists(&self, path: &Path) -> bool;

    /// Read a file as UTF-8, `None` when missing or unreadable
    fn read_file(&self, path: &Path) -> Option<String>;

    /// Recursively list files under `dir` whose names end with one of
    /// `extensions` (every file when `extensions` is empty)
    fn read_directory(&self, dir: &Path, extensions: &[&str]) -> Vec<PathBuf>;

    /// Immediate subdirectories of `dir`
    fn get_directories(&self, dir: &Path) -> Vec<PathBuf>;

    /// Whether a directory exists at `path`
    fn directory_exists(&self, path: &Path) -> bool;
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    let name = path.to_string_lossy();
    extensions.iter().any(|ext| name.ends_with(ext))
}

/// The real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        match std::fs::read_to_string(path) {
            Ok(content) => Some(content),
            Err(e) => {
                log::debug!("Cannot read {}: {}", path.display(), e);
                None
            }
        }
    }

    fn read_directory(&self, dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| has_extension(path, extensions))
            .collect();
        files.sort();
        files
    }

    fn get_directories(&self, dir: &Path) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();
        dirs
    }

    fn directory_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// In-memory filesystem
///
/// Directories are implied by the files stored beneath them. Every call to
/// [`FileSystem::file_exists`] and [`FileSystem::read_file`] increments a probe
/// counter so callers can observe whether a lookup reached the filesystem.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: RwLock<BTreeMap<PathBuf, String>>,
    probes: AtomicUsize,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filesystem from `(path, content)` pairs
    pub fn with_files<P, C>(files: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: Into<PathBuf>,
        C: Into<String>,
    {
        let fs = Self::new();
        for (path, content) in files {
            fs.insert(path, content);
        }
        fs
    }

    /// Create or overwrite a file
    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files.write().insert(path.into(), content.into());
    }

    /// Remove a file, returning its previous content
    pub fn remove(&self, path: &Path) -> Option<String> {
        self.files.write().remove(path)
    }

    /// Number of existence/read probes served so far
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::Relaxed)
    }

    fn probe(&self) {
        self.probes.fetch_add(1, Ordering::Relaxed);
    }
}

impl FileSystem for MemoryFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        self.probe();
        self.files.read().contains_key(path)
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        self.probe();
        self.files.read().get(path).cloned()
    }

    fn read_directory(&self, dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
        self.files
            .read()
            .keys()
            .filter(|path| path.starts_with(dir) && path.as_path() != dir)
            .filter(|path| has_extension(path, extensions))
            .cloned()
            .collect()
    }

    fn get_directories(&self, dir: &Path) -> Vec<PathBuf> {
        let files = self.files.read();
        let dirs: BTreeSet<PathBuf> = files
            .keys()
            .filter_map(|path| {
                let relative = path.strip_prefix(dir).ok()?;
                let mut components = relative.components();
                let first = components.next()?;
                // A lone component is a file directly inside `dir`
                components.next()?;
                Some(dir.join(first))
            })
            .collect();
        dirs.into_iter().collect()
    }

    fn directory_exists(&self, path: &Path) -> bool {
        self.files
            .read()
            .keys()
            .any(|file| file.starts_with(path) && file.as_path() != path)
    }
}
