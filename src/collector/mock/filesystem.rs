//! In-memory mock filesystem for testing sources without a real `/proc`.

use crate::collector::traits::{FileSystem, FsUsage};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

/// In-memory filesystem for testing.
///
/// Stores files, directories and per-mount capacities in memory, so tests can
/// simulate any `/proc` and `/sys` state and change it between polls.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
    /// Set of directories (for read_dir support).
    directories: HashSet<PathBuf>,
    /// Capacity reported by `statvfs` per mount point.
    usages: HashMap<PathBuf, FsUsage>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file. Parent directories are created.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.directories.insert(path);
    }

    /// Adds a process directory holding its `stat` file.
    pub fn add_process(&mut self, pid: u32, stat: &str) {
        let base = PathBuf::from(format!("/proc/{}", pid));
        self.add_dir(&base);
        self.add_file(base.join("stat"), stat);
    }

    /// Removes a process directory and everything below it.
    pub fn remove_process(&mut self, pid: u32) {
        self.remove_tree(format!("/proc/{}", pid));
    }

    /// Removes a file or directory tree.
    pub fn remove_tree(&mut self, path: impl AsRef<Path>) {
        let root = path.as_ref();
        self.files.retain(|p, _| !p.starts_with(root));
        self.directories.retain(|p| !p.starts_with(root));
    }

    /// Sets the capacity `statvfs` reports for `mount`.
    pub fn set_usage(&mut self, mount: impl AsRef<Path>, usage: FsUsage) {
        self.usages.insert(mount.as_ref().to_path_buf(), usage);
    }

    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.directories.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {:?}", path),
            ));
        }

        let mut entries = HashSet::new();

        for file_path in self.files.keys() {
            if file_path.parent().is_some_and(|parent| parent == path) {
                entries.insert(file_path.clone());
            }
        }

        for dir_path in &self.directories {
            if dir_path.parent().is_some_and(|parent| parent == path) && dir_path != path {
                entries.insert(dir_path.clone());
            }
        }

        Ok(entries.into_iter().collect())
    }

    fn statvfs(&self, mount: &Path) -> io::Result<FsUsage> {
        self.usages.get(mount).copied().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no filesystem mounted at {:?}", mount),
            )
        })
    }
}
