//! Filesystem access behind a trait so sources can run against `/proc` or an
//! in-memory fixture.

use std::ffi::CString;
use std::io;
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Capacity of a mounted filesystem, as reported by `statvfs(3)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsUsage {
    /// Fragment size in bytes; the unit of the block counts.
    pub fragment_size: u64,
    pub blocks: u64,
    pub blocks_free: u64,
}

impl FsUsage {
    pub fn size_mb(&self) -> u64 {
        self.blocks.saturating_mul(self.fragment_size) >> 20
    }

    /// Free blocks as a whole percentage of all blocks.
    pub fn free_pct(&self) -> u64 {
        self.blocks_free.saturating_mul(100) / crate::delta::safe_divisor(self.blocks)
    }
}

/// Abstraction for filesystem operations.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    fn exists(&self, path: &Path) -> bool;

    /// Lists entries in a directory.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Capacity of the filesystem mounted at `mount`.
    fn statvfs(&self, mount: &Path) -> io::Result<FsUsage>;
}

/// Real filesystem implementation that delegates to `std::fs` and libc.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }

    fn statvfs(&self, mount: &Path) -> io::Result<FsUsage> {
        let c_path = CString::new(mount.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let mut buf = MaybeUninit::<libc::statvfs>::zeroed();
        // SAFETY: c_path is NUL-terminated and buf is a valid out-pointer.
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), buf.as_mut_ptr()) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: statvfs returned 0, so the struct is initialized.
        let st = unsafe { buf.assume_init() };
        Ok(FsUsage {
            fragment_size: st.f_frsize as u64,
            blocks: st.f_blocks as u64,
            blocks_free: st.f_bfree as u64,
        })
    }
}
