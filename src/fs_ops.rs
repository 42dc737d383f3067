//! Atomic file operations for certificate material.
//!
//! Files are staged under a unique name in the destination directory and
//! renamed into place, so a reader never sees a half-written key or
//! certificate. A directory-wide `flock` serializes concurrent bootstraps
//! sharing the same volume.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::{BootstrapError, Result};

pub const KEY_FILE_MODE: u32 = 0o600;
pub const CERT_FILE_MODE: u32 = 0o644;

/// Write `content` to `path` atomically with the given Unix mode.
///
/// The staging file is removed automatically if anything fails before the
/// rename.
pub fn write_file_atomic(path: &Path, content: &[u8], mode: u32) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));

    let mut staged = tempfile::Builder::new()
        .prefix(".proxycert-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| {
            BootstrapError::environment(
                format!("Failed to create staging file in {}", dir.display()),
                e,
            )
        })?;

    set_mode(staged.as_file(), mode)
        .map_err(|e| BootstrapError::environment("Failed to set staging file permissions", e))?;

    staged
        .write_all(content)
        .map_err(|e| BootstrapError::environment("Failed to write staging file", e))?;
    staged
        .as_file()
        .sync_all()
        .map_err(|e| BootstrapError::environment("Failed to sync staging file", e))?;

    staged.persist(path).map_err(|e| {
        BootstrapError::environment(format!("Failed to move file into {}", path.display()), e.error)
    })?;

    Ok(())
}

#[cfg(unix)]
fn set_mode(file: &File, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &File, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

/// Exclusive advisory lock on a directory, released on drop.
pub struct DirLock {
    #[cfg(unix)]
    _guard: nix::fcntl::Flock<File>,
    #[cfg(not(unix))]
    _file: File,
}

impl DirLock {
    /// Block until an exclusive lock on `dir` is held.
    #[cfg(unix)]
    pub fn acquire(dir: &Path) -> Result<Self> {
        use nix::fcntl::{Flock, FlockArg};

        let handle = File::open(dir).map_err(|e| {
            BootstrapError::environment(format!("Failed to open {} for locking", dir.display()), e)
        })?;

        let guard = Flock::lock(handle, FlockArg::LockExclusive).map_err(|(_, errno)| {
            BootstrapError::environment(
                format!("Failed to acquire exclusive lock on {}", dir.display()),
                std::io::Error::from(errno),
            )
        })?;

        Ok(Self { _guard: guard })
    }

    #[cfg(not(unix))]
    pub fn acquire(dir: &Path) -> Result<Self> {
        let handle = File::open(dir).map_err(|e| {
            BootstrapError::environment(format!("Failed to open {} for locking", dir.display()), e)
        })?;
        Ok(Self { _file: handle })
    }
}
