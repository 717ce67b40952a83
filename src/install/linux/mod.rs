//! Linux host implementation: the local filesystem and systemd.
//!
//! # Module Structure
//!
//! - `file_ops` - Atomic file placement with exact permission bits
//! - `ownership` - Recursive chown
//! - `privileges` - Root check and sudo re-exec
//! - `service_control` - `systemctl` verbs

use std::fs;
use std::path::Path;

mod file_ops;
mod ownership;
pub mod privileges;
mod service_control;

pub use service_control::Systemctl;

use super::error::InstallerError;
use super::host::FileSystem;
use super::spec::{Mode, Owner};

/// Default location for system unit files.
pub const SYSTEM_UNIT_DIR: &str = "/etc/systemd/system";

/// The real filesystem of the machine we run on.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), InstallerError> {
        fs::create_dir_all(path).map_err(|e| InstallerError::io("create directory", path, e))
    }

    fn chown_recursive(&self, path: &Path, owner: &Owner) -> Result<(), InstallerError> {
        ownership::chown_recursive(path, owner)
    }

    fn install_file(&self, src: &Path, dst: &Path, mode: Mode) -> Result<(), InstallerError> {
        file_ops::install_file_atomic(src, dst, mode)
    }

    fn remove_file(&self, path: &Path) -> Result<(), InstallerError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(InstallerError::io("remove", path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_dir_all_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("datenerfassung");

        LocalFileSystem.create_dir_all(&data).unwrap();
        LocalFileSystem.create_dir_all(&data).unwrap();

        assert!(data.is_dir());
    }

    #[test]
    fn remove_missing_file_succeeds() {
        let dir = TempDir::new().unwrap();
        LocalFileSystem
            .remove_file(&dir.path().join("gone.service"))
            .unwrap();
    }
}
