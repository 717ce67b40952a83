//! Atomic file placement.
//!
//! Files are written to a sibling temp file, synced, given their final mode and
//! then renamed over the destination, so a reader never sees a half-written
//! script or unit.

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::install::error::InstallerError;
use crate::install::spec::Mode;

/// Copy `src` over `dst` atomically, leaving `dst` with exactly `mode`.
pub(super) fn install_file_atomic(src: &Path, dst: &Path, mode: Mode) -> Result<(), InstallerError> {
    let content = fs::read(src).map_err(|e| InstallerError::io("read", src, e))?;

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| InstallerError::io("create directory", parent, e))?;
    }

    let temp_path = temp_path_for(dst);
    if let Err(e) = write_with_mode(&temp_path, &content, mode) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    fs::rename(&temp_path, dst).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        InstallerError::io("rename into", dst, e)
    })
}

fn write_with_mode(path: &Path, content: &[u8], mode: Mode) -> Result<(), InstallerError> {
    {
        let mut file = fs::File::create(path).map_err(|e| InstallerError::io("create", path, e))?;
        file.write_all(content)
            .map_err(|e| InstallerError::io("write", path, e))?;
        file.sync_all()
            .map_err(|e| InstallerError::io("sync", path, e))?;
    }

    // Explicit, so the process umask has no say in the result.
    fs::set_permissions(path, fs::Permissions::from_mode(mode.bits()))
        .map_err(|e| InstallerError::io("set permissions on", path, e))
}

fn temp_path_for(dst: &Path) -> PathBuf {
    let name = dst
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "install".to_string());
    dst.with_file_name(format!(".{name}.tmp"))
}
