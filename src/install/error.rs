//! Installer error taxonomy.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised by the deployment steps.
///
/// `PermissionDenied`, `NotFound` and `ServiceManager` abort an install run
/// immediately. Status and health probes never produce these; they degrade to
/// `ServiceState::Unknown` or `HealthOutcome::Failed` instead.
#[derive(Debug, Error)]
pub enum InstallerError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Carries the service manager's own stderr, untranslated.
    #[error("service manager: {0}")]
    ServiceManager(String),

    #[error("step out of order: {0}")]
    OutOfOrder(String),

    #[error("{0}")]
    System(String),
}

impl InstallerError {
    /// Map an I/O failure on `path` while performing `action`.
    pub(crate) fn io(action: &str, path: &Path, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::PermissionDenied => {
                InstallerError::PermissionDenied(format!("{action} {}: {e}", path.display()))
            }
            io::ErrorKind::NotFound => InstallerError::NotFound(path.to_path_buf()),
            _ => InstallerError::System(format!("Failed to {action} {}: {e}", path.display())),
        }
    }

    /// Whether re-running with elevated privileges could succeed.
    pub fn is_permission(&self) -> bool {
        matches!(self, InstallerError::PermissionDenied(_))
    }
}
