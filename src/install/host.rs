//! Seams between the installer and the host it deploys to.
//!
//! The installer only talks to the filesystem and the service manager through
//! these traits. `linux` provides the real implementations, `memory` an
//! in-process one for tests.

use std::path::Path;

use super::error::InstallerError;
use super::spec::{Mode, Owner};
use super::state::ServiceState;

pub trait FileSystem {
    fn exists(&self, path: &Path) -> bool;

    /// `mkdir -p`. Succeeds if the directory already exists.
    fn create_dir_all(&self, path: &Path) -> Result<(), InstallerError>;

    /// Recursively hand `path` and everything below it to `owner`.
    fn chown_recursive(&self, path: &Path, owner: &Owner) -> Result<(), InstallerError>;

    /// Copy `src` to `dst` with exactly `mode`, replacing any existing `dst`.
    fn install_file(&self, src: &Path, dst: &Path, mode: Mode) -> Result<(), InstallerError>;

    /// Remove a file. Succeeds if it is already gone.
    fn remove_file(&self, path: &Path) -> Result<(), InstallerError>;
}

pub trait ServiceManager {
    fn daemon_reload(&self) -> Result<(), InstallerError>;

    /// Enable and start in one go. A no-op success when already enabled and running.
    fn enable_now(&self, unit: &str) -> Result<(), InstallerError>;

    /// Stop and disable in one go. A no-op success when already stopped and disabled.
    fn disable_now(&self, unit: &str) -> Result<(), InstallerError>;

    fn state(&self, unit: &str) -> Result<ServiceState, InstallerError>;
}

impl<T: FileSystem + ?Sized> FileSystem for &T {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), InstallerError> {
        (**self).create_dir_all(path)
    }

    fn chown_recursive(&self, path: &Path, owner: &Owner) -> Result<(), InstallerError> {
        (**self).chown_recursive(path, owner)
    }

    fn install_file(&self, src: &Path, dst: &Path, mode: Mode) -> Result<(), InstallerError> {
        (**self).install_file(src, dst, mode)
    }

    fn remove_file(&self, path: &Path) -> Result<(), InstallerError> {
        (**self).remove_file(path)
    }
}

impl<T: ServiceManager + ?Sized> ServiceManager for &T {
    fn daemon_reload(&self) -> Result<(), InstallerError> {
        (**self).daemon_reload()
    }

    fn enable_now(&self, unit: &str) -> Result<(), InstallerError> {
        (**self).enable_now(unit)
    }

    fn disable_now(&self, unit: &str) -> Result<(), InstallerError> {
        (**self).disable_now(unit)
    }

    fn state(&self, unit: &str) -> Result<ServiceState, InstallerError> {
        (**self).state(unit)
    }
}
