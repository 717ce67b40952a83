//! Privilege checking and escalation.
//!
//! Installing units under `/etc/systemd/system` and handing the data directory
//! to another user both need root. When we are not root, the whole process is
//! replaced by `sudo <self> <same args>`; the operator sees sudo's own prompt
//! and, on refusal, sudo's own error.

use std::ffi::OsString;

use crate::install::error::InstallerError;

/// Environment variables carried across the sudo boundary.
const PRESERVED_ENV: &str = "RUST_LOG,AUTH_TOKEN";

#[inline]
pub fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Return immediately when already root, otherwise re-exec through sudo.
///
/// Only returns on failure to exec; a successful exec never comes back.
pub fn ensure_root() -> Result<(), InstallerError> {
    if is_root() {
        return Ok(());
    }

    let exe = std::env::current_exe()
        .map_err(|e| InstallerError::System(format!("Failed to locate own executable: {}", e)))?;
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();

    log::info!("Root required, re-running through sudo");
    let err = exec::Command::new("sudo")
        .arg(format!("--preserve-env={PRESERVED_ENV}"))
        .arg("--")
        .arg(&exe)
        .args(&args[..])
        .exec();

    Err(InstallerError::PermissionDenied(format!(
        "privilege escalation via sudo failed: {}",
        err
    )))
}
