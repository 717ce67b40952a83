//! Recursive ownership changes (`chown -R user:group`).

use std::os::unix::fs::lchown;
use std::path::Path;

use nix::unistd::{Group, User};
use walkdir::WalkDir;

use crate::install::error::InstallerError;
use crate::install::spec::Owner;

/// Numeric ids for an owner; the group defaults to the user's primary group.
pub(crate) fn resolve_owner(owner: &Owner) -> Result<(u32, u32), InstallerError> {
    let user = User::from_name(&owner.user)
        .map_err(|e| InstallerError::System(format!("Failed to look up user {}: {}", owner.user, e)))?
        .ok_or_else(|| InstallerError::System(format!("Unknown user: {}", owner.user)))?;

    let gid = match &owner.group {
        Some(name) => {
            Group::from_name(name)
                .map_err(|e| InstallerError::System(format!("Failed to look up group {}: {}", name, e)))?
                .ok_or_else(|| InstallerError::System(format!("Unknown group: {}", name)))?
                .gid
        }
        None => user.gid,
    };

    Ok((user.uid.as_raw(), gid.as_raw()))
}

/// Walk `root` without following symlinks and hand every entry to `owner`.
pub(super) fn chown_recursive(root: &Path, owner: &Owner) -> Result<(), InstallerError> {
    let (uid, gid) = resolve_owner(owner)?;

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            match e.into_io_error() {
                Some(io) => InstallerError::io("walk", &path, io),
                None => InstallerError::System(format!("Filesystem loop at {}", path.display())),
            }
        })?;

        lchown(entry.path(), Some(uid), Some(gid))
            .map_err(|e| InstallerError::io("chown", entry.path(), e))?;
    }

    log::debug!("chown -R {} {}", owner, root.display());
    Ok(())
}
