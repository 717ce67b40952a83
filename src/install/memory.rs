//! In-memory host for exercising the installer without root or systemd.
//!
//! `MemoryHost` implements both `FileSystem` and `ServiceManager` over one
//! shared state, so a reload can see which unit files are on "disk". Every call
//! is appended to an event journal that tests inspect for ordering.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::error::InstallerError;
use super::host::{FileSystem, ServiceManager};
use super::spec::{Mode, Owner};
use super::state::ServiceState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFile {
    pub content: Vec<u8>,
    pub mode: Mode,
    pub owner: Option<Owner>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    CreateDir(PathBuf),
    Chown(PathBuf, Owner),
    InstallFile { dest: PathBuf, mode: Mode },
    RemoveFile(PathBuf),
    /// Unit files present in the unit directory at the moment of the reload.
    DaemonReload { units_on_disk: Vec<String> },
    EnableNow(String),
    DisableNow(String),
    QueryState(String),
}

/// Comparable view of the host, without the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSnapshot {
    pub dirs: BTreeMap<PathBuf, Option<Owner>>,
    pub files: BTreeMap<PathBuf, MemoryFile>,
    pub loaded: BTreeSet<String>,
    pub enabled: BTreeSet<String>,
    pub running: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    dirs: BTreeMap<PathBuf, Option<Owner>>,
    files: BTreeMap<PathBuf, MemoryFile>,
    loaded: BTreeSet<String>,
    enabled: BTreeSet<String>,
    running: BTreeSet<String>,
    failed: BTreeSet<String>,
    events: Vec<HostEvent>,

    read_only: Vec<PathBuf>,
    refuse_start: BTreeSet<String>,
    crash_after_start: BTreeSet<String>,
    status_unavailable: bool,
}

impl MemoryState {
    fn check_writable(&self, path: &Path) -> Result<(), InstallerError> {
        if self.read_only.iter().any(|p| path.starts_with(p)) {
            return Err(InstallerError::PermissionDenied(format!(
                "write {}: Permission denied (os error 13)",
                path.display()
            )));
        }
        Ok(())
    }

    fn add_dir_all(&mut self, path: &Path) {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            self.dirs.entry(ancestor.to_path_buf()).or_insert(None);
        }
    }
}

#[derive(Debug)]
pub struct MemoryHost {
    unit_dir: PathBuf,
    state: Mutex<MemoryState>,
}

impl MemoryHost {
    pub fn new(unit_dir: impl Into<PathBuf>) -> Self {
        let unit_dir = unit_dir.into();
        let mut state = MemoryState::default();
        state.add_dir_all(&unit_dir);
        Self {
            unit_dir,
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock only happens inside a failing test.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a source file.
    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        let path = path.into();
        {
            let mut state = self.lock();
            if let Some(parent) = path.parent() {
                state.add_dir_all(parent);
            }
            state.files.insert(
                path,
                MemoryFile {
                    content: content.into(),
                    mode: Mode::new(0o644),
                    owner: None,
                },
            );
        }
        self
    }

    /// Writes at or below `path` fail with `PermissionDenied`.
    pub fn read_only(self, path: impl Into<PathBuf>) -> Self {
        self.lock().read_only.push(path.into());
        self
    }

    /// `enable --now` of this unit fails as systemd would for a broken unit.
    pub fn refuse_start(self, unit: &str) -> Self {
        self.lock().refuse_start.insert(unit.to_string());
        self
    }

    /// The unit starts fine but its process exits straight away.
    pub fn crash_after_start(self, unit: &str) -> Self {
        self.lock().crash_after_start.insert(unit.to_string());
        self
    }

    /// Every state query fails, like a hung or missing bus.
    pub fn status_unavailable(self) -> Self {
        self.lock().status_unavailable = true;
        self
    }

    pub fn file(&self, path: &Path) -> Option<MemoryFile> {
        self.lock().files.get(path).cloned()
    }

    pub fn is_dir(&self, path: &Path) -> bool {
        self.lock().dirs.contains_key(path)
    }

    pub fn owner_of(&self, path: &Path) -> Option<Owner> {
        let state = self.lock();
        match state.dirs.get(path) {
            Some(owner) => owner.clone(),
            None => state.files.get(path).and_then(|f| f.owner.clone()),
        }
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.lock().events.clear();
    }

    /// Drop every injected failure; the host behaves normally from here on.
    pub fn clear_faults(&self) {
        let mut state = self.lock();
        state.read_only.clear();
        state.refuse_start.clear();
        state.crash_after_start.clear();
        state.status_unavailable = false;
    }

    pub fn snapshot(&self) -> HostSnapshot {
        let state = self.lock();
        HostSnapshot {
            dirs: state.dirs.clone(),
            files: state.files.clone(),
            loaded: state.loaded.clone(),
            enabled: state.enabled.clone(),
            running: state.running.clone(),
        }
    }
}

impl FileSystem for MemoryHost {
    fn exists(&self, path: &Path) -> bool {
        let state = self.lock();
        state.dirs.contains_key(path) || state.files.contains_key(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), InstallerError> {
        let mut state = self.lock();
        state.events.push(HostEvent::CreateDir(path.to_path_buf()));
        if state.dirs.contains_key(path) {
            return Ok(());
        }
        state.check_writable(path)?;
        if state.files.contains_key(path) {
            return Err(InstallerError::System(format!(
                "Failed to create directory {}: File exists",
                path.display()
            )));
        }
        state.add_dir_all(path);
        Ok(())
    }

    fn chown_recursive(&self, path: &Path, owner: &Owner) -> Result<(), InstallerError> {
        let mut state = self.lock();
        state.events.push(HostEvent::Chown(path.to_path_buf(), owner.clone()));
        if !state.dirs.contains_key(path) && !state.files.contains_key(path) {
            return Err(InstallerError::NotFound(path.to_path_buf()));
        }
        state.check_writable(path)?;
        for (dir, dir_owner) in state.dirs.iter_mut() {
            if dir.starts_with(path) {
                *dir_owner = Some(owner.clone());
            }
        }
        for (file_path, file) in state.files.iter_mut() {
            if file_path.starts_with(path) {
                file.owner = Some(owner.clone());
            }
        }
        Ok(())
    }

    fn install_file(&self, src: &Path, dst: &Path, mode: Mode) -> Result<(), InstallerError> {
        let mut state = self.lock();
        state.events.push(HostEvent::InstallFile {
            dest: dst.to_path_buf(),
            mode,
        });
        let content = state
            .files
            .get(src)
            .map(|f| f.content.clone())
            .ok_or_else(|| InstallerError::NotFound(src.to_path_buf()))?;
        state.check_writable(dst)?;
        if let Some(parent) = dst.parent() {
            state.add_dir_all(parent);
        }
        state.files.insert(
            dst.to_path_buf(),
            MemoryFile {
                content,
                mode,
                owner: None,
            },
        );
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<(), InstallerError> {
        let mut state = self.lock();
        state.events.push(HostEvent::RemoveFile(path.to_path_buf()));
        if !state.files.contains_key(path) {
            return Ok(());
        }
        state.check_writable(path)?;
        state.files.remove(path);
        Ok(())
    }
}

impl ServiceManager for MemoryHost {
    fn daemon_reload(&self) -> Result<(), InstallerError> {
        let mut state = self.lock();
        let units_on_disk: Vec<String> = state
            .files
            .keys()
            .filter(|p| p.parent() == Some(self.unit_dir.as_path()))
            .filter_map(|p| p.file_name()?.to_str().map(str::to_string))
            .collect();
        state.events.push(HostEvent::DaemonReload {
            units_on_disk: units_on_disk.clone(),
        });

        state.loaded = units_on_disk.into_iter().collect();
        let loaded = state.loaded.clone();
        state.enabled.retain(|u| loaded.contains(u));
        state.running.retain(|u| loaded.contains(u));
        Ok(())
    }

    fn enable_now(&self, unit: &str) -> Result<(), InstallerError> {
        let mut state = self.lock();
        state.events.push(HostEvent::EnableNow(unit.to_string()));
        if !state.loaded.contains(unit) {
            return Err(InstallerError::ServiceManager(format!(
                "Failed to enable unit: Unit file {} does not exist.",
                unit
            )));
        }
        state.enabled.insert(unit.to_string());
        if state.refuse_start.contains(unit) {
            state.failed.insert(unit.to_string());
            return Err(InstallerError::ServiceManager(format!(
                "Job for {} failed because the control process exited with error code.",
                unit
            )));
        }
        if state.crash_after_start.contains(unit) {
            state.failed.insert(unit.to_string());
        } else {
            state.failed.remove(unit);
            state.running.insert(unit.to_string());
        }
        Ok(())
    }

    fn disable_now(&self, unit: &str) -> Result<(), InstallerError> {
        let mut state = self.lock();
        state.events.push(HostEvent::DisableNow(unit.to_string()));
        state.enabled.remove(unit);
        state.running.remove(unit);
        state.failed.remove(unit);
        Ok(())
    }

    fn state(&self, unit: &str) -> Result<ServiceState, InstallerError> {
        let mut state = self.lock();
        state.events.push(HostEvent::QueryState(unit.to_string()));
        if state.status_unavailable {
            return Err(InstallerError::ServiceManager(
                "Failed to connect to bus: No such file or directory".to_string(),
            ));
        }
        let observed = if state.failed.contains(unit) {
            ServiceState::Failed
        } else if state.running.contains(unit) {
            ServiceState::Running
        } else if state.enabled.contains(unit) {
            ServiceState::Enabled
        } else if state.loaded.contains(unit) {
            ServiceState::Installed
        } else {
            ServiceState::Unknown
        };
        Ok(observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_only_loads_units_on_disk() {
        let host = MemoryHost::new("/etc/systemd/system")
            .with_file("/etc/systemd/system/a.service", "[Unit]")
            .with_file("/srv/b.service", "[Unit]");

        host.daemon_reload().unwrap();

        assert!(host.enable_now("a.service").is_ok());
        assert!(matches!(
            host.enable_now("b.service"),
            Err(InstallerError::ServiceManager(_))
        ));
        assert_eq!(host.state("a.service").unwrap(), ServiceState::Running);
        assert_eq!(host.state("b.service").unwrap(), ServiceState::Unknown);
    }

    #[test]
    fn read_only_paths_deny_writes() {
        let host = MemoryHost::new("/etc/systemd/system")
            .with_file("/srv/a.py", "x")
            .read_only("/opt");

        let err = host
            .install_file(Path::new("/srv/a.py"), Path::new("/opt/app/a.py"), Mode::EXECUTABLE)
            .unwrap_err();

        assert!(err.is_permission());
        assert!(host.file(Path::new("/opt/app/a.py")).is_none());
    }

    #[test]
    fn cleared_faults_allow_writes_and_starts() {
        let host = MemoryHost::new("/etc/systemd/system")
            .with_file("/etc/systemd/system/a.service", "[Unit]")
            .read_only("/etc/systemd")
            .refuse_start("a.service");
        host.daemon_reload().unwrap();
        assert!(host.enable_now("a.service").is_err());
        assert!(host
            .remove_file(Path::new("/etc/systemd/system/a.service"))
            .unwrap_err()
            .is_permission());

        host.clear_faults();

        assert!(host.enable_now("a.service").is_ok());
        host.remove_file(Path::new("/etc/systemd/system/a.service")).unwrap();
    }

    #[test]
    fn chown_reaches_nested_entries() {
        let host = MemoryHost::new("/etc/systemd/system").with_file("/data/sub/energy.db", "");

        host.chown_recursive(Path::new("/data"), &Owner::user("pi")).unwrap();

        assert_eq!(host.owner_of(Path::new("/data")), Some(Owner::user("pi")));
        assert_eq!(host.owner_of(Path::new("/data/sub")), Some(Owner::user("pi")));
        assert_eq!(host.owner_of(Path::new("/data/sub/energy.db")), Some(Owner::user("pi")));
    }
}
