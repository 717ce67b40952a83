//! The deployment sequence.
//!
//! `Installer` runs the plan strictly in order and stops at the first failing
//! step. There is no rollback: every step is idempotent, so running the whole
//! sequence again is how a partial deployment is repaired.

use std::path::Path;

use log::{info, warn};

use super::error::InstallerError;
use super::health::{self, HealthOutcome};
use super::host::{FileSystem, ServiceManager};
use super::plan::{self, Stage, Step};
use super::spec::{DeploymentSpec, FileStaging, HealthProbe, Mode, Owner, UnitInstall};
use super::state::{DeploymentPhase, ServiceState};

/// What an install run observed after the last mutating step.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub phase: DeploymentPhase,
    pub statuses: Vec<(String, ServiceState)>,
    pub health: HealthOutcome,
    pub latest: Option<HealthOutcome>,
}

pub struct Installer<F, S> {
    spec: DeploymentSpec,
    fs: F,
    services: S,
    http: reqwest::Client,
    start_services: bool,
    phase: DeploymentPhase,
    reloaded: bool,
    units_pending_reload: bool,
}

impl<F: FileSystem, S: ServiceManager> Installer<F, S> {
    pub fn new(spec: DeploymentSpec, fs: F, services: S) -> Self {
        Self {
            spec,
            fs,
            services,
            http: reqwest::Client::new(),
            start_services: true,
            phase: DeploymentPhase::NotInstalled,
            reloaded: false,
            units_pending_reload: false,
        }
    }

    /// Stop after registering units; nothing is enabled or started.
    pub fn start_services(mut self, start: bool) -> Self {
        self.start_services = start;
        self
    }

    pub fn spec(&self) -> &DeploymentSpec {
        &self.spec
    }

    pub fn phase(&self) -> DeploymentPhase {
        self.phase
    }

    pub fn plan(&self) -> Vec<Stage> {
        plan::plan(&self.spec, self.start_services)
    }

    /// `mkdir -p` followed by `chown -R`.
    pub fn ensure_data_directory(&self, path: &Path, owner: &Owner) -> Result<(), InstallerError> {
        self.fs.create_dir_all(path)?;
        self.fs.chown_recursive(path, owner)?;
        info!("Data directory ready: {} (owner {})", path.display(), owner);
        Ok(())
    }

    /// Copy with exact permission bits, overwriting unconditionally.
    pub fn install_file(&self, src: &Path, dst: &Path, mode: Mode) -> Result<(), InstallerError> {
        self.fs.install_file(src, dst, mode)?;
        info!("Installed {} -> {} ({})", src.display(), dst.display(), mode);
        Ok(())
    }

    /// Place a unit file in the unit directory. A reload is owed afterwards.
    pub fn install_unit(&mut self, unit: &UnitInstall) -> Result<(), InstallerError> {
        let dest = self.spec.unit_path(unit);
        self.fs.install_file(&unit.source, &dest, Mode::UNIT_FILE)?;
        self.units_pending_reload = true;
        info!("Installed unit {} -> {}", unit.name, dest.display());
        Ok(())
    }

    pub fn reload_daemon(&mut self) -> Result<(), InstallerError> {
        self.services.daemon_reload()?;
        self.reloaded = true;
        self.units_pending_reload = false;
        info!("Service manager configuration reloaded");
        Ok(())
    }

    /// Enable and start a unit. Refused until the daemon has been reloaded
    /// after the most recent unit install.
    pub fn enable_and_start(&self, name: &str) -> Result<(), InstallerError> {
        if !self.reloaded || self.units_pending_reload {
            return Err(InstallerError::OutOfOrder(format!(
                "{name} cannot be enabled before the daemon reloads its unit files"
            )));
        }
        self.services.enable_now(name)?;
        info!("Enabled and started {}", name);
        Ok(())
    }

    /// Current state of a unit. Query failures are logged, never raised.
    pub fn report_status(&self, name: &str) -> ServiceState {
        match self.services.state(name) {
            Ok(state) => state,
            Err(e) => {
                warn!("Could not query status of {}: {}", name, e);
                ServiceState::Unknown
            }
        }
    }

    pub fn statuses(&self) -> Vec<(String, ServiceState)> {
        self.spec
            .unit_names()
            .map(|name| (name.to_string(), self.report_status(name)))
            .collect()
    }

    /// Probe an HTTP endpoint. Never fails.
    pub async fn health_check(&self, probe: &HealthProbe) -> HealthOutcome {
        health::probe(&self.http, probe).await
    }

    fn execute(&mut self, step: &Step) -> Result<(), InstallerError> {
        match step {
            Step::EnsureDataDirectory { path, owner } => self.ensure_data_directory(path, owner),
            Step::InstallFile(file) => self.install_file(&file.source, &file.dest, file.mode),
            Step::VerifyFile(path) => {
                if self.fs.exists(path) {
                    Ok(())
                } else {
                    Err(InstallerError::NotFound(path.clone()))
                }
            }
            Step::InstallUnit { unit, .. } => self.install_unit(unit),
            Step::ReloadDaemon => self.reload_daemon(),
            Step::EnableAndStart(name) => self.enable_and_start(name),
        }
    }

    /// Step forward one phase at a time until `to`; never moves back.
    fn advance(&mut self, to: DeploymentPhase) {
        while self.phase < to {
            let Some(next) = self.phase.next() else { break };
            info!("Deployment phase: {:?} -> {:?}", self.phase, next);
            self.phase = next;
        }
    }

    /// Execute every mutating step, fail-fast. Each call starts over from
    /// `NotInstalled`, so a failed run is retried by calling it again.
    pub fn deploy(&mut self) -> Result<DeploymentPhase, InstallerError> {
        self.phase = DeploymentPhase::NotInstalled;
        self.reloaded = false;
        self.units_pending_reload = false;

        for stage in self.plan() {
            for step in &stage.steps {
                self.execute(step)?;
            }
            self.advance(stage.reaches);
        }
        Ok(self.phase)
    }

    /// Deploy, then report status and probe the API. Only the deployment
    /// itself can fail; status and probes are diagnostic.
    pub async fn run(&mut self) -> Result<InstallReport, InstallerError> {
        self.deploy()?;

        let statuses = self.statuses();
        let all_running = statuses.iter().all(|(_, state)| state.is_running());
        if self.phase == DeploymentPhase::ServicesEnabled && all_running {
            self.advance(DeploymentPhase::ServicesRunning);
        }

        let running = self.phase == DeploymentPhase::ServicesRunning;
        let health = match &self.spec.health {
            None => HealthOutcome::Skipped {
                reason: "no health endpoint configured".to_string(),
            },
            Some(probe) if running => self.health_check(probe).await,
            Some(_) => not_running(),
        };
        let latest = match &self.spec.latest {
            None => None,
            Some(probe) if running => Some(self.health_check(probe).await),
            Some(_) => Some(not_running()),
        };

        Ok(InstallReport {
            phase: self.phase,
            statuses,
            health,
            latest,
        })
    }

    /// Stop and disable units, remove unit files and staged files, reload.
    ///
    /// The data directory is left alone. Units that are already gone are
    /// skipped with a warning; filesystem failures abort.
    pub fn uninstall(&mut self) -> Result<(), InstallerError> {
        let units: Vec<UnitInstall> = self.spec.units.iter().rev().cloned().collect();
        for unit in &units {
            if let Err(e) = self.services.disable_now(&unit.name) {
                warn!("Could not disable {}: {}", unit.name, e);
            }
            self.fs.remove_file(&self.spec.unit_path(unit))?;
            info!("Removed unit {}", unit.name);
        }

        if self.spec.staging == FileStaging::Copy {
            for file in &self.spec.files {
                self.fs.remove_file(&file.dest)?;
                info!("Removed {}", file.dest.display());
            }
        }

        self.reload_daemon()
    }
}

fn not_running() -> HealthOutcome {
    HealthOutcome::Skipped {
        reason: "not every service reports running".to_string(),
    }
}
