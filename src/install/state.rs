//! Observed service states and the deployment phase machine.

use std::fmt;

/// State of a single unit as reported by the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
    Unknown,
    Installed,
    Enabled,
    Running,
    Failed,
}

impl ServiceState {
    /// Derive a state from `systemctl show -p LoadState,UnitFileState,ActiveState`.
    ///
    /// A failed unit is `Failed` even if it is still enabled; an active unit is
    /// `Running` regardless of its enablement.
    pub fn from_show_output(output: &str) -> Self {
        let mut load = "";
        let mut unit_file = "";
        let mut active = "";

        for line in output.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                "LoadState" => load = value.trim(),
                "UnitFileState" => unit_file = value.trim(),
                "ActiveState" => active = value.trim(),
                _ => {}
            }
        }

        match active {
            "failed" => return ServiceState::Failed,
            "active" | "activating" | "reloading" => return ServiceState::Running,
            _ => {}
        }
        if unit_file.starts_with("enabled") {
            return ServiceState::Enabled;
        }
        if load == "loaded" {
            return ServiceState::Installed;
        }
        ServiceState::Unknown
    }

    pub fn is_running(self) -> bool {
        self == ServiceState::Running
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Unknown => "unknown",
            ServiceState::Installed => "installed",
            ServiceState::Enabled => "enabled",
            ServiceState::Running => "running",
            ServiceState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Progress of a deployment. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeploymentPhase {
    NotInstalled,
    FilesStaged,
    UnitsRegistered,
    ServicesEnabled,
    ServicesRunning,
}

impl DeploymentPhase {
    /// The phase that directly follows this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            DeploymentPhase::NotInstalled => Some(DeploymentPhase::FilesStaged),
            DeploymentPhase::FilesStaged => Some(DeploymentPhase::UnitsRegistered),
            DeploymentPhase::UnitsRegistered => Some(DeploymentPhase::ServicesEnabled),
            DeploymentPhase::ServicesEnabled => Some(DeploymentPhase::ServicesRunning),
            DeploymentPhase::ServicesRunning => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == DeploymentPhase::ServicesRunning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_unit_is_running() {
        let out = "LoadState=loaded\nUnitFileState=enabled\nActiveState=active\n";
        assert_eq!(ServiceState::from_show_output(out), ServiceState::Running);
    }

    #[test]
    fn failed_wins_over_enabled() {
        let out = "LoadState=loaded\nUnitFileState=enabled\nActiveState=failed\n";
        assert_eq!(ServiceState::from_show_output(out), ServiceState::Failed);
    }

    #[test]
    fn enabled_but_inactive() {
        let out = "LoadState=loaded\nUnitFileState=enabled-runtime\nActiveState=inactive\n";
        assert_eq!(ServiceState::from_show_output(out), ServiceState::Enabled);
    }

    #[test]
    fn loaded_but_disabled_is_installed() {
        let out = "LoadState=loaded\nUnitFileState=disabled\nActiveState=inactive\n";
        assert_eq!(ServiceState::from_show_output(out), ServiceState::Installed);
    }

    #[test]
    fn missing_unit_is_unknown() {
        let out = "LoadState=not-found\nUnitFileState=\nActiveState=inactive\n";
        assert_eq!(ServiceState::from_show_output(out), ServiceState::Unknown);
        assert_eq!(ServiceState::from_show_output(""), ServiceState::Unknown);
    }

    #[test]
    fn phases_advance_in_order() {
        let mut phase = DeploymentPhase::NotInstalled;
        let mut seen = vec![phase];
        while let Some(next) = phase.next() {
            assert!(next > phase);
            phase = next;
            seen.push(phase);
        }
        assert_eq!(seen.len(), 5);
        assert!(phase.is_terminal());
    }
}
