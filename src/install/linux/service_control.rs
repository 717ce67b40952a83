//! Systemd service control through `systemctl`.

use std::path::PathBuf;
use std::process::{Command, Output};

use crate::install::error::InstallerError;
use crate::install::host::ServiceManager;
use crate::install::state::ServiceState;

/// The host's systemd, driven by the `systemctl` binary.
#[derive(Debug, Clone)]
pub struct Systemctl {
    program: PathBuf,
}

impl Systemctl {
    /// Locate `systemctl` on `PATH`.
    pub fn locate() -> Result<Self, InstallerError> {
        let program = which::which("systemctl").map_err(|e| {
            InstallerError::ServiceManager(format!("systemctl not found on PATH: {}", e))
        })?;
        Ok(Self { program })
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn output(&self, args: &[&str]) -> Result<Output, InstallerError> {
        log::debug!("systemctl {}", args.join(" "));
        Command::new(&self.program).args(args).output().map_err(|e| {
            InstallerError::ServiceManager(format!(
                "Failed to execute systemctl {}: {}",
                args.join(" "),
                e
            ))
        })
    }

    /// Run a verb and fail with systemctl's own stderr when it exits non-zero.
    fn run(&self, args: &[&str]) -> Result<Output, InstallerError> {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(InstallerError::ServiceManager(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(output)
    }
}

impl ServiceManager for Systemctl {
    fn daemon_reload(&self) -> Result<(), InstallerError> {
        self.run(&["daemon-reload"]).map(|_| ())
    }

    fn enable_now(&self, unit: &str) -> Result<(), InstallerError> {
        self.run(&["enable", "--now", unit]).map(|_| ())
    }

    fn disable_now(&self, unit: &str) -> Result<(), InstallerError> {
        self.run(&["disable", "--now", unit]).map(|_| ())
    }

    fn state(&self, unit: &str) -> Result<ServiceState, InstallerError> {
        let output = self.run(&[
            "show",
            unit,
            "--property=LoadState,UnitFileState,ActiveState",
        ])?;
        Ok(ServiceState::from_show_output(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_a_service_manager_error() {
        let systemctl = Systemctl::with_program("/nonexistent/systemctl");
        let err = systemctl.daemon_reload().unwrap_err();
        assert!(matches!(err, InstallerError::ServiceManager(msg) if msg.contains("daemon-reload")));
    }

    #[test]
    fn non_zero_exit_surfaces_stderr() {
        // `false` ignores its arguments and exits 1 with empty stderr.
        let systemctl = Systemctl::with_program("false");
        let err = systemctl.enable_now("datenerfassung-api.service").unwrap_err();
        assert!(matches!(err, InstallerError::ServiceManager(_)));
    }
}
