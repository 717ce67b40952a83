//! Idempotent deployment of the Datenerfassung stack.
//!
//! The installer takes a [`DeploymentSpec`] and drives a host from "absent" to
//! "running services":
//!
//! data directory → application files → unit files → daemon reload →
//! enable/start → status report → health check.
//!
//! Host access goes through the [`FileSystem`] and [`ServiceManager`] traits.
//! [`linux`] implements them for the real machine, [`memory`] in-process.

mod error;
mod health;
mod host;
mod installer;
pub mod linux;
pub mod memory;
mod plan;
pub mod runners;
mod spec;
mod state;

pub use error::InstallerError;
pub use health::{HealthOutcome, probe};
pub use host::{FileSystem, ServiceManager};
pub use installer::{InstallReport, Installer};
pub use plan::{Stage, Step, plan};
pub use spec::{DeploymentSpec, FileInstall, FileStaging, HealthProbe, Mode, Owner, UnitInstall};
pub use state::{DeploymentPhase, ServiceState};
