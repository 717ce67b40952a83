//! Datenerfassung deployment library
//!
//! Installs the energy-monitoring collector and API server on a single host
//! as systemd services, idempotently, and checks that they came up.

pub mod config;
pub mod install;
