//! Deployment description handed to the installer.
//!
//! A `DeploymentSpec` is built once at the program boundary (from the TOML
//! config and CLI flags) and is the only input the installer reads. Nothing in
//! here looks at the working directory or the environment.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Permission bits of an installed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode(u32);

impl Mode {
    pub const EXECUTABLE: Mode = Mode(0o755);
    pub const UNIT_FILE: Mode = Mode(0o644);

    pub fn new(bits: u32) -> Self {
        Self(bits & 0o7777)
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:o}", self.0)
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix("0o").unwrap_or(trimmed);
        let bits = u32::from_str_radix(digits, 8)
            .map_err(|_| format!("invalid octal mode: {s:?}"))?;
        if bits > 0o7777 {
            return Err(format!("mode out of range: {s:?}"));
        }
        Ok(Mode(bits))
    }
}

impl Serialize for Mode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// User (and optional group) that owns the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl Owner {
    pub fn user(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            group: None,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{}:{}", self.user, group),
            None => f.write_str(&self.user),
        }
    }
}

/// One application file to place on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInstall {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub mode: Mode,
}

/// One systemd unit file; `name` is what systemctl is called with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitInstall {
    pub source: PathBuf,
    pub name: String,
}

impl UnitInstall {
    /// Unit named after the source file name.
    pub fn from_source(source: impl Into<PathBuf>) -> Option<Self> {
        let source = source.into();
        let name = source.file_name()?.to_str()?.to_string();
        Some(Self { source, name })
    }
}

/// How the application files reach their destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileStaging {
    /// Copy every file, overwriting whatever is there.
    #[default]
    Copy,
    /// Files were put in place by other means; only check they exist.
    AssumePresent,
}

/// A loopback HTTP endpoint queried for operator visibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthProbe {
    pub url: String,
    pub timeout: Duration,
    /// Sent as `X-Auth-Token` when the API server requires one.
    pub auth_token: Option<String>,
}

impl HealthProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(5),
            auth_token: None,
        }
    }
}

/// Everything the installer needs to know about one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSpec {
    pub data_dir: PathBuf,
    pub owner: Owner,
    pub staging: FileStaging,
    pub files: Vec<FileInstall>,
    pub units: Vec<UnitInstall>,
    pub unit_dir: PathBuf,
    pub health: Option<HealthProbe>,
    pub latest: Option<HealthProbe>,
}

impl DeploymentSpec {
    /// Destination of a unit file inside the unit directory.
    pub fn unit_path(&self, unit: &UnitInstall) -> PathBuf {
        self.unit_dir.join(&unit.name)
    }

    pub fn unit_names(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|u| u.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_octal_strings() {
        assert_eq!("755".parse::<Mode>().unwrap(), Mode::EXECUTABLE);
        assert_eq!("0644".parse::<Mode>().unwrap(), Mode::UNIT_FILE);
        assert_eq!("0o600".parse::<Mode>().unwrap().bits(), 0o600);
        assert!("rwx".parse::<Mode>().is_err());
        assert!("888".parse::<Mode>().is_err());
        assert!("17777".parse::<Mode>().is_err());
        assert!("0o0o755".parse::<Mode>().is_err());
    }

    #[test]
    fn mode_displays_as_octal() {
        assert_eq!(Mode::EXECUTABLE.to_string(), "755");
        assert_eq!(Mode::new(0o100644).to_string(), "644");
    }

    #[test]
    fn unit_name_comes_from_file_name() {
        let unit = UnitInstall::from_source("/srv/units/datenerfassung-api.service").unwrap();
        assert_eq!(unit.name, "datenerfassung-api.service");
        assert!(UnitInstall::from_source("/").is_none());
    }

    #[test]
    fn owner_display_includes_group_when_set() {
        assert_eq!(Owner::user("pi").to_string(), "pi");
        let owner = Owner {
            user: "pi".into(),
            group: Some("gpio".into()),
        };
        assert_eq!(owner.to_string(), "pi:gpio");
    }
}
