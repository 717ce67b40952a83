use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::install::{
    DeploymentSpec, FileInstall, FileStaging, HealthProbe, Mode, Owner, UnitInstall,
};

/// Looked up in the working directory when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "datenerfassung-deploy.toml";

const DEFAULT_DATA_DIR: &str = "/home/pi/datenerfassung";
const DEFAULT_PROJECT_DIR: &str = "/opt/datenerfassung";
const DEFAULT_API: &str = "http://127.0.0.1:5000";

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_file_mode() -> Mode {
    Mode::EXECUTABLE
}

/// Top‑level deployment configuration (defaults mirror the Raspberry Pi setup).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Where relative `files` and `units` sources live. Relative to the working directory.
    pub source_dir: PathBuf,
    pub data_dir: PathBuf,
    /// `false` when the application files are put in place by other means.
    pub stage_files: bool,
    pub unit_dir: PathBuf,
    /// Optional `X-Auth-Token` for the API server; `AUTH_TOKEN` is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    pub units: Vec<PathBuf>,
    pub owner: Owner,
    pub files: Vec<FileEntry>,
    pub health: ProbeConfig,
    pub latest: ProbeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub source: PathBuf,
    pub dest: PathBuf,
    #[serde(default = "default_file_mode")]
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ProbeConfig {
    fn to_probe(&self, auth_token: Option<&String>) -> Option<HealthProbe> {
        self.enabled.then(|| HealthProbe {
            url: self.url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            auth_token: auth_token.cloned(),
        })
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        let script = |name: &str| FileEntry {
            source: PathBuf::from(name),
            dest: Path::new(DEFAULT_PROJECT_DIR).join(name),
            mode: Mode::EXECUTABLE,
        };
        Self {
            source_dir: PathBuf::from("."),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            owner: Owner::user("pi"),
            stage_files: true,
            unit_dir: PathBuf::from(crate::install::linux::SYSTEM_UNIT_DIR),
            auth_token: None,
            files: vec![
                script("collector_pi3_sqlite.py"),
                script("api_server_sqlite.py"),
            ],
            units: vec![
                PathBuf::from("datenerfassung-collector.service"),
                PathBuf::from("datenerfassung-api.service"),
            ],
            health: ProbeConfig {
                url: format!("{DEFAULT_API}/api/health"),
                timeout_secs: default_timeout_secs(),
                enabled: true,
            },
            latest: ProbeConfig {
                url: format!("{DEFAULT_API}/api/latest"),
                timeout_secs: default_timeout_secs(),
                enabled: true,
            },
        }
    }
}

impl DeploymentConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s).context("Failed to parse config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&s).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// `--config` if given, else `CONFIG_FILE_NAME` in `cwd` if present, else defaults.
    pub fn discover(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            log::info!("Using config from: {}", path.display());
            return Self::read(path);
        }
        let local = cwd.join(CONFIG_FILE_NAME);
        if local.is_file() {
            log::info!("Using config from: {}", local.display());
            return Self::read(&local);
        }
        log::info!("No {} in {}, using built-in defaults", CONFIG_FILE_NAME, cwd.display());
        Ok(Self::default())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    pub fn validate(&self) -> Result<()> {
        if self.owner.user.trim().is_empty() {
            bail!("owner.user must not be empty");
        }
        for (what, path) in [("data_dir", &self.data_dir), ("unit_dir", &self.unit_dir)] {
            if !path.is_absolute() {
                bail!("{what} must be an absolute path, got {}", path.display());
            }
        }
        for file in &self.files {
            if !file.dest.is_absolute() {
                bail!("file destination must be absolute, got {}", file.dest.display());
            }
        }
        if self.units.is_empty() {
            bail!("at least one unit is required");
        }
        for unit in &self.units {
            let name = unit.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if !name.ends_with(".service") {
                bail!("unit {} is not a .service file", unit.display());
            }
        }
        for (what, probe) in [("health", &self.health), ("latest", &self.latest)] {
            let url = url::Url::parse(&probe.url)
                .with_context(|| format!("{what}.url is not a valid URL: {}", probe.url))?;
            if !matches!(url.scheme(), "http" | "https") {
                bail!("{what}.url must be http(s), got {}", probe.url);
            }
        }
        Ok(())
    }

    /// Build the installer's input, resolving relative sources against `cwd`.
    pub fn to_spec(
        &self,
        cwd: &Path,
        env_token: Option<String>,
        skip_staging: bool,
    ) -> Result<DeploymentSpec> {
        let source_dir = cwd.join(&self.source_dir);
        let staging = if self.stage_files && !skip_staging {
            FileStaging::Copy
        } else {
            FileStaging::AssumePresent
        };

        let files = self
            .files
            .iter()
            .map(|f| FileInstall {
                source: source_dir.join(&f.source),
                dest: f.dest.clone(),
                mode: f.mode,
            })
            .collect();

        let units = self
            .units
            .iter()
            .map(|u| {
                UnitInstall::from_source(source_dir.join(u))
                    .with_context(|| format!("Invalid unit path {}", u.display()))
            })
            .collect::<Result<Vec<_>>>()?;

        let auth_token = self.auth_token.clone().or(env_token);

        Ok(DeploymentSpec {
            data_dir: self.data_dir.clone(),
            owner: self.owner.clone(),
            staging,
            files,
            units,
            unit_dir: self.unit_dir.clone(),
            health: self.health.to_probe(auth_token.as_ref()),
            latest: self.latest.to_probe(auth_token.as_ref()),
        })
    }
}
