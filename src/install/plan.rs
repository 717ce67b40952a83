//! The ordered list of steps a deployment performs.
//!
//! The installer executes exactly this plan, and `--dry-run` prints it, so the
//! ordering contract lives in one place: data directory, files, units, reload,
//! enable/start.

use std::fmt;
use std::path::PathBuf;

use super::spec::{DeploymentSpec, FileInstall, FileStaging, Mode, Owner, UnitInstall};
use super::state::DeploymentPhase;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    EnsureDataDirectory { path: PathBuf, owner: Owner },
    InstallFile(FileInstall),
    VerifyFile(PathBuf),
    InstallUnit { unit: UnitInstall, dest: PathBuf },
    ReloadDaemon,
    EnableAndStart(String),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::EnsureDataDirectory { path, owner } => {
                write!(f, "mkdir -p {} && chown -R {} {}", path.display(), owner, path.display())
            }
            Step::InstallFile(file) => write!(
                f,
                "install -m {} {} {}",
                file.mode,
                file.source.display(),
                file.dest.display()
            ),
            Step::VerifyFile(path) => write!(f, "test -e {}", path.display()),
            Step::InstallUnit { unit, dest } => write!(
                f,
                "install -m {} {} {}",
                Mode::UNIT_FILE,
                unit.source.display(),
                dest.display()
            ),
            Step::ReloadDaemon => f.write_str("systemctl daemon-reload"),
            Step::EnableAndStart(name) => write!(f, "systemctl enable --now {name}"),
        }
    }
}

/// Steps that, once all done, move the deployment to `reaches`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub reaches: DeploymentPhase,
    pub steps: Vec<Step>,
}

pub fn plan(spec: &DeploymentSpec, start_services: bool) -> Vec<Stage> {
    let mut staged = vec![Step::EnsureDataDirectory {
        path: spec.data_dir.clone(),
        owner: spec.owner.clone(),
    }];
    staged.extend(spec.files.iter().map(|file| match spec.staging {
        FileStaging::Copy => Step::InstallFile(file.clone()),
        FileStaging::AssumePresent => Step::VerifyFile(file.dest.clone()),
    }));

    let mut registered: Vec<Step> = spec
        .units
        .iter()
        .map(|unit| Step::InstallUnit {
            unit: unit.clone(),
            dest: spec.unit_path(unit),
        })
        .collect();
    registered.push(Step::ReloadDaemon);

    let mut stages = vec![
        Stage {
            reaches: DeploymentPhase::FilesStaged,
            steps: staged,
        },
        Stage {
            reaches: DeploymentPhase::UnitsRegistered,
            steps: registered,
        },
    ];

    if start_services {
        stages.push(Stage {
            reaches: DeploymentPhase::ServicesEnabled,
            steps: spec
                .unit_names()
                .map(|name| Step::EnableAndStart(name.to_string()))
                .collect(),
        });
    }

    stages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::spec::HealthProbe;
    use std::path::Path;

    fn spec(staging: FileStaging) -> DeploymentSpec {
        DeploymentSpec {
            data_dir: "/home/pi/datenerfassung".into(),
            owner: Owner::user("pi"),
            staging,
            files: vec![FileInstall {
                source: "/src/collector_pi3_sqlite.py".into(),
                dest: "/opt/datenerfassung/collector_pi3_sqlite.py".into(),
                mode: Mode::EXECUTABLE,
            }],
            units: vec![
                UnitInstall::from_source("/src/datenerfassung-collector.service").unwrap(),
                UnitInstall::from_source("/src/datenerfassung-api.service").unwrap(),
            ],
            unit_dir: "/etc/systemd/system".into(),
            health: Some(HealthProbe::new("http://127.0.0.1:5000/api/health")),
            latest: None,
        }
    }

    #[test]
    fn reload_follows_every_unit_and_precedes_every_start() {
        let steps: Vec<Step> = plan(&spec(FileStaging::Copy), true)
            .into_iter()
            .flat_map(|s| s.steps)
            .collect();

        let reload = steps.iter().position(|s| *s == Step::ReloadDaemon).unwrap();
        for (i, step) in steps.iter().enumerate() {
            match step {
                Step::InstallUnit { .. } | Step::InstallFile(_) | Step::EnsureDataDirectory { .. } => {
                    assert!(i < reload)
                }
                Step::EnableAndStart(_) => assert!(i > reload),
                _ => {}
            }
        }
        assert!(matches!(steps[0], Step::EnsureDataDirectory { .. }));
    }

    #[test]
    fn starts_follow_unit_order() {
        let stages = plan(&spec(FileStaging::Copy), true);
        let last = stages.last().unwrap();
        assert_eq!(last.reaches, DeploymentPhase::ServicesEnabled);
        assert_eq!(
            last.steps,
            vec![
                Step::EnableAndStart("datenerfassung-collector.service".into()),
                Step::EnableAndStart("datenerfassung-api.service".into()),
            ]
        );
    }

    #[test]
    fn assume_present_verifies_instead_of_copying() {
        let stages = plan(&spec(FileStaging::AssumePresent), true);
        assert_eq!(
            stages[0].steps[1],
            Step::VerifyFile(Path::new("/opt/datenerfassung/collector_pi3_sqlite.py").into())
        );
    }

    #[test]
    fn no_start_stops_at_registration() {
        let stages = plan(&spec(FileStaging::Copy), false);
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].reaches, DeploymentPhase::UnitsRegistered);
    }

    #[test]
    fn steps_render_as_shell_equivalents() {
        let unit = UnitInstall::from_source("/src/datenerfassung-api.service").unwrap();
        let step = Step::InstallUnit {
            dest: Path::new("/etc/systemd/system/datenerfassung-api.service").into(),
            unit,
        };
        assert_eq!(
            step.to_string(),
            "install -m 644 /src/datenerfassung-api.service /etc/systemd/system/datenerfassung-api.service"
        );
        assert_eq!(
            Step::EnableAndStart("x.service".into()).to_string(),
            "systemctl enable --now x.service"
        );
    }
}
