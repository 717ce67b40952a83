use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "Deploy the Datenerfassung collector and API as systemd services")]
pub struct Args {
    /// Path to configuration file (default: ./datenerfassung-deploy.toml, else built-in defaults)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Sub‑commands (install, status, etc.)
    #[command(subcommand)]
    pub sub: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Install and start everything (default if no sub‑command)
    Install {
        /// Application files are already in place; only check they exist
        #[arg(long)]
        skip_staging: bool,

        /// Register units without enabling or starting them
        #[arg(long)]
        no_start: bool,

        /// Show what would be done without doing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the state of each unit
    Status,
    /// Query the health and latest-data endpoints
    Health,
    /// Stop and remove units and application files (data directory is kept)
    Uninstall,
    /// Print the default configuration as TOML
    PrintConfig,
}

impl Cmd {
    /// What a bare invocation does.
    pub fn default_install() -> Self {
        Cmd::Install {
            skip_staging: false,
            no_start: false,
            dry_run: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_has_no_subcommand() {
        let args = Args::try_parse_from(["datenerfassung-deploy"]).unwrap();
        assert!(args.sub.is_none());
        assert!(args.config.is_none());
    }

    #[test]
    fn install_flags_and_global_config() {
        let args = Args::try_parse_from([
            "datenerfassung-deploy",
            "install",
            "--skip-staging",
            "--dry-run",
            "--config",
            "/etc/datenerfassung.toml",
        ])
        .unwrap();

        assert_eq!(args.config, Some(PathBuf::from("/etc/datenerfassung.toml")));
        match args.sub {
            Some(Cmd::Install {
                skip_staging,
                no_start,
                dry_run,
            }) => {
                assert!(skip_staging);
                assert!(!no_start);
                assert!(dry_run);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn print_config_is_kebab_case() {
        let args = Args::try_parse_from(["datenerfassung-deploy", "print-config"]).unwrap();
        assert!(matches!(args.sub, Some(Cmd::PrintConfig)));
    }
}
