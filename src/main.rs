mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use log::error;

use datenerfassung_deploy::config::DeploymentConfig;
use datenerfassung_deploy::install::runners;

fn main() {
    // Initialize logger with custom format
    env_logger::Builder::new()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    // Single-threaded: every step waits for the previous one.
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: Failed to create Tokio runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(real_main()) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn real_main() -> Result<()> {
    let args = cli::Args::parse();
    let cmd = args.sub.unwrap_or_else(cli::Cmd::default_install);

    if let cli::Cmd::PrintConfig = cmd {
        print!("{}", DeploymentConfig::default().to_toml()?);
        return Ok(());
    }

    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    let cfg = DeploymentConfig::discover(args.config.as_deref(), &cwd)?;

    match cmd {
        cli::Cmd::Install {
            skip_staging,
            no_start,
            dry_run,
        } => {
            let spec = build_spec(&cfg, &cwd, skip_staging)?;
            if dry_run {
                runners::run_dry_run(&spec, !no_start)
            } else {
                runners::run_install(spec, !no_start).await
            }
        }
        cli::Cmd::Status => runners::run_status(build_spec(&cfg, &cwd, false)?),
        cli::Cmd::Health => runners::run_health(build_spec(&cfg, &cwd, false)?).await,
        cli::Cmd::Uninstall => runners::run_uninstall(build_spec(&cfg, &cwd, false)?),
        cli::Cmd::PrintConfig => Ok(()),
    }
}

fn build_spec(
    cfg: &DeploymentConfig,
    cwd: &Path,
    skip_staging: bool,
) -> Result<datenerfassung_deploy::install::DeploymentSpec> {
    let env_token = std::env::var("AUTH_TOKEN").ok().filter(|t| !t.is_empty());
    cfg.to_spec(cwd, env_token, skip_staging)
}
