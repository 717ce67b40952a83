//! Top-level runners for each CLI command (install, status, health, uninstall).
//!
//! These wire the real host (local filesystem + systemctl) into the installer
//! and print operator-facing progress to stdout.

use std::io::Write;

use anyhow::{Context, Result};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use super::linux::{LocalFileSystem, Systemctl, privileges};
use super::{DeploymentSpec, HealthOutcome, Installer, ServiceState, plan};

fn say(stdout: &mut StandardStream, color: Color, bold: bool, text: &str) {
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold));
    let _ = writeln!(stdout, "{text}");
    let _ = stdout.reset();
}

fn state_color(state: ServiceState) -> Color {
    match state {
        ServiceState::Running => Color::Green,
        ServiceState::Failed => Color::Red,
        ServiceState::Enabled | ServiceState::Installed => Color::Yellow,
        ServiceState::Unknown => Color::White,
    }
}

fn print_statuses(stdout: &mut StandardStream, statuses: &[(String, ServiceState)]) {
    for (name, state) in statuses {
        let _ = write!(stdout, "   {name}: ");
        say(stdout, state_color(*state), false, &state.to_string());
    }
}

fn print_probe(stdout: &mut StandardStream, label: &str, outcome: &HealthOutcome) {
    let color = match outcome {
        _ if outcome.is_healthy() => Color::Green,
        HealthOutcome::Skipped { .. } => Color::Yellow,
        _ => Color::Red,
    };
    say(stdout, Color::Cyan, false, &format!("\n{label}:"));
    say(stdout, color, false, &outcome.render());
}

/// Print the ordered steps without touching the host.
pub fn run_dry_run(spec: &DeploymentSpec, start_services: bool) -> Result<()> {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    say(&mut stdout, Color::Cyan, true, "Datenerfassung deployment plan (dry run)");

    for stage in plan(spec, start_services) {
        say(&mut stdout, Color::Cyan, false, &format!("\n→ {:?}", stage.reaches));
        for step in &stage.steps {
            let _ = writeln!(stdout, "   {step}");
        }
    }
    if let Some(probe) = &spec.health {
        let _ = writeln!(stdout, "\n   GET {}", probe.url);
    }
    if let Some(probe) = &spec.latest {
        let _ = writeln!(stdout, "   GET {}", probe.url);
    }
    Ok(())
}

/// Full install sequence on this host.
pub async fn run_install(spec: DeploymentSpec, start_services: bool) -> Result<()> {
    privileges::ensure_root().context("Installation needs root")?;

    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    say(&mut stdout, Color::Cyan, true, "🔧 Datenerfassung Deployment");
    let _ = writeln!(stdout, "Data directory: {}", spec.data_dir.display());
    let _ = writeln!(stdout, "Units: {}\n", spec.unit_names().collect::<Vec<_>>().join(", "));

    let systemctl = Systemctl::locate()?;
    let mut installer = Installer::new(spec, LocalFileSystem, systemctl).start_services(start_services);

    let report = installer.run().await.context("Deployment failed")?;

    say(&mut stdout, Color::Green, false, &format!("✓ Reached {:?}", report.phase));
    say(&mut stdout, Color::Cyan, false, "\nService status:");
    print_statuses(&mut stdout, &report.statuses);

    print_probe(&mut stdout, "Health", &report.health);
    if let Some(latest) = &report.latest {
        print_probe(&mut stdout, "Latest data", latest);
    }

    if report.phase.is_terminal() {
        say(&mut stdout, Color::Green, true, "\n✅ Deployment complete");
    } else {
        say(
            &mut stdout,
            Color::Yellow,
            true,
            "\n⚠ Deployment finished but not every service is running; re-run to retry",
        );
    }
    Ok(())
}

/// Print the state of each configured unit.
pub fn run_status(spec: DeploymentSpec) -> Result<()> {
    let systemctl = Systemctl::locate()?;
    let installer = Installer::new(spec, LocalFileSystem, systemctl);

    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    say(&mut stdout, Color::Cyan, true, "Service status:");
    print_statuses(&mut stdout, &installer.statuses());
    Ok(())
}

/// Query the health and latest-data endpoints.
pub async fn run_health(spec: DeploymentSpec) -> Result<()> {
    let client = reqwest::Client::new();
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    match &spec.health {
        Some(probe) => print_probe(&mut stdout, &probe.url, &super::probe(&client, probe).await),
        None => say(&mut stdout, Color::Yellow, false, "Health probe disabled"),
    }
    if let Some(probe) = &spec.latest {
        print_probe(&mut stdout, &probe.url, &super::probe(&client, probe).await);
    }
    Ok(())
}

/// Remove units and staged files; the data directory stays.
pub fn run_uninstall(spec: DeploymentSpec) -> Result<()> {
    privileges::ensure_root().context("Uninstallation needs root")?;

    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    say(&mut stdout, Color::Cyan, true, "🗑️  Datenerfassung Removal\n");

    let data_dir = spec.data_dir.clone();
    let systemctl = Systemctl::locate()?;
    Installer::new(spec, LocalFileSystem, systemctl)
        .uninstall()
        .context("Uninstallation failed")?;

    say(&mut stdout, Color::Green, true, "✅ Units and application files removed");
    let _ = writeln!(stdout, "   Data kept in {}", data_dir.display());
    Ok(())
}
