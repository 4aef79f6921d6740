//! Submit portal - Application Entry Point
//!
//! Command line administration of a submit portal installation.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use submit_portal::{
    cli::{run_command, stage_startup_failure, Cli, Commands, LogTarget},
    config::Config,
    state::AppState,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing; stdout stays reserved for command output
    init_tracing(cli.log, &cli.level);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("submit-portal: {:#}", e);
            if matches!(cli.command, Commands::Stage { .. }) {
                println!("{}", stage_startup_failure().line());
            }
            return ExitCode::from(3);
        }
    };

    tracing::debug!(appdir = %config.storage.appdir.display(), "using application directory");
    let state = AppState::new(config);

    ExitCode::from(run_command(&state, cli.command))
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let config = Config::from_env().context("failed to load configuration")?;

    let Some(topdir) = &cli.topdir else {
        return Ok(config);
    };
    anyhow::ensure!(
        topdir.is_dir(),
        "topdir is not a directory: {}",
        topdir.display()
    );
    Ok(config.relocate(topdir))
}

fn init_tracing(target: LogTarget, level: &str) {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match target {
        LogTarget::None => {}
        LogTarget::Stderr => tracing_subscriber::registry()
            .with(filter())
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogTarget::Json => tracing_subscriber::registry()
            .with(filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
