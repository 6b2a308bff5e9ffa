// ABOUTME: Entry point for the bluegreen CLI application.
// ABOUTME: Parses arguments, sets up logging and Ctrl-C cancellation, and dispatches commands.

mod cli;
mod commands;

use bluegreen::config::{self, Config};
use bluegreen::error::Result;
use bluegreen::output::{Output, OutputMode};
use clap::Parser;
use cli::{Cli, Commands};
use std::env;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // --verbose wins; otherwise RUST_LOG, otherwise warnings only
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(OutputMode::from_flags(cli.quiet, cli.json));

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, aborting deployment");
            cancel_tx.send_replace(true);
        }
    });

    if let Err(e) = run(cli, output.clone(), cancel_rx).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: Output, cancel: watch::Receiver<bool>) -> Result<()> {
    let cwd = env::current_dir()?;

    match cli.command {
        Some(Commands::Init { app, image, force }) => {
            config::init_config(&cwd, app.as_deref(), image.as_deref(), force)?;
            output.success(&format!("Wrote {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Some(Commands::Status) => {
            let config = Config::resolve(&cwd, cli.config.as_deref())?;
            commands::status(config, output).await
        }
        None => {
            // clap enforces the version when no subcommand is given
            let version = cli.release.unwrap_or_default();
            let config = Config::resolve(&cwd, cli.config.as_deref())?;
            commands::deploy(config, &version, cli.force, output, cancel).await
        }
    }
}
