//! Pathweave CLI - directory-routed web apps with a live log viewer

use anyhow::{Context, Result};
use clap::Parser;
use pathweave_core::Settings;
use std::future::Future;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};
use commands::*;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    output::set_json_mode(cli.json);

    let settings = match Settings::load(&cli.config_dir).context("Failed to load configuration") {
        Ok(settings) => settings,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    let log_level = match (cli.verbose, settings.debug) {
        (0, false) => "info",
        (0, true) | (1, _) => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pathweave={},tower_http=info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Commands::Serve(args) => {
            serve::prepare(settings, args).and_then(|session| run(serve::execute(session)))
        }
        Commands::Viewer(args) => run(viewer::execute(settings, args)),
        Commands::Routes(args) => routes::execute(settings, args),
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

/// Drive a command on a fresh multi-threaded runtime
fn run<F>(command: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?
        .block_on(command)
}
