//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pathweave")]
#[command(version, about = "Directory-routed web apps with a live log viewer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Directory searched for pathweave.toml / .yaml / .json
    #[arg(short, long, global = true, default_value = ".")]
    pub config_dir: PathBuf,

    /// Output in JSON format instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the application from the routes directory
    Serve(ServeArgs),

    /// Serve the log viewer
    Viewer(ViewerArgs),

    /// List the routes discovered in the routes directory
    Routes(RoutesArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Routes directory
    #[arg(long)]
    pub routes_dir: Option<PathBuf>,

    /// Directory for session logs
    #[arg(long)]
    pub logs_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct ViewerArgs {
    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory holding the session logs
    #[arg(long)]
    pub logs_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct RoutesArgs {
    /// Routes directory
    #[arg(long)]
    pub routes_dir: Option<PathBuf>,
}
