//! Routes command implementation

use anyhow::{Context, Result};
use pathweave_core::Settings;
use pathweave_web::{ControllerRegistry, RouteTable};

use crate::cli::RoutesArgs;
use crate::output::print_routes;

pub fn execute(settings: Settings, args: RoutesArgs) -> Result<()> {
    let routes_dir = args.routes_dir.unwrap_or(settings.routes_dir);

    let table = RouteTable::discover(&routes_dir)
        .with_context(|| format!("Failed to discover routes in {}", routes_dir.display()))?;
    ControllerRegistry::default()
        .bind(&table, &routes_dir)
        .context("Failed to bind controllers")?;

    print_routes(table.routes());
    Ok(())
}
