//! Viewer command implementation

use anyhow::{Context, Result};
use pathweave_core::Settings;

use crate::cli::ViewerArgs;
use crate::output::print_info;

pub async fn execute(settings: Settings, args: ViewerArgs) -> Result<()> {
    let port = args.port.unwrap_or(settings.viewer_port);
    let logs_dir = args.logs_dir.unwrap_or(settings.logs_dir);

    print_info(&format!(
        "Log viewer on http://localhost:{} for {}",
        port,
        logs_dir.display()
    ));

    pathweave_viewer::start_viewer(logs_dir, port)
        .await
        .context("Log viewer failed")
}
