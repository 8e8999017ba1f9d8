//! Pathweave Logs - Session log sink, line parsing, tailing and search

mod parser;
mod reader;
mod writer;

pub use parser::{parse_content, parse_line};
pub use reader::{list_log_files, resolve_log_file, search, LogTailer};
pub use writer::{SessionLog, SessionLogConfig};

use pathweave_core::Result;
use std::path::Path;

/// Ensure log directory exists
pub fn ensure_log_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
