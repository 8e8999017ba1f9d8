//! Constants and default values for Pathweave

use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Default routes directory name
pub const ROUTES_DIR: &str = "routes";

/// Default log directory name
pub const LOGS_DIR: &str = "logs";

/// File whose presence turns a directory into a route
pub const CONTROLLER_FILE: &str = "controller.toml";

/// Reserved page template name
pub const PAGE_TEMPLATE: &str = "page.html";

/// Shared layout file at the routes root
pub const LAYOUT_FILE: &str = "_layout.html";

/// Placeholder replaced by the page fragment inside the layout
pub const CONTENT_PLACEHOLDER: &str = "{{ content }}";

/// Per-route stylesheet
pub const STYLESHEET_FILE: &str = "styles.css";

/// Per-route script
pub const SCRIPT_FILE: &str = "script.js";

/// Route label used at the root path
pub const INDEX_ROUTE: &str = "index";

/// Endpoint id of the root route
pub const INDEX_ENDPOINT: &str = "route_index";

/// Handler used when a controller file does not name one
pub const DEFAULT_HANDLER: &str = "page";

/// Login endpoint that unauthenticated requests are redirected to
pub const LOGIN_PATH: &str = "/login";

/// Cookie carrying the signed session id
pub const SESSION_COOKIE: &str = "session";

/// Cookie that can carry a user identity directly
pub const USER_COOKIE: &str = "user";

/// Default session signing secret
pub const DEFAULT_SECRET_KEY: &str = "fallback_secret";

/// Default port of the main application
pub const DEFAULT_PORT: u16 = 5000;

/// Default port of the log viewer
pub const DEFAULT_VIEWER_PORT: u16 = 9001;

/// Environment variable that carries the log session id across reloads
pub const SESSION_ID_ENV: &str = "PATHWEAVE_SESSION_ID";

/// Extension of files the viewer considers logs
pub const LOG_EXTENSION: &str = "log";

/// Timestamp format of log lines
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date format used in log file names
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Interval at which streaming clients drain their mailbox
pub const STREAM_POLL_INTERVAL_MS: u64 = 100;

/// How long the viewer watcher waits before polling tracked files anyway
pub const WATCH_IDLE_POLL_MS: u64 = 1000;

/// Default regex patterns for protected paths
pub const DEFAULT_PROTECTED_PATTERNS: &[&str] = &[r"^/user/[^/]+/edit$"];

/// Default config file names to search for (in priority order)
pub const CONFIG_FILES: &[&str] = &["pathweave.toml", "pathweave.yaml", "pathweave.yml", "pathweave.json"];

/// File name of a session log for a given day
pub fn session_log_name(date: NaiveDate, session_id: &str) -> String {
    format!("{}_{}.{}", date.format(DATE_FORMAT), session_id, LOG_EXTENSION)
}

/// Full path of a session log for a given day
pub fn session_log_path(logs_dir: &Path, date: NaiveDate, session_id: &str) -> PathBuf {
    logs_dir.join(session_log_name(date, session_id))
}
