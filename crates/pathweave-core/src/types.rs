//! Core types for Pathweave

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::*;
use crate::error::Error;
use once_cell::sync::Lazy;
use regex::Regex;

fn default_handler() -> String {
    DEFAULT_HANDLER.to_string()
}

fn default_methods() -> Vec<String> {
    vec!["GET".to_string(), "POST".to_string()]
}

/// Declarative controller file (`controller.toml`) found in a route directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSpec {
    /// Name of the handler in the controller registry
    #[serde(default = "default_handler")]
    pub handler: String,
    /// HTTP methods the route accepts
    #[serde(default = "default_methods")]
    pub methods: Vec<String>,
    /// Page title; `{param}` is replaced by the matching path parameter
    #[serde(default)]
    pub title: Option<String>,
}

impl Default for ControllerSpec {
    fn default() -> Self {
        Self {
            handler: default_handler(),
            methods: default_methods(),
            title: None,
        }
    }
}

impl ControllerSpec {
    /// Parse a controller file body
    pub fn parse(content: &str) -> crate::Result<Self> {
        let spec: ControllerSpec = toml::from_str(content)?;
        Ok(spec)
    }
}

/// A route discovered from the routes directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteRegistration {
    /// Pattern handed to the router, e.g. `/user/:id`
    pub url_pattern: String,
    /// Path parameter names in order of appearance
    pub param_names: Vec<String>,
    /// Controller file relative to the routes root, `/`-separated
    pub handler_module_path: String,
    /// Unique endpoint identifier, e.g. `route_user_id`
    pub endpoint_id: String,
    /// Directory of the route relative to the routes root (empty at the root)
    pub route_dir: String,
    /// Parsed controller file
    pub controller: ControllerSpec,
}

impl RouteRegistration {
    /// Whether this is the root route
    pub fn is_index(&self) -> bool {
        self.route_dir.is_empty()
    }
}

/// Severity of a parsed log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    None,
}

impl LogLevel {
    /// Levels that can appear in a log line, in detection order
    pub const DETECTION_ORDER: [LogLevel; 4] = [
        LogLevel::Info,
        LogLevel::Error,
        LogLevel::Warning,
        LogLevel::Debug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::None => "none",
        }
    }

    /// Upper-case label written between brackets in a log line
    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::None => "NONE",
        }
    }

    /// Separator that marks this level inside a line, e.g. ` - [INFO] - `
    pub fn marker(&self) -> String {
        format!(" - [{}] - ", self.label())
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "none" => Ok(LogLevel::None),
            other => Err(Error::config(format!("Unknown log level: {}", other))),
        }
    }
}

/// One parsed log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub raw: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub level: LogLevel,
    pub message: String,
}

/// A log file as listed by the viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFileInfo {
    pub name: String,
    pub size: u64,
    /// Last modification time, `YYYY-MM-DD HH:MM:SS` local time
    pub modified: String,
}

/// A line matching a search query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub file: String,
    /// 1-based line number
    pub line: usize,
    pub content: String,
}

/// Plain file names only: no separators, no parent references
static FILE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_.\-\[\]]+$").expect("Invalid file name regex")
});

/// Validate a client-supplied file name to prevent path traversal
pub fn validate_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains("..") && FILE_NAME_REGEX.is_match(name)
}
