//! Error types for Pathweave

use std::path::PathBuf;

/// Pathweave error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Invalid controller {path}: {message}")]
    InvalidController { path: PathBuf, message: String },

    #[error("Controller {path} names unknown handler '{handler}'")]
    UnknownHandler { path: PathBuf, handler: String },

    #[error("Route {pattern} is declared by both {first} and {second}")]
    DuplicateRoute {
        pattern: String,
        first: String,
        second: String,
    },

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Handler failed: {0}")]
    HandlerFailed(String),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid pattern: {0}")]
    RegexError(#[from] regex::Error),
}

/// Result type alias for Pathweave
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::ConfigError(msg.into())
    }

    pub fn handler<S: Into<String>>(msg: S) -> Self {
        Error::HandlerFailed(msg.into())
    }

    pub fn watch<S: Into<String>>(msg: S) -> Self {
        Error::WatchError(msg.into())
    }

    pub fn invalid_controller<S: Into<String>>(path: impl Into<PathBuf>, msg: S) -> Self {
        Error::InvalidController {
            path: path.into(),
            message: msg.into(),
        }
    }
}
