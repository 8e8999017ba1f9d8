//! Configuration for Pathweave
//!
//! Settings are resolved in layers, later layers winning:
//! - built-in defaults
//! - an optional `pathweave.toml` / `.yaml` / `.json` file
//! - environment variables (`SECRET_KEY`, `DEBUG`, `PORT`, ...)
//!
//! Command line flags are applied on top by the binary.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{Error, Result};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(ConfigFormat::Toml),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    /// Detect format from file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Protected path rules from the config file
#[derive(Debug, Deserialize, Default)]
pub struct AuthConfig {
    /// Path prefixes that require a logged in user
    #[serde(default)]
    pub protected_routes: Vec<String>,
    /// Regular expressions matched at the start of the path
    pub protected_patterns: Option<Vec<String>>,
}

/// Configuration file structure (pathweave.toml/yaml/json)
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    pub routes_dir: Option<String>,
    pub logs_dir: Option<String>,
    pub port: Option<u16>,
    pub viewer_port: Option<u16>,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl ConfigFile {
    /// Load config from file, automatically detecting format from extension
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            Error::ConfigError(format!(
                "Unsupported config file extension: {}. Expected .toml, .yaml, .yml, or .json",
                path.display()
            ))
        })?;

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, format)
    }

    /// Parse config content with specified format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let config = match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };
        Ok(config)
    }

    /// Anchor relative directories at `base`, the directory holding the file
    pub fn relative_to(mut self, base: &Path) -> Self {
        let anchor = |dir: Option<String>| {
            dir.map(|d| {
                if Path::new(&d).is_relative() && base != Path::new(".") {
                    base.join(&d).to_string_lossy().into_owned()
                } else {
                    d
                }
            })
        };
        self.routes_dir = anchor(self.routes_dir.take());
        self.logs_dir = anchor(self.logs_dir.take());
        self
    }

    /// Find a config file in a directory, if there is one
    pub fn find(dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        for name in CONFIG_FILES {
            let path = dir.join(name);
            if path.exists() {
                let config = Self::load(&path)?;
                return Ok(Some((config, path)));
            }
        }
        Ok(None)
    }
}

/// Fully resolved settings shared by the app and the viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Signs session cookies
    pub secret_key: String,
    /// Enables debug-level logging
    pub debug: bool,
    pub port: u16,
    pub viewer_port: u16,
    pub routes_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub protected_routes: Vec<String>,
    pub protected_patterns: Vec<String>,
    /// Session id inherited from a parent process
    pub session_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            debug: false,
            port: DEFAULT_PORT,
            viewer_port: DEFAULT_VIEWER_PORT,
            routes_dir: PathBuf::from(ROUTES_DIR),
            logs_dir: PathBuf::from(LOGS_DIR),
            protected_routes: Vec::new(),
            protected_patterns: DEFAULT_PROTECTED_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            session_id: None,
        }
    }
}

impl Settings {
    /// Resolve settings from the process environment and an optional config file in `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        let file = ConfigFile::find(dir)?.map(|(config, _)| config.relative_to(dir));
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Resolve settings from a config file and an environment lookup
    pub fn resolve<F>(file: Option<ConfigFile>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(file) = file {
            if let Some(dir) = file.routes_dir {
                settings.routes_dir = PathBuf::from(dir);
            }
            if let Some(dir) = file.logs_dir {
                settings.logs_dir = PathBuf::from(dir);
            }
            if let Some(port) = file.port {
                settings.port = port;
            }
            if let Some(port) = file.viewer_port {
                settings.viewer_port = port;
            }
            settings.protected_routes = file.auth.protected_routes;
            if let Some(patterns) = file.auth.protected_patterns {
                settings.protected_patterns = patterns;
            }
        }

        if let Some(secret) = env("SECRET_KEY") {
            settings.secret_key = secret;
        }
        if let Some(debug) = env("DEBUG") {
            settings.debug = debug.trim().eq_ignore_ascii_case("true");
        }
        if let Some(port) = env("PORT") {
            settings.port = parse_port("PORT", &port)?;
        }
        if let Some(port) = env("VIEWER_PORT") {
            settings.viewer_port = parse_port("VIEWER_PORT", &port)?;
        }
        if let Some(dir) = env("PATHWEAVE_ROUTES_DIR") {
            settings.routes_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env("PATHWEAVE_LOGS_DIR") {
            settings.logs_dir = PathBuf::from(dir);
        }
        settings.session_id = env(SESSION_ID_ENV).filter(|id| !id.trim().is_empty());

        Ok(settings)
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|e| Error::config(format!("{} must be a port number, got '{}': {}", key, value, e)))
}
