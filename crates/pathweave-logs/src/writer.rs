//! Session log sink
//!
//! Appends `<timestamp> - [<LEVEL>] - <message>` lines to
//! `<logs_dir>/<YYYY-MM-DD>_<session>.log`, rolling over to a new file when
//! the date changes. Lines can optionally be echoed to the console through
//! `tracing`; the quiet channel never echoes.

use chrono::{Local, NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use pathweave_core::{constants, LogLevel, Result};
use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Construction options for [`SessionLog`]
#[derive(Debug, Clone)]
pub struct SessionLogConfig {
    pub logs_dir: PathBuf,
    /// Reuse this session id instead of generating one
    pub session_id: Option<String>,
    /// Lines below this level are dropped
    pub min_level: LogLevel,
    /// Echo written lines to the console
    pub echo: bool,
}

impl SessionLogConfig {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
            session_id: None,
            min_level: LogLevel::Info,
            echo: true,
        }
    }
}

struct OpenFile {
    date: NaiveDate,
    path: PathBuf,
    writer: BufWriter<File>,
}

/// Append-only, date- and session-scoped log file
pub struct SessionLog {
    logs_dir: PathBuf,
    session_id: String,
    is_new_session: bool,
    min_level: LogLevel,
    echo: bool,
    file: Mutex<OpenFile>,
}

impl SessionLog {
    /// Open (or create) today's log file for the session
    pub fn new(config: SessionLogConfig) -> Result<Self> {
        let (session_id, is_new_session) = match config.session_id {
            Some(id) => (id, false),
            None => (generate_session_id(), true),
        };

        let today = Local::now().date_naive();
        let file = open_log(&config.logs_dir, today, &session_id)?;

        Ok(Self {
            logs_dir: config.logs_dir,
            session_id,
            is_new_session,
            min_level: config.min_level,
            echo: config.echo,
            file: Mutex::new(file),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// True when the session id was generated by this process
    pub fn is_new_session(&self) -> bool {
        self.is_new_session
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Path of the file currently written to
    pub fn path(&self) -> PathBuf {
        self.file.lock().path.clone()
    }

    pub fn debug(&self, message: impl Display) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Display) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: impl Display) {
        self.log(LogLevel::Warning, message);
    }

    /// Log an error as `Error: <err>`
    pub fn error(&self, error: impl Display) {
        self.log(LogLevel::Error, format!("Error: {}", error));
    }

    /// Log a served request
    pub fn request(&self, route: &str, method: &str, status: u16) {
        self.log(
            LogLevel::Info,
            format!("Route: {} | Method: {} | Status: {}", route, method, status),
        );
    }

    /// Write to the file only, never to the console
    pub fn quiet(&self, level: LogLevel, message: impl Display) {
        self.emit(level, &message.to_string(), false);
    }

    pub fn log(&self, level: LogLevel, message: impl Display) {
        self.emit(level, &message.to_string(), self.echo);
    }

    fn emit(&self, level: LogLevel, message: &str, echo: bool) {
        if level < self.min_level {
            return;
        }
        if let Err(e) = self.write_at(Local::now().naive_local(), level, message) {
            warn!("Failed to write session log: {}", e);
        }
        if echo {
            echo_line(level, message);
        }
    }

    pub(crate) fn write_at(&self, now: NaiveDateTime, level: LogLevel, message: &str) -> Result<()> {
        let mut file = self.file.lock();

        if now.date() != file.date {
            file.writer.flush()?;
            *file = open_log(&self.logs_dir, now.date(), &self.session_id)?;
        }

        let line = format!(
            "{}{}{}\n",
            now.format(constants::TIMESTAMP_FORMAT),
            level.marker(),
            message
        );
        file.writer.write_all(line.as_bytes())?;
        file.writer.flush()?;
        Ok(())
    }
}

fn open_log(logs_dir: &Path, date: NaiveDate, session_id: &str) -> Result<OpenFile> {
    fs::create_dir_all(logs_dir)?;
    let path = constants::session_log_path(logs_dir, date, session_id);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok(OpenFile {
        date,
        path,
        writer: BufWriter::new(file),
    })
}

fn generate_session_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

fn echo_line(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => tracing::debug!(target: "pathweave::session", "{}", message),
        LogLevel::Info | LogLevel::None => tracing::info!(target: "pathweave::session", "{}", message),
        LogLevel::Warning => tracing::warn!(target: "pathweave::session", "{}", message),
        LogLevel::Error => tracing::error!(target: "pathweave::session", "{}", message),
    }
}
