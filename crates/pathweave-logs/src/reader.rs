//! Log reading for the viewer: offset tracking, listing and search

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use pathweave_core::{
    constants, validate_file_name, Error, LogEntry, LogFileInfo, LogLevel, Result, SearchHit,
};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, error, warn};

use crate::parser::parse_content;

/// Tracks how far each log file in a directory has been delivered.
///
/// Offsets are keyed by file name; the directory is flat. A file with no
/// offset is untracked and is read from the start on its first poll.
pub struct LogTailer {
    logs_dir: PathBuf,
    offsets: Mutex<HashMap<String, u64>>,
}

impl LogTailer {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
            offsets: Mutex::new(HashMap::new()),
        }
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Last delivered byte offset of a file, if it is tracked
    pub fn offset(&self, name: &str) -> Option<u64> {
        self.offsets.lock().get(name).copied()
    }

    /// Names of all tracked files
    pub fn tracked(&self) -> Vec<String> {
        let mut names: Vec<String> = self.offsets.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Read complete lines appended since the last poll and advance the offset.
    ///
    /// A trailing line without a newline is left for the next poll. If the
    /// file shrank, reading restarts from the beginning.
    pub fn poll(&self, name: &str) -> Result<Vec<LogEntry>> {
        let path = self.logs_dir.join(name);
        let mut offsets = self.offsets.lock();
        let mut offset = offsets.get(name).copied().unwrap_or(0);

        let mut file = File::open(&path)?;
        let len = file.metadata()?.len();
        if len < offset {
            debug!("{} was truncated, rereading from start", name);
            offset = 0;
        }
        if len == offset {
            offsets.insert(name.to_string(), offset);
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = Vec::with_capacity((len - offset) as usize);
        file.read_to_end(&mut buffer)?;

        let Some(last_newline) = buffer.iter().rposition(|b| *b == b'\n') else {
            offsets.insert(name.to_string(), offset);
            return Ok(Vec::new());
        };

        let complete = &buffer[..=last_newline];
        offsets.insert(name.to_string(), offset + complete.len() as u64);
        drop(offsets);

        Ok(parse_content(&String::from_utf8_lossy(complete), name))
    }

    /// Poll every tracked file, returning the files that produced entries
    pub fn poll_tracked(&self) -> Vec<(String, Vec<LogEntry>)> {
        self.tracked()
            .into_iter()
            .filter_map(|name| match self.poll(&name) {
                Ok(entries) if !entries.is_empty() => Some((name, entries)),
                Ok(_) => None,
                Err(e) => {
                    debug!("Skipping {}: {}", name, e);
                    None
                }
            })
            .collect()
    }

    /// Entries for a newly connected client.
    ///
    /// With the name of an existing file, that file is read in full;
    /// otherwise every log file is read, most recently modified first. Each file read is marked
    /// as caught up so the watcher does not deliver the same lines again.
    /// Unreadable files produce a synthetic error entry.
    pub fn initial_entries(&self, file: Option<&str>) -> Vec<LogEntry> {
        let requested = file.and_then(|name| match resolve_log_file(&self.logs_dir, name) {
            Ok(_) => Some(name.to_string()),
            Err(e) => {
                debug!("Cannot load {} ({}), loading all files instead", name, e);
                None
            }
        });
        let names = match requested {
            Some(name) => vec![name],
            None => match log_files_by_mtime(&self.logs_dir) {
                Ok(files) => files.into_iter().map(|(name, _)| name).collect(),
                Err(e) => {
                    error!("Error listing log directory {}: {}", self.logs_dir.display(), e);
                    Vec::new()
                }
            },
        };

        let mut entries = Vec::new();
        for name in names {
            match self.read_whole(&name) {
                Ok(mut file_entries) => entries.append(&mut file_entries),
                Err(e) => {
                    error!("Error reading log file {}: {}", name, e);
                    entries.push(read_error_entry(&name, &e));
                }
            }
        }
        entries
    }

    /// Parse the complete lines of a file; a trailing partial line is left for `poll`
    fn read_whole(&self, name: &str) -> Result<Vec<LogEntry>> {
        let bytes = fs::read(self.logs_dir.join(name))?;
        let complete = match bytes.iter().rposition(|b| *b == b'\n') {
            Some(last_newline) => &bytes[..=last_newline],
            None => &bytes[..0],
        };
        self.offsets
            .lock()
            .entry(name.to_string())
            .or_insert(complete.len() as u64);
        Ok(parse_content(&String::from_utf8_lossy(complete), name))
    }
}

fn read_error_entry(name: &str, err: &Error) -> LogEntry {
    let message = format!("Error reading log file {}: {}", name, err);
    LogEntry {
        raw: message.clone(),
        file: name.to_string(),
        timestamp: Some(Local::now().format(constants::TIMESTAMP_FORMAT).to_string()),
        level: LogLevel::Error,
        message,
    }
}

fn is_log_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == constants::LOG_EXTENSION)
            .unwrap_or(false)
}

/// `*.log` files in a directory with their modification times, newest first
fn log_files_by_mtime(dir: &Path) -> Result<Vec<(String, SystemTime)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !is_log_file(&path) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let modified = fs::metadata(&path)?.modified()?;
        files.push((name.to_string(), modified));
    }
    files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(files)
}

/// Resolve a client-supplied log file name to an existing file in `dir`
pub fn resolve_log_file(dir: &Path, name: &str) -> Result<PathBuf> {
    if !validate_file_name(name) {
        return Err(Error::InvalidFileName(name.to_string()));
    }
    let path = dir.join(name);
    if !path.is_file() {
        return Err(Error::FileNotFound(path));
    }
    Ok(path)
}

/// List log files with size and modification time, newest first
pub fn list_log_files(dir: &Path) -> Result<Vec<LogFileInfo>> {
    log_files_by_mtime(dir)?
        .into_iter()
        .map(|(name, modified)| {
            let size = fs::metadata(dir.join(&name))?.len();
            let modified: DateTime<Local> = modified.into();
            Ok(LogFileInfo {
                name,
                size,
                modified: modified.format(constants::TIMESTAMP_FORMAT).to_string(),
            })
        })
        .collect()
}

/// Case-insensitive substring search over every line of the log files.
///
/// Searches one file when `file` is given, otherwise all of them. Files that
/// cannot be read are logged and skipped.
pub fn search(dir: &Path, query: &str, file: Option<&str>) -> Result<Vec<SearchHit>> {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return Ok(Vec::new());
    }

    let names: Vec<String> = match file {
        Some(name) if validate_file_name(name) => vec![name.to_string()],
        Some(name) => {
            warn!("Refusing to search invalid file name {}", name);
            Vec::new()
        }
        None => {
            let mut names: Vec<String> = log_files_by_mtime(dir)?
                .into_iter()
                .map(|(name, _)| name)
                .collect();
            names.sort();
            names
        }
    };

    let mut hits = Vec::new();
    for name in names {
        let path = dir.join(&name);
        if !path.is_file() {
            continue;
        }
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Error searching log file {}: {}", path.display(), e);
                continue;
            }
        };
        let content = String::from_utf8_lossy(&bytes);
        for (index, line) in content.lines().enumerate() {
            if line.to_lowercase().contains(&needle) {
                hits.push(SearchHit {
                    file: name.clone(),
                    line: index + 1,
                    content: line.trim().to_string(),
                });
            }
        }
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;

    fn append(dir: &Path, name: &str, text: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(name))
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn test_poll_untracked_reads_from_start() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), "a.log", "2024-01-01 00:00:00 - [INFO] - one\n");

        let tailer = LogTailer::new(dir.path());
        let entries = tailer.poll("a.log").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "one");
        assert_eq!(tailer.offset("a.log"), Some(35));
    }

    #[test]
    fn test_poll_delivers_only_new_lines() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), "a.log", "2024-01-01 00:00:00 - [INFO] - one\n");
        let tailer = LogTailer::new(dir.path());
        tailer.poll("a.log").unwrap();

        append(dir.path(), "a.log", "2024-01-01 00:00:01 - [ERROR] - two\n");
        let entries = tailer.poll("a.log").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "two");
        assert_eq!(entries[0].level, LogLevel::Error);
    }

    #[test]
    fn test_poll_unchanged_file_is_empty() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), "a.log", "2024-01-01 00:00:00 - [INFO] - one\n");
        let tailer = LogTailer::new(dir.path());
        tailer.poll("a.log").unwrap();

        assert!(tailer.poll("a.log").unwrap().is_empty());
        assert!(tailer.poll("a.log").unwrap().is_empty());
    }

    #[test]
    fn test_poll_holds_back_partial_line() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), "a.log", "complete line\npartial");
        let tailer = LogTailer::new(dir.path());

        let entries = tailer.poll("a.log").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].raw, "complete line");

        append(dir.path(), "a.log", " now done\n");
        let entries = tailer.poll("a.log").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].raw, "partial now done");
    }

    #[test]
    fn test_initial_entries_hold_back_partial_line() {
        let dir = TempDir::new().unwrap();
        append(
            dir.path(),
            "a.log",
            "2024-01-01 00:00:00 - [INFO] - one\n2024-01-01 00:00:01 - [INFO] - par",
        );
        let tailer = LogTailer::new(dir.path());

        let entries = tailer.initial_entries(Some("a.log"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "one");
        assert_eq!(tailer.offset("a.log"), Some(35));

        append(dir.path(), "a.log", "tial done\n");
        let entries = tailer.poll("a.log").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].raw, "2024-01-01 00:00:01 - [INFO] - partial done");
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[0].message, "partial done");
    }

    #[test]
    fn test_initial_entries_without_newline() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), "a.log", "no newline yet");
        let tailer = LogTailer::new(dir.path());

        assert!(tailer.initial_entries(Some("a.log")).is_empty());
        assert_eq!(tailer.offset("a.log"), Some(0));

        append(dir.path(), "a.log", "\n");
        let entries = tailer.poll("a.log").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].raw, "no newline yet");
    }

    #[test]
    fn test_poll_after_truncation() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), "a.log", "first line that is long\n");
        let tailer = LogTailer::new(dir.path());
        tailer.poll("a.log").unwrap();

        fs::write(dir.path().join("a.log"), "fresh\n").unwrap();
        let entries = tailer.poll("a.log").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].raw, "fresh");
    }

    #[test]
    fn test_poll_missing_file_errors() {
        let dir = TempDir::new().unwrap();
        let tailer = LogTailer::new(dir.path());
        assert!(tailer.poll("gone.log").is_err());
    }

    #[test]
    fn test_initial_entries_marks_caught_up() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), "a.log", "2024-01-01 00:00:00 - [INFO] - one\n");
        let tailer = LogTailer::new(dir.path());

        let entries = tailer.initial_entries(Some("a.log"));
        assert_eq!(entries.len(), 1);
        assert!(tailer.poll("a.log").unwrap().is_empty());
    }

    #[test]
    fn test_initial_entries_all_files_newest_first() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), "old.log", "old line\n");
        std::thread::sleep(std::time::Duration::from_millis(20));
        append(dir.path(), "new.log", "new line\n");
        append(dir.path(), "notes.txt", "not a log\n");

        let tailer = LogTailer::new(dir.path());
        let entries = tailer.initial_entries(None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file, "new.log");
        assert_eq!(entries[1].file, "old.log");
        assert_eq!(tailer.tracked(), vec!["new.log".to_string(), "old.log".to_string()]);
    }

    #[test]
    fn test_initial_entries_keeps_existing_offset() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), "a.log", "one\n");
        let tailer = LogTailer::new(dir.path());
        tailer.poll("a.log").unwrap();
        append(dir.path(), "a.log", "two\n");

        tailer.initial_entries(Some("a.log"));
        let entries = tailer.poll("a.log").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].raw, "two");
    }

    #[test]
    fn test_initial_entries_unknown_file_loads_all() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), "a.log", "2024-01-01 00:00:00 - [INFO] - one\n");
        let tailer = LogTailer::new(dir.path());

        let entries = tailer.initial_entries(Some("nope.log"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file, "a.log");

        let entries = tailer.initial_entries(Some("../etc/passwd"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file, "a.log");
    }

    #[test]
    fn test_initial_entries_empty_dir() {
        let dir = TempDir::new().unwrap();
        let tailer = LogTailer::new(dir.path());
        assert!(tailer.initial_entries(Some("missing.log")).is_empty());
        assert!(tailer.initial_entries(None).is_empty());
    }

    #[test]
    fn test_read_error_entry() {
        let err = Error::IoError(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"));
        let entry = read_error_entry("a.log", &err);
        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.file, "a.log");
        assert!(entry.message.starts_with("Error reading log file a.log:"));
        assert_eq!(entry.timestamp.as_ref().map(|t| t.len()), Some(19));
    }

    #[test]
    fn test_list_log_files() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), "a.log", "12345\n");
        std::thread::sleep(std::time::Duration::from_millis(20));
        append(dir.path(), "b.log", "1\n");
        append(dir.path(), "c.txt", "ignored\n");

        let files = list_log_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "b.log");
        assert_eq!(files[1].name, "a.log");
        assert_eq!(files[1].size, 6);
        assert_eq!(files[0].modified.len(), 19);
    }

    #[test]
    fn test_list_missing_dir() {
        let files = list_log_files(Path::new("/nonexistent/pathweave-logs")).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_search_line_numbers() {
        let dir = TempDir::new().unwrap();
        append(
            dir.path(),
            "a.log",
            "2024-01-01 00:00:00 - [INFO] - start\nnothing here\n  2024-01-01 00:00:02 - [ERROR] - BOOM  \n",
        );

        let hits = search(dir.path(), "boom", None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].line, 3);
        assert_eq!(hits[0].file, "a.log");
        assert_eq!(hits[0].content, "2024-01-01 00:00:02 - [ERROR] - BOOM");
    }

    #[test]
    fn test_search_single_file() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), "a.log", "boom\n");
        append(dir.path(), "b.log", "boom\n");

        let hits = search(dir.path(), "Boom", Some("b.log")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file, "b.log");
        assert!(search(dir.path(), "boom", Some("missing.log")).unwrap().is_empty());
    }

    #[test]
    fn test_search_empty_query() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), "a.log", "boom\n");
        assert!(search(dir.path(), "", None).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_log_file() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), "a.log", "x\n");

        assert!(resolve_log_file(dir.path(), "a.log").is_ok());
        assert!(matches!(
            resolve_log_file(dir.path(), "../a.log"),
            Err(Error::InvalidFileName(_))
        ));
        assert!(matches!(
            resolve_log_file(dir.path(), "b.log"),
            Err(Error::FileNotFound(_))
        ));
    }
}
