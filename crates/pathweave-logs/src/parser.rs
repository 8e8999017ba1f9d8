//! Parsing of `<timestamp> - [<LEVEL>] - <message>` log lines

use pathweave_core::{LogEntry, LogLevel};

/// Number of leading characters kept as the candidate timestamp
const TIMESTAMP_LEN: usize = 19;

/// Parse a single log line.
///
/// The timestamp is taken opportunistically from the first 19 characters
/// without validation. The level is the first marker found, checked in
/// `INFO`, `ERROR`, `WARNING`, `DEBUG` order; lines without a marker get
/// level `none` and keep the whole line as the message.
pub fn parse_line(line: &str, file: &str) -> LogEntry {
    let timestamp = if line.chars().count() >= TIMESTAMP_LEN {
        Some(line.chars().take(TIMESTAMP_LEN).collect())
    } else {
        None
    };

    let (level, message) = LogLevel::DETECTION_ORDER
        .iter()
        .find_map(|level| {
            line.split_once(level.marker().as_str())
                .map(|(_, message)| (*level, message.to_string()))
        })
        .unwrap_or_else(|| (LogLevel::None, line.to_string()));

    LogEntry {
        raw: line.to_string(),
        file: file.to_string(),
        timestamp,
        level,
        message,
    }
}

/// Parse every non-blank line of a chunk of log content
pub fn parse_content(content: &str, file: &str) -> Vec<LogEntry> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_line(line, file))
        .collect()
}
