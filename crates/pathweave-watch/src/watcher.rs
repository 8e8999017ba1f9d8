//! Log directory watcher built on notify

use crossbeam_channel::{Receiver, RecvTimeoutError};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use pathweave_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Watch configuration
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// File name patterns to report (glob); empty reports everything
    pub include: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            include: vec![format!("*.{}", pathweave_core::LOG_EXTENSION)],
        }
    }
}

/// Watch event
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub paths: Vec<PathBuf>,
    pub kind: WatchEventKind,
    pub timestamp: Instant,
}

impl WatchEvent {
    /// File names of the affected paths
    pub fn file_names(&self) -> Vec<String> {
        self.paths
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Create,
    Modify,
    Remove,
    Other,
}

impl From<notify::EventKind> for WatchEventKind {
    fn from(kind: notify::EventKind) -> Self {
        match kind {
            notify::EventKind::Create(_) => WatchEventKind::Create,
            notify::EventKind::Modify(_) => WatchEventKind::Modify,
            notify::EventKind::Remove(_) => WatchEventKind::Remove,
            _ => WatchEventKind::Other,
        }
    }
}

/// Blocking file watcher; meant to be driven from a dedicated thread
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    include_patterns: Vec<glob::Pattern>,
    watched_paths: Vec<PathBuf>,
}

impl FileWatcher {
    /// Create a new file watcher
    pub fn new(config: WatchConfig) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Err(e) = tx.send(res) {
                warn!("Failed to send watch event: {}", e);
            }
        })
        .map_err(|e| Error::watch(format!("Failed to create watcher: {}", e)))?;

        let include_patterns = config
            .include
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pat) => Some(pat),
                Err(e) => {
                    warn!("Invalid include pattern '{}': {}", p, e);
                    None
                }
            })
            .collect();

        Ok(Self {
            watcher,
            rx,
            include_patterns,
            watched_paths: Vec::new(),
        })
    }

    /// Start watching a log directory; subdirectories are ignored
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        self.watcher
            .watch(&path, RecursiveMode::NonRecursive)
            .map_err(|e| Error::watch(format!("Failed to watch {}: {}", path.display(), e)))?;

        info!("Watching directory: {}", path.display());
        self.watched_paths.push(path);
        Ok(())
    }

    /// Wait up to `timeout` for the next event
    pub fn wait(&mut self, timeout: Duration) -> Option<WatchEvent> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(result) => {
                    if let Some(event) = self.accept(result) {
                        return Some(event);
                    }
                }
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Watch channel closed");
                    return None;
                }
            }
        }
    }

    fn accept(&self, result: notify::Result<Event>) -> Option<WatchEvent> {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                warn!("Watch error: {}", e);
                return None;
            }
        };

        let kind = WatchEventKind::from(event.kind);
        let paths: Vec<PathBuf> = event
            .paths
            .into_iter()
            .filter(|p| self.is_included(p))
            .collect();
        if paths.is_empty() {
            return None;
        }

        debug!("Watch event: {:?} on {:?}", kind, paths);
        Some(WatchEvent {
            paths,
            kind,
            timestamp: Instant::now(),
        })
    }

    /// Check the file name against the include patterns
    fn is_included(&self, path: &Path) -> bool {
        if self.include_patterns.is_empty() {
            return true;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.include_patterns.iter().any(|pattern| pattern.matches(name))
    }

    pub fn watched_paths(&self) -> &[PathBuf] {
        &self.watched_paths
    }
}
