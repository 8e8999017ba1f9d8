//! Pathweave Watch - Filesystem watcher for log tailing

mod watcher;

pub use watcher::{FileWatcher, WatchConfig, WatchEvent, WatchEventKind};
