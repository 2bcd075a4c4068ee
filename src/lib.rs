//! Incremental Log Scanning Library
//!
//! This library tails growing text files across process restarts and log rotations,
//! classifies newly appended lines with match/ignore regexes, tracks per-file streak
//! history, and enriches matches with the country of any embedded IPv4 address.

pub mod cli;
pub mod io;
pub mod models;
pub mod services;

pub use models::{FileMeta, ScanResult, Severity, WatchedFileState};
pub use services::store::{MemoryStateStore, ParquetStateStore, SharedStore, StateStore};
pub use services::watcher::Watcher;
pub use services::watcher_set::WatcherSet;

use std::result;

/// Default cap for a single line when no explicit buffer size is configured.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Custom error type for the library
#[derive(Debug)]
pub enum Error {
    /// The watched file could not be stat'ed (missing, permission denied).
    FileStat {
        path: String,
        source: std::io::Error,
    },
    FileOpen {
        path: String,
        source: std::io::Error,
    },
    FileRead {
        path: String,
        source: std::io::Error,
    },
    InvalidPattern {
        pattern: String,
        message: String,
    },
    /// A line exceeded the configured maximum line buffer.
    LineTooLong {
        path: String,
        line: usize,
        limit: usize,
    },
    Persistence(String),
    InvalidAddress(String),
    InvalidInput(String),
    Io(std::io::Error),
    System(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::FileStat { path, source } => write!(f, "Cannot stat {path}: {source}"),
            Error::FileOpen { path, source } => write!(f, "Cannot open {path}: {source}"),
            Error::FileRead { path, source } => write!(f, "Cannot read {path}: {source}"),
            Error::InvalidPattern { pattern, message } => {
                write!(f, "Invalid pattern '{pattern}': {message}")
            }
            Error::LineTooLong { path, line, limit } => {
                write!(f, "Line {line} of {path} exceeds the {limit} byte buffer")
            }
            Error::Persistence(msg) => write!(f, "Persistence error: {msg}"),
            Error::InvalidAddress(ip) => write!(f, "Invalid IPv4 address: {ip}"),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::System(msg) => write!(f, "System error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::FileStat { source, .. }
            | Error::FileOpen { source, .. }
            | Error::FileRead { source, .. } => Some(source),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// What the anomaly counter does with a key whose count passes the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Remove the key entirely once its count exceeds the limit.
    #[default]
    EvictOnExceed,
    /// Saturate the count at the limit and keep the key.
    CapAndKeep,
}

impl EvictionPolicy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::EvictOnExceed => "evict",
            EvictionPolicy::CapAndKeep => "cap",
        }
    }
}

impl std::str::FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "evict" => Ok(EvictionPolicy::EvictOnExceed),
            "cap" | "keep" => Ok(EvictionPolicy::CapAndKeep),
            _ => Err(format!("unknown anomaly policy '{s}'")),
        }
    }
}

/// Options shared by every watcher of a process
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub match_pattern: String,
    pub ignore_pattern: String,
    pub anomaly: bool,
    pub anomaly_window_days: u32,
    pub anomaly_limit: usize,
    pub anomaly_policy: EvictionPolicy,
    /// Number of per-scan counts kept in the streak history.
    pub streak_width: usize,
    /// Maximum bytes per line; 0 selects [`DEFAULT_MAX_LINE_BYTES`].
    pub max_line_bytes: usize,
    /// Only consulted by collaborators deciding whether a file is recent.
    pub notify_interval_secs: u64,
    /// Number of files scanned concurrently by a [`WatcherSet`].
    pub parallelism: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            match_pattern: String::new(),
            ignore_pattern: String::new(),
            anomaly: false,
            anomaly_window_days: 7,
            anomaly_limit: 100,
            anomaly_policy: EvictionPolicy::EvictOnExceed,
            streak_width: 1,
            max_line_bytes: 0,
            notify_interval_secs: 0,
            parallelism: 1,
        }
    }
}

impl WatchConfig {
    #[must_use]
    pub fn effective_max_line_bytes(&self) -> usize {
        if self.max_line_bytes == 0 {
            DEFAULT_MAX_LINE_BYTES
        } else {
            self.max_line_bytes
        }
    }

    #[must_use]
    pub fn effective_streak_width(&self) -> usize {
        self.streak_width.max(1)
    }
}

/// Scan a single file once against the given store.
///
/// Convenience wrapper for callers that do not keep a [`Watcher`] around between scans:
/// the watcher is constructed (loading persisted offsets), scanned once and dropped.
pub fn scan_file(
    path: &str,
    config: &WatchConfig,
    store: SharedStore,
    geoip: Option<std::sync::Arc<services::geoip::GeoIpDatabase>>,
) -> Result<ScanResult> {
    let mut watcher = Watcher::new(path, config, store, geoip)?;
    watcher.scan()
}
