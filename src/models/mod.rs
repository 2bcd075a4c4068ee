//! Data models for scan results, per-file cursors and enrichment records

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Alert severity derived from the error percentage of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Critical,
}

impl Severity {
    /// Percentage at and above which a scan is reported as critical.
    pub const CRITICAL_PERCENT: f64 = 50.0;

    #[must_use]
    pub fn from_percent(percent: f64) -> Self {
        if percent >= Self::CRITICAL_PERCENT {
            Severity::Critical
        } else {
            Severity::Error
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File metadata captured at the start of a scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub size_bytes: u64,
    pub modified_at: Option<String>, // RFC3339 format
}

/// Outcome of one scan pass over a watched file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResult {
    pub file_path: String,
    pub file: FileMeta,
    pub error_count: u64,
    pub error_percent: f64,
    pub lines_read: u64,
    pub first_line: String,
    pub first_date: String,
    pub preview_line: String,
    pub last_line: String,
    pub last_date: String,
    pub severity: Severity,
    pub streak: Vec<u64>,
    pub scan_count: u64,
    pub country_counts: BTreeMap<String, u64>,
    /// Matched substring -> count, only populated in anomaly mode.
    pub anomalies: BTreeMap<String, u64>,
    /// Counts seen for each current anomaly at this minute on previous days.
    pub anomaly_history: BTreeMap<String, Vec<u64>>,
    /// True when this pass only established the baseline offset.
    pub baseline: bool,
    pub rotated: bool,
}

/// Per-file scan cursor persisted in the state store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedFileState {
    pub file_path: String,
    pub last_line_num: u64,
    pub last_byte_offset: u64,
    pub scan_count: u64,
    /// Most recent count last.
    pub error_history: Vec<u64>,
}

impl WatchedFileState {
    #[must_use]
    pub fn new(file_path: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
            ..Self::default()
        }
    }
}

/// Result of resolving a single address against the GeoIP table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpLookupResult {
    pub ip: String,
    pub country_code: String,
    pub country_name: String,
    pub error: Option<String>,
}

/// One persisted anomaly count, keyed by the minute it was recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    #[serde(rename = "match")]
    pub matched: String,
    pub value: u64,
    pub date: String, // YYYY-MM-DD
    pub time: String, // HH:MM
}
