//! Incremental scan engine for a single watched file
//!
//! A [`Watcher`] remembers how far into its file it has already classified content
//! (byte offset and line number, persisted in the shared state store) and on every
//! [`Watcher::scan`] reads only what was appended since. A file that shrank below the
//! recorded offset is treated as rotated and read again from the start.
//!
//! The first scan of a file with no persisted state only records the baseline offset:
//! nothing that existed before the watcher started is ever reported.

use crate::models::{FileMeta, ScanResult, Severity, WatchedFileState};
use crate::services::anomaly::{self, AnomalyCounter};
use crate::services::dates::extract_date;
use crate::services::geoip::{GeoIpDatabase, search_ip_addresses};
use crate::services::pattern::CompiledPattern;
use crate::services::store::{self, SharedStore, StateKind, StateValue, state_key};
use crate::{Error, Result, WatchConfig};
use std::collections::BTreeMap;
use std::fs::{File, Metadata};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::sync::Arc;

/// Characters of matched lines accumulated into `preview_line`.
pub const PREVIEW_CAP: usize = 500;

/// Distinct countries tracked per scan.
pub const COUNTRY_CAP: usize = 25;

/// Lifecycle of a watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherPhase {
    Uninitialized,
    Ready,
    Scanning,
    RotatedReset,
}

/// Per-scan accumulator
#[derive(Default)]
struct Tally {
    error_count: u64,
    first_line: Option<String>,
    last_line: String,
    preview: String,
    countries: BTreeMap<String, u64>,
}

pub struct Watcher {
    file_path: String,
    match_pattern: CompiledPattern,
    ignore_pattern: CompiledPattern,
    config: WatchConfig,
    store: SharedStore,
    geoip: Option<Arc<GeoIpDatabase>>,
    state: WatchedFileState,
    phase: WatcherPhase,
}

impl Watcher {
    /// Compile the configured patterns and load the persisted cursor for `file_path`.
    pub fn new(
        file_path: &str,
        config: &WatchConfig,
        store: SharedStore,
        geoip: Option<Arc<GeoIpDatabase>>,
    ) -> Result<Self> {
        let match_pattern = CompiledPattern::new(&config.match_pattern)?;
        let ignore_pattern = CompiledPattern::new(&config.ignore_pattern)?;

        let mut watcher = Self {
            file_path: file_path.to_string(),
            match_pattern,
            ignore_pattern,
            config: config.clone(),
            store,
            geoip,
            state: WatchedFileState::new(file_path),
            phase: WatcherPhase::Uninitialized,
        };

        watcher.state = watcher.load_state()?;
        watcher.phase = WatcherPhase::Ready;

        log::debug!(
            "Watching {} from line {} (offset {}, {} previous scans)",
            watcher.file_path,
            watcher.state.last_line_num,
            watcher.state.last_byte_offset,
            watcher.state.scan_count
        );

        Ok(watcher)
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.file_path
    }

    #[must_use]
    pub fn phase(&self) -> WatcherPhase {
        self.phase
    }

    /// Cursor as of the last successful scan.
    #[must_use]
    pub fn state(&self) -> &WatchedFileState {
        &self.state
    }

    /// Run one scan pass over content appended since the last successful pass.
    ///
    /// Nothing is persisted unless the whole pass succeeds, so a failed scan can simply be
    /// retried.
    pub fn scan(&mut self) -> Result<ScanResult> {
        self.phase = WatcherPhase::Scanning;
        let result = self.scan_pass();
        self.phase = WatcherPhase::Ready;
        result
    }

    fn load_state(&self) -> Result<WatchedFileState> {
        let store = store::lock(&self.store)?;
        let int = |kind| {
            store
                .get(&state_key(kind, &self.file_path))
                .and_then(|v| v.as_int())
                .unwrap_or(0)
        };

        let error_history = match store.get(&state_key(StateKind::Streak, &self.file_path)) {
            Some(StateValue::List(values)) => values,
            _ => Vec::new(),
        };

        Ok(WatchedFileState {
            file_path: self.file_path.clone(),
            last_line_num: int(StateKind::LineNum),
            last_byte_offset: int(StateKind::ByteOffset),
            scan_count: int(StateKind::ScanCount),
            error_history,
        })
    }

    fn scan_pass(&mut self) -> Result<ScanResult> {
        // The store is authoritative: another watcher may have reset it since our last pass.
        let state = self.load_state()?;

        let metadata = std::fs::metadata(&self.file_path).map_err(|source| Error::FileStat {
            path: self.file_path.clone(),
            source,
        })?;
        let current_size = metadata.len();

        let mut start_offset = state.last_byte_offset;
        let mut start_line = state.last_line_num;
        let rotated = current_size < start_offset;
        if rotated {
            log::warn!(
                "{} shrank from {start_offset} to {current_size} bytes; assuming rotation",
                self.file_path
            );
            self.phase = WatcherPhase::RotatedReset;
            start_offset = 0;
            start_line = 0;
        }

        let baseline = state.scan_count == 0;
        if baseline {
            log::info!("Baseline scan of {}; existing content is not reported", self.file_path);
        }

        let mut file = File::open(&self.file_path).map_err(|source| Error::FileOpen {
            path: self.file_path.clone(),
            source,
        })?;
        file.seek(SeekFrom::Start(start_offset))
            .map_err(|source| self.read_error(source))?;

        let mut counter = AnomalyCounter::new(self.config.anomaly_limit, self.config.anomaly_policy);
        let mut tally = Tally::default();
        let limit = self.config.effective_max_line_bytes();

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut offset = start_offset;
        let mut line_num = start_line;

        // Room for the longest accepted line plus its `\r\n` terminator.
        let read_cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(2);

        loop {
            buf.clear();
            let read = (&mut reader)
                .take(read_cap)
                .read_until(b'\n', &mut buf)
                .map_err(|source| self.read_error(source))?;
            if read == 0 {
                break;
            }

            offset += read as u64;
            line_num += 1;

            let mut line = buf.as_slice();
            if let Some(stripped) = line.strip_suffix(b"\n") {
                line = stripped;
            }
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            if line.len() > limit {
                return Err(Error::LineTooLong {
                    path: self.file_path.clone(),
                    line: usize::try_from(line_num).unwrap_or(usize::MAX),
                    limit,
                });
            }

            if !baseline {
                self.classify(line, &mut tally, &mut counter);
            }
        }

        let lines_read = line_num.abs_diff(start_line);
        let error_percent = error_percent(tally.error_count, lines_read);

        let scan_count = state.scan_count + 1;
        let mut error_history = state.error_history;
        if !baseline {
            error_history.push(tally.error_count);
            let width = self.config.effective_streak_width();
            if error_history.len() > width {
                error_history.drain(..error_history.len() - width);
            }
        }

        let next = WatchedFileState {
            file_path: self.file_path.clone(),
            last_line_num: line_num,
            last_byte_offset: offset,
            scan_count,
            error_history,
        };
        let now = chrono::Local::now().naive_local();
        let record_anomalies = self.config.anomaly && !baseline;
        let anomaly_history = if record_anomalies {
            self.anomaly_history(&counter, now)?
        } else {
            BTreeMap::new()
        };
        self.persist(&next, record_anomalies.then_some(&counter), now)?;

        let first_line = tally.first_line.unwrap_or_default();
        let result = ScanResult {
            file_path: self.file_path.clone(),
            file: file_meta(&metadata),
            error_count: tally.error_count,
            error_percent,
            lines_read,
            first_date: extract_date(&first_line).unwrap_or_default(),
            first_line,
            preview_line: tally.preview,
            last_date: extract_date(&tally.last_line).unwrap_or_default(),
            last_line: tally.last_line,
            severity: Severity::from_percent(error_percent),
            streak: next.error_history.clone(),
            scan_count,
            country_counts: tally.countries,
            anomalies: if self.config.anomaly {
                counter.snapshot()
            } else {
                BTreeMap::new()
            },
            anomaly_history,
            baseline,
            rotated,
        };

        log::debug!(
            "Scanned {}: {} lines, {} matches ({:.2}%)",
            self.file_path,
            lines_read,
            result.error_count,
            error_percent
        );

        self.state = next;
        Ok(result)
    }

    fn classify(&self, line: &[u8], tally: &mut Tally, counter: &mut AnomalyCounter) {
        if self.ignore_pattern.is_match(line) {
            return;
        }

        if self.config.anomaly {
            if let Some(found) = self.match_pattern.find(line) {
                counter.count(&String::from_utf8_lossy(found));
            }
            return;
        }

        if !self.match_pattern.is_match(line) {
            return;
        }

        let text = String::from_utf8_lossy(line).into_owned();
        tally.error_count += 1;

        let preview_len = tally.preview.chars().count();
        if preview_len < PREVIEW_CAP {
            if !tally.preview.is_empty() {
                tally.preview.push('\n');
            }
            tally
                .preview
                .extend(text.chars().take(PREVIEW_CAP.saturating_sub(preview_len + 1)));
        }

        if let Some(geoip) = &self.geoip {
            let ips = search_ip_addresses(&text);
            if !ips.is_empty() {
                for (name, count) in geoip.count_by_country(&ips) {
                    if tally.countries.contains_key(&name) || tally.countries.len() < COUNTRY_CAP {
                        *tally.countries.entry(name).or_insert(0) += count;
                    }
                }
            }
        }

        if tally.first_line.is_none() {
            tally.first_line = Some(text.clone());
        }
        tally.last_line = text;
    }

    /// Earlier same-minute counts for the keys in `counter`. Unreadable history is left
    /// for [`Self::persist`] to discover and reset.
    fn anomaly_history(
        &self,
        counter: &AnomalyCounter,
        now: chrono::NaiveDateTime,
    ) -> Result<BTreeMap<String, Vec<u64>>> {
        let store = store::lock(&self.store)?;
        let mut history = match anomaly::history_at(&*store, &self.file_path, now) {
            Ok(history) => history,
            Err(err) => {
                log::warn!("{err}");
                return Ok(BTreeMap::new());
            }
        };
        history.retain(|matched, _| counter.get(matched).is_some());
        Ok(history)
    }

    /// Stage and commit the new cursor. If the commit fails the store is reset and the
    /// original failure returned.
    fn persist(
        &self,
        next: &WatchedFileState,
        anomalies: Option<&AnomalyCounter>,
        now: chrono::NaiveDateTime,
    ) -> Result<()> {
        let mut store = store::lock(&self.store)?;
        let path = &self.file_path;

        let staged = (|| -> Result<()> {
            store.put(
                &state_key(StateKind::LineNum, path),
                StateValue::Int(next.last_line_num),
            );
            store.put(
                &state_key(StateKind::ByteOffset, path),
                StateValue::Int(next.last_byte_offset),
            );
            store.put(
                &state_key(StateKind::ScanCount, path),
                StateValue::Int(next.scan_count),
            );
            store.put(
                &state_key(StateKind::Streak, path),
                StateValue::List(next.error_history.clone()),
            );
            if let Some(counter) = anomalies {
                anomaly::save_history(
                    &mut *store,
                    path,
                    counter,
                    now,
                    self.config.anomaly_window_days,
                )?;
            }
            store
                .commit()
                .map_err(|e| Error::Persistence(format!("cannot save state for {path}: {e}")))
        })();

        if let Err(err) = staged {
            log::warn!("{err}; resetting state store");
            if let Err(reset_err) = store.reset() {
                log::warn!("State store reset failed: {reset_err}");
            }
            return Err(err);
        }
        Ok(())
    }

    fn read_error(&self, source: std::io::Error) -> Error {
        Error::FileRead {
            path: self.file_path.clone(),
            source,
        }
    }
}

/// `min(100, round2(errors * 100 / lines))`, or 0 when nothing was read.
#[must_use]
pub fn error_percent(error_count: u64, lines_read: u64) -> f64 {
    if lines_read == 0 {
        return 0.0;
    }
    let percent = error_count as f64 * 100.0 / lines_read as f64;
    ((percent * 100.0).round() / 100.0).min(100.0)
}

fn file_meta(metadata: &Metadata) -> FileMeta {
    FileMeta {
        size_bytes: metadata.len(),
        modified_at: metadata
            .modified()
            .ok()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339()),
    }
}
