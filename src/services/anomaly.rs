//! Bounded frequency table for anomaly mode, plus its persisted per-minute history.

use crate::models::AnomalyRecord;
use crate::services::store::{StateKind, StateStore, StateValue, state_key};
use crate::{EvictionPolicy, Error, Result};
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;

/// Matched substrings longer than this are truncated before counting.
pub const MAX_KEY_CHARS: usize = 100;

/// Default per-key count limit.
pub const DEFAULT_LIMIT: usize = 100;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

/// Frequency table keyed by (truncated) matched substring.
///
/// With [`EvictionPolicy::EvictOnExceed`] a key is removed as soon as its count passes
/// the limit, so a key counted once more afterwards starts again at 1. With
/// [`EvictionPolicy::CapAndKeep`] the count saturates at the limit.
#[derive(Debug, Clone)]
pub struct AnomalyCounter {
    counts: BTreeMap<String, u64>,
    limit: u64,
    policy: EvictionPolicy,
}

impl Default for AnomalyCounter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, EvictionPolicy::default())
    }
}

impl AnomalyCounter {
    #[must_use]
    pub fn new(limit: usize, policy: EvictionPolicy) -> Self {
        Self {
            counts: BTreeMap::new(),
            limit: limit as u64,
            policy,
        }
    }

    pub fn count(&mut self, key: &str) {
        let key = truncate_key(key);
        let value = self.counts.entry(key.to_string()).or_insert(0);
        *value += 1;

        if *value > self.limit {
            match self.policy {
                EvictionPolicy::EvictOnExceed => {
                    log::trace!("Evicting anomaly key over limit: {key}");
                    self.counts.remove(key);
                }
                EvictionPolicy::CapAndKeep => *value = self.limit,
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<u64> {
        self.counts.get(truncate_key(key)).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts.clone()
    }
}

fn truncate_key(key: &str) -> &str {
    match key.char_indices().nth(MAX_KEY_CHARS) {
        Some((idx, _)) => &key[..idx],
        None => key,
    }
}

fn load_history(store: &dyn StateStore, file_path: &str) -> Result<Vec<AnomalyRecord>> {
    match store.get(&state_key(StateKind::Anomalies, file_path)) {
        Some(StateValue::Text(raw)) => serde_json::from_str(&raw)
            .map_err(|e| Error::Persistence(format!("bad anomaly history for {file_path}: {e}"))),
        _ => Ok(Vec::new()),
    }
}

/// Append the counter snapshot to the history of `file_path`, dropping records older
/// than `window_days`. The store is staged only; committing is up to the caller.
pub fn save_history(
    store: &mut dyn StateStore,
    file_path: &str,
    counter: &AnomalyCounter,
    now: NaiveDateTime,
    window_days: u32,
) -> Result<()> {
    let cutoff = (now - Duration::days(i64::from(window_days)))
        .format(DATE_FORMAT)
        .to_string();

    let mut records = load_history(store, file_path)?;
    // Dates are zero padded, so string order is date order.
    records.retain(|r| r.date >= cutoff);

    let date = now.format(DATE_FORMAT).to_string();
    let time = now.format(TIME_FORMAT).to_string();
    records.extend(counter.counts.iter().map(|(matched, value)| AnomalyRecord {
        matched: matched.clone(),
        value: *value,
        date: date.clone(),
        time: time.clone(),
    }));

    let raw = serde_json::to_string(&records)
        .map_err(|e| Error::Persistence(format!("cannot encode anomaly history: {e}")))?;
    store.put(&state_key(StateKind::Anomalies, file_path), StateValue::Text(raw));
    Ok(())
}

/// Values recorded for each match at the same wall-clock minute as `now` on previous
/// days, oldest first.
pub fn history_at(
    store: &dyn StateStore,
    file_path: &str,
    now: NaiveDateTime,
) -> Result<BTreeMap<String, Vec<u64>>> {
    let today = now.format(DATE_FORMAT).to_string();
    let time = now.format(TIME_FORMAT).to_string();

    let mut history: BTreeMap<String, Vec<u64>> = BTreeMap::new();
    for record in load_history(store, file_path)? {
        if record.time == time && record.date < today {
            history.entry(record.matched).or_default().push(record.value);
        }
    }
    Ok(history)
}
