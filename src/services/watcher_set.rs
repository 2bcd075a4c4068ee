//! The set of watched files of a process and the driver for one scan cycle.

use crate::models::{ScanResult, WatchedFileState};
use crate::services::geoip::GeoIpDatabase;
use crate::services::store::{self, SharedStore};
use crate::services::watcher::Watcher;
use crate::{Error, Result, WatchConfig};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Paths added and removed by [`WatcherSet::sync_paths`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Owns one [`Watcher`] per path, all sharing a state store and GeoIP table.
///
/// Every cycle holds the set's lock for its whole duration, so a file is never scanned
/// twice concurrently and path syncs never interleave with a cycle. Within a cycle up
/// to `parallelism` different files are scanned at once.
pub struct WatcherSet {
    config: WatchConfig,
    store: SharedStore,
    geoip: Option<Arc<GeoIpDatabase>>,
    watchers: Mutex<BTreeMap<String, Watcher>>,
    pool: Option<rayon::ThreadPool>,
}

impl WatcherSet {
    pub fn new(
        config: WatchConfig,
        store: SharedStore,
        geoip: Option<Arc<GeoIpDatabase>>,
    ) -> Result<Self> {
        let pool = if config.parallelism > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.parallelism)
                .thread_name(|i| format!("logscan-scan-{i}"))
                .build()
                .map_err(|e| Error::System(format!("cannot start scan threads: {e}")))?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            config,
            store,
            geoip,
            watchers: Mutex::new(BTreeMap::new()),
            pool,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Watcher>>> {
        self.watchers
            .lock()
            .map_err(|_| Error::System("watcher set lock poisoned".to_string()))
    }

    /// Make the watched set equal to `paths`.
    ///
    /// New paths get a watcher (loading any persisted cursor); paths no longer present
    /// are dropped and their persisted keys removed.
    pub fn sync_paths<S: AsRef<str>>(&self, paths: &[S]) -> Result<SyncReport> {
        let mut watchers = self.lock()?;
        let wanted: BTreeSet<&str> = paths.iter().map(AsRef::as_ref).collect();
        let mut report = SyncReport::default();

        let stale: Vec<String> = watchers
            .keys()
            .filter(|p| !wanted.contains(p.as_str()))
            .cloned()
            .collect();
        if !stale.is_empty() {
            let mut store = store::lock(&self.store)?;
            for path in stale {
                watchers.remove(&path);
                store.forget_file(&path);
                log::info!("Stopped watching {path}");
                report.removed.push(path);
            }
            store.commit().map_err(|e| {
                Error::Persistence(format!("cannot save state after removing files: {e}"))
            })?;
        }

        for path in &wanted {
            if watchers.contains_key(*path) {
                continue;
            }
            let watcher = Watcher::new(path, &self.config, self.store.clone(), self.geoip.clone())?;
            watchers.insert((*path).to_string(), watcher);
            log::info!("Watching {path}");
            report.added.push((*path).to_string());
        }

        Ok(report)
    }

    /// Scan every watched file once, returning results in path order.
    pub fn scan_all(&self) -> Result<Vec<(String, Result<ScanResult>)>> {
        let mut guard = self.lock()?;
        let watchers: &mut BTreeMap<String, Watcher> = &mut guard;

        let results: Vec<(String, Result<ScanResult>)> = match &self.pool {
            Some(pool) => pool.install(|| {
                watchers
                    .par_iter_mut()
                    .map(|(path, watcher)| (path.clone(), watcher.scan()))
                    .collect()
            }),
            None => watchers
                .iter_mut()
                .map(|(path, watcher)| (path.clone(), watcher.scan()))
                .collect(),
        };

        Ok(results)
    }

    pub fn paths(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    pub fn state(&self, path: &str) -> Result<Option<WatchedFileState>> {
        Ok(self.lock()?.get(path).map(|w| w.state().clone()))
    }
}
