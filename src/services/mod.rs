//! Core services for pattern compilation, enrichment, state and scanning

pub mod anomaly;
pub mod dates;
pub mod discover;
pub mod geoip;
pub mod pattern;
pub mod store;
pub mod watcher;
pub mod watcher_set;
