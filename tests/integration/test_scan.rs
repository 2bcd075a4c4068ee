//! Integration tests for incremental scanning across cycles and restarts

use crate::fixtures::{append_log, config, memory_store, write_log};
use logscan::services::geoip::GeoIpDatabase;
use logscan::services::store::shared;
use logscan::{ParquetStateStore, Severity, Watcher};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_end_to_end_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_log(temp_dir.path(), "app.log", "");
    let mut watcher = Watcher::new(&path, &config("error:1", "ignore"), memory_store(), None).unwrap();

    let baseline = watcher.scan().unwrap();
    assert!(baseline.baseline);

    append_log(&path, "line1\nerror:1\nerror:2\nline2\nerror:1\n");
    let result = watcher.scan().unwrap();

    assert_eq!(result.error_count, 2);
    assert_eq!(result.first_line, "error:1");
    assert_eq!(result.last_line, "error:1");
    assert_eq!(result.streak, vec![2]);
    assert_eq!(result.scan_count, 2);
}

#[test]
fn test_baseline_ignores_preexisting_matches() {
    let temp_dir = TempDir::new().unwrap();
    let content = "error\n".repeat(1000);
    let path = write_log(temp_dir.path(), "app.log", &content);
    let mut watcher = Watcher::new(&path, &config("error", ""), memory_store(), None).unwrap();

    let first = watcher.scan().unwrap();
    assert_eq!(first.error_count, 0);
    assert_eq!(first.lines_read, 1000);
    assert_eq!(first.error_percent, 0.0);

    let second = watcher.scan().unwrap();
    assert_eq!(second.error_count, 0);
    assert_eq!(second.lines_read, 0);
}

#[test]
fn test_idempotent_resume_with_no_new_content() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_log(temp_dir.path(), "app.log", "seed\n");
    let mut watcher = Watcher::new(&path, &config("error", ""), memory_store(), None).unwrap();
    watcher.scan().unwrap();
    append_log(&path, "error one\n");
    watcher.scan().unwrap();

    let cursor = watcher.state().clone();
    for _ in 0..3 {
        let result = watcher.scan().unwrap();
        assert_eq!(result.error_count, 0);
        assert_eq!(watcher.state().last_line_num, cursor.last_line_num);
        assert_eq!(watcher.state().last_byte_offset, cursor.last_byte_offset);
    }
}

#[test]
fn test_rotation_counts_only_rewritten_content() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_log(temp_dir.path(), "app.log", "");
    let mut watcher = Watcher::new(&path, &config("error", ""), memory_store(), None).unwrap();
    watcher.scan().unwrap();

    append_log(&path, &"error before rotation\n".repeat(5));
    assert_eq!(watcher.scan().unwrap().error_count, 5);

    // Truncate and rewrite with fewer lines.
    std::fs::write(&path, "error after\nok\nerror after\n").unwrap();
    let result = watcher.scan().unwrap();

    assert!(result.rotated);
    assert_eq!(result.error_count, 2);
    assert_eq!(result.lines_read, 3);
    assert_eq!(result.streak, vec![2]);

    // And the next append continues from the rewritten file.
    append_log(&path, "error again\n");
    let next = watcher.scan().unwrap();
    assert!(!next.rotated);
    assert_eq!(next.error_count, 1);
}

#[test]
fn test_state_survives_process_restart() {
    let temp_dir = TempDir::new().unwrap();
    let state_path = temp_dir.path().join("state.parquet");
    let path = write_log(temp_dir.path(), "app.log", "old error\n");
    let cfg = config("error", "");

    {
        let store = shared(ParquetStateStore::open(&state_path).unwrap());
        let mut watcher = Watcher::new(&path, &cfg, store, None).unwrap();
        watcher.scan().unwrap();
        append_log(&path, "error one\n");
        assert_eq!(watcher.scan().unwrap().error_count, 1);
    }

    append_log(&path, "error two\nerror three\n");

    let store = shared(ParquetStateStore::open(&state_path).unwrap());
    let result = logscan::scan_file(&path, &cfg, store, None).unwrap();
    assert!(!result.baseline);
    assert_eq!(result.error_count, 2);
    assert_eq!(result.first_line, "error two");
    assert_eq!(result.scan_count, 3);
    assert_eq!(result.streak, vec![2]);
}

#[test]
fn test_percent_matches_rounded_ratio() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_log(temp_dir.path(), "app.log", "");
    let mut watcher = Watcher::new(&path, &config("error", ""), memory_store(), None).unwrap();
    watcher.scan().unwrap();

    for (errors, others) in [(1u64, 2u64), (2, 1), (0, 7), (7, 0), (1, 6)] {
        append_log(&path, &"error\n".repeat(errors as usize));
        append_log(&path, &"fine\n".repeat(others as usize));
        let result = watcher.scan().unwrap();

        let lines = errors + others;
        let expected = (errors as f64 * 100.0 / lines as f64 * 100.0).round() / 100.0;
        assert_eq!(result.lines_read, lines);
        assert_eq!(result.error_percent, expected);
        assert!((0.0..=100.0).contains(&result.error_percent));
        let severity = if expected >= 50.0 {
            Severity::Critical
        } else {
            Severity::Error
        };
        assert_eq!(result.severity, severity);
    }
}

#[test]
fn test_geoip_enrichment_during_scan() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_log(temp_dir.path(), "access.log", "");
    let db = Arc::new(GeoIpDatabase::parse(crate::fixtures::GEOIP_CSV).unwrap());
    let mut watcher = Watcher::new(&path, &config(" 500 ", ""), memory_store(), Some(db)).unwrap();
    watcher.scan().unwrap();

    append_log(
        &path,
        "1.0.0.1 GET / 500 \n1.0.1.9 GET / 500 \n1.0.0.2 GET / 200 \n999.1.1.1 GET / 500 \n",
    );
    let result = watcher.scan().unwrap();

    assert_eq!(result.error_count, 3);
    assert_eq!(result.country_counts.get("Australia"), Some(&1));
    assert_eq!(result.country_counts.get("China"), Some(&1));
    assert_eq!(result.country_counts.get("Unknown"), Some(&1));
}
