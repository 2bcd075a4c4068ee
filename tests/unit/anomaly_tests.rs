//! Unit tests for the anomaly counter and its persisted history
#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use logscan::EvictionPolicy;
    use logscan::MemoryStateStore;
    use logscan::services::anomaly::{AnomalyCounter, MAX_KEY_CHARS, history_at, save_history};

    fn at(day: u32, hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    fn counter_with(key: &str, times: usize) -> AnomalyCounter {
        let mut counter = AnomalyCounter::default();
        for _ in 0..times {
            counter.count(key);
        }
        counter
    }

    #[test]
    fn key_is_evicted_once_it_exceeds_the_limit() {
        let mut counter = AnomalyCounter::new(100, EvictionPolicy::EvictOnExceed);
        for _ in 0..100 {
            counter.count("timeout");
        }
        assert_eq!(counter.get("timeout"), Some(100));

        counter.count("timeout");
        assert_eq!(counter.get("timeout"), None);
        assert!(counter.is_empty());

        counter.count("timeout");
        assert_eq!(counter.get("timeout"), Some(1));
    }

    #[test]
    fn cap_and_keep_saturates() {
        let mut counter = AnomalyCounter::new(3, EvictionPolicy::CapAndKeep);
        for _ in 0..10 {
            counter.count("timeout");
        }
        assert_eq!(counter.get("timeout"), Some(3));
        assert_eq!(counter.len(), 1);
    }

    #[test]
    fn long_keys_are_truncated() {
        let mut counter = AnomalyCounter::default();
        counter.count(&"x".repeat(150));
        counter.count(&"x".repeat(120));

        let snapshot = counter.snapshot();
        assert_eq!(snapshot.len(), 1);
        let (key, value) = snapshot.iter().next().unwrap();
        assert_eq!(key.chars().count(), MAX_KEY_CHARS);
        assert_eq!(*value, 2);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let counter = counter_with(&"é".repeat(120), 1);
        let snapshot = counter.snapshot();
        let key = snapshot.keys().next().unwrap();
        assert_eq!(key.chars().count(), MAX_KEY_CHARS);
        assert_eq!(counter.get(&"é".repeat(101)), Some(1));
    }

    #[test]
    fn history_returns_same_minute_on_previous_days() {
        let mut store = MemoryStateStore::new();
        let counter = counter_with("disk full", 2);

        save_history(&mut store, "/a.log", &counter, at(1, 10, 30), 7).unwrap();
        save_history(&mut store, "/a.log", &counter_with("disk full", 5), at(2, 10, 30), 7)
            .unwrap();
        save_history(&mut store, "/a.log", &counter, at(2, 11, 0), 7).unwrap();
        save_history(&mut store, "/a.log", &counter, at(3, 10, 30), 7).unwrap();

        let history = history_at(&store, "/a.log", at(3, 10, 30)).unwrap();
        assert_eq!(history.get("disk full"), Some(&vec![2, 5]));
        assert_eq!(history.len(), 1);

        assert!(history_at(&store, "/a.log", at(3, 10, 31)).unwrap().is_empty());
        assert!(history_at(&store, "/b.log", at(3, 10, 30)).unwrap().is_empty());
    }

    #[test]
    fn history_is_pruned_to_the_window() {
        let mut store = MemoryStateStore::new();
        let counter = counter_with("disk full", 2);

        save_history(&mut store, "/a.log", &counter, at(1, 10, 30), 7).unwrap();
        save_history(&mut store, "/a.log", &counter_with("disk full", 4), at(12, 10, 30), 7)
            .unwrap();

        let history = history_at(&store, "/a.log", at(13, 10, 30)).unwrap();
        assert_eq!(history.get("disk full"), Some(&vec![4]));
    }
}
