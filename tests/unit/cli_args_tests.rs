//! Unit tests for CLI argument parsing
#[cfg(test)]
mod tests {
    use logscan::EvictionPolicy;
    use logscan::cli::args::{Command, MAX_BUFFER_MB, parse_args};

    fn make_args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_watch_with_defaults() {
        let argv = make_args(&["logscan", "watch", "/var/log/app.log", "--match", "error"]);

        let parsed = parse_args(&argv).expect("parse watch args");
        let Command::Watch(watch) = parsed.command else {
            panic!("expected watch command");
        };

        assert_eq!(watch.path, "/var/log/app.log");
        assert_eq!(watch.match_pattern, "error");
        assert_eq!(watch.every_secs, 0);
        assert_eq!(watch.min, 1);
        assert_eq!(watch.streak, 1);
        assert_eq!(watch.file_paths_cap, 100);
        assert_eq!(watch.file_recent_secs, 86_400);
        assert!(watch.state.is_none());
        assert!(!watch.no_state);
    }

    #[test]
    fn parse_watch_with_every_option() {
        let argv = make_args(&[
            "logscan",
            "watch",
            "/var/log/*.log",
            "--match",
            "ERR|FATAL",
            "--ignore",
            "healthcheck",
            "--every",
            "30",
            "--state",
            "/tmp/state.parquet",
            "--streak",
            "3",
            "--max-buffer-mb",
            "2",
            "--anomaly",
            "--anomaly-window",
            "14",
            "--anomaly-policy",
            "cap",
            "--geoip-csv",
            "ip.csv",
            "--parallel",
            "4",
            "--min",
            "5",
            "--json",
            "--quiet",
        ]);

        let Command::Watch(watch) = parse_args(&argv).unwrap().command else {
            panic!("expected watch command");
        };

        assert_eq!(watch.every_secs, 30);
        assert_eq!(watch.state.as_deref(), Some("/tmp/state.parquet"));
        assert_eq!(watch.geoip_csv.as_deref(), Some("ip.csv"));
        assert!(watch.json && watch.quiet && watch.anomaly);

        let config = watch.to_config();
        assert_eq!(config.match_pattern, "ERR|FATAL");
        assert_eq!(config.ignore_pattern, "healthcheck");
        assert_eq!(config.streak_width, 3);
        assert_eq!(config.max_line_bytes, 2 * 1024 * 1024);
        assert_eq!(config.anomaly_window_days, 14);
        assert_eq!(config.anomaly_policy, EvictionPolicy::CapAndKeep);
        assert_eq!(config.parallelism, 4);
    }

    #[test]
    fn parse_watch_rejects_bad_input() {
        for raw in [
            vec!["logscan", "watch"],
            vec!["logscan", "watch", "a.log", "b.log"],
            vec!["logscan", "watch", "a.log", "--every"],
            vec!["logscan", "watch", "a.log", "--every", "soon"],
            vec!["logscan", "watch", "a.log", "--streak", "0"],
            vec!["logscan", "watch", "a.log", "--parallel", "0"],
            vec!["logscan", "watch", "a.log", "--anomaly-policy", "lru"],
            vec!["logscan", "watch", "a.log", "--state", "s", "--no-state"],
            vec!["logscan", "watch", "a.log", "--bogus"],
            vec!["logscan", "watch", "a.log", "--max-buffer-mb", "1025"],
            vec!["logscan", "watch", "a.log", "--max-buffer-mb", "17592186044416"],
            vec!["logscan", "frobnicate"],
            vec!["logscan"],
        ] {
            assert!(parse_args(&make_args(&raw)).is_err(), "{raw:?}");
        }
    }

    #[test]
    fn largest_buffer_is_accepted() {
        let argv = make_args(&["logscan", "watch", "a.log", "--max-buffer-mb", "1024"]);
        let Command::Watch(watch) = parse_args(&argv).unwrap().command else {
            panic!("expected watch command");
        };
        assert_eq!(watch.to_config().max_line_bytes, MAX_BUFFER_MB * 1024 * 1024);
    }

    #[test]
    fn parse_test_command() {
        let argv = make_args(&["logscan", "test", "--match", "123", "test123", "abc"]);
        let Command::Test(test) = parse_args(&argv).unwrap().command else {
            panic!("expected test command");
        };
        assert_eq!(test.match_pattern, "123");
        assert_eq!(test.lines, vec!["test123", "abc"]);

        let argv = make_args(&["logscan", "test", "--paths", "/var/log"]);
        let Command::Test(test) = parse_args(&argv).unwrap().command else {
            panic!("expected test command");
        };
        assert_eq!(test.paths.as_deref(), Some("/var/log"));

        assert!(parse_args(&make_args(&["logscan", "test", "line"])).is_err());
    }
}
