//! Incremental log scanner (logscan) - Main binary entry point

use logscan::cli::args::{Command, TestArgs, WatchArgs, parse_args};
use logscan::cli::output::{format_json, format_test_line, format_text, meets_threshold};
use logscan::services::discover::{files_by_pattern, is_text_file, watch_candidates};
use logscan::services::geoip::GeoIpDatabase;
use logscan::services::pattern::CompiledPattern;
use logscan::services::store::shared;
use logscan::{MemoryStateStore, ParquetStateStore, SharedStore, WatcherSet};
use std::io::BufRead;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_STATE_FILE: &str = ".logscan.parquet";

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return;
    }

    match args[1].as_str() {
        "--help" | "-h" => {
            print_help();
            return;
        }
        "--version" | "-v" => {
            print_version();
            return;
        }
        _ => {}
    }

    let cli_args = match parse_args(&args) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Use --help for usage information");
            process::exit(2);
        }
    };

    let exit_code = match &cli_args.command {
        Command::Watch(watch_args) => {
            init_logger(watch_args.log_level.as_deref(), watch_args.quiet);
            handle_watch(watch_args)
        }
        Command::Test(test_args) => {
            init_logger(None, true);
            handle_test(test_args)
        }
    };

    process::exit(exit_code);
}

/// Install the logger. `RUST_LOG` always wins over `--log-level`.
/// Example: RUST_LOG=debug logscan watch /var/log/app.log --match error
fn init_logger(level: Option<&str>, quiet: bool) {
    let default = level.unwrap_or(if quiet { "warn" } else { "info" });
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn exit_code_for(err: &logscan::Error) -> i32 {
    match err {
        logscan::Error::InvalidInput(_) | logscan::Error::InvalidPattern { .. } => 2,
        _ => 4,
    }
}

fn default_state_path() -> PathBuf {
    dirs::home_dir().map_or_else(
        || PathBuf::from(DEFAULT_STATE_FILE),
        |home| home.join(DEFAULT_STATE_FILE),
    )
}

fn open_store(args: &WatchArgs) -> Result<SharedStore, String> {
    if args.no_state {
        log::info!("State is kept in memory only; every start is a fresh baseline");
        return Ok(shared(MemoryStateStore::new()));
    }

    let path = args.state.as_ref().map_or_else(default_state_path, PathBuf::from);
    log::info!("Using state file {}", path.display());
    ParquetStateStore::open(&path)
        .map(shared)
        .map_err(|e| format!("Failed to open state file {}: {e}", path.display()))
}

fn handle_watch(args: &WatchArgs) -> i32 {
    let store = match open_store(args) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {e}");
            return 4;
        }
    };

    let geoip = match &args.geoip_csv {
        Some(csv_path) => match GeoIpDatabase::from_path(csv_path) {
            Ok(db) => {
                log::info!("Loaded {} GeoIP ranges from {csv_path}", db.len());
                Some(Arc::new(db))
            }
            Err(e) => {
                eprintln!("Error: Failed to load GeoIP table {csv_path}: {e}");
                return 4;
            }
        },
        None => None,
    };

    let files = match watch_candidates(&args.path, args.file_paths_cap, args.file_recent_secs, &[]) {
        Ok(files) if files.is_empty() => {
            eprintln!("Error: No files found for {}", args.path);
            return 2;
        }
        Ok(files) => files,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code_for(&e);
        }
    };

    let set = match WatcherSet::new(args.to_config(), store, geoip) {
        Ok(set) => set,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code_for(&e);
        }
    };

    if let Err(e) = set.sync_paths(&files) {
        eprintln!("Error: {e}");
        return exit_code_for(&e);
    }

    loop {
        let failed = match run_cycle(&set, args) {
            Ok(failed) => failed,
            Err(e) => {
                eprintln!("Error: {e}");
                return 4;
            }
        };

        if args.every_secs == 0 {
            return if failed == 0 { 0 } else { 3 };
        }

        std::thread::sleep(Duration::from_secs(args.every_secs));

        let watched = match set.paths() {
            Ok(watched) => watched,
            Err(e) => {
                eprintln!("Error: {e}");
                return 4;
            }
        };
        match watch_candidates(&args.path, args.file_paths_cap, args.file_recent_secs, &watched) {
            Ok(files) if !files.is_empty() => {
                if let Err(e) = set.sync_paths(&files) {
                    log::error!("Failed to update watched files: {e}");
                }
            }
            Ok(_) => log::warn!("No files found for {}; keeping the current set", args.path),
            Err(e) => log::error!("Discovery failed: {e}"),
        }
    }
}

/// Scan every watched file once and print the results worth reporting.
/// Returns the number of files whose scan failed.
fn run_cycle(set: &WatcherSet, args: &WatchArgs) -> logscan::Result<usize> {
    let mut failed = 0;

    for (path, outcome) in set.scan_all()? {
        match outcome {
            Ok(result) => {
                if !meets_threshold(&result, args.min, args.streak) {
                    log::debug!(
                        "{path}: {} matches, below the reporting threshold",
                        result.error_count
                    );
                    continue;
                }
                if args.json {
                    println!("{}", format_json(&result));
                } else {
                    println!("{}", format_text(&result, !args.quiet));
                }
            }
            Err(e) => {
                log::error!("Scan of {path} failed: {e}");
                failed += 1;
            }
        }
    }

    Ok(failed)
}

fn handle_test(args: &TestArgs) -> i32 {
    if let Some(pattern) = &args.paths {
        return match files_by_pattern(pattern, 0) {
            Ok(files) => {
                for file in &files {
                    let kind = match is_text_file(file) {
                        Ok(true) => "text",
                        Ok(false) => "binary",
                        Err(_) => "unreadable",
                    };
                    println!("{kind:<10} {file}");
                }
                println!("{} files", files.len());
                0
            }
            Err(e) => {
                eprintln!("Error: {e}");
                exit_code_for(&e)
            }
        };
    }

    let (matcher, ignorer) = match (
        CompiledPattern::new(&args.match_pattern),
        CompiledPattern::new(&args.ignore_pattern),
    ) {
        (Ok(m), Ok(i)) => (m, i),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Error: {e}");
            return 2;
        }
    };

    if matcher.is_split() {
        println!("pattern split into {} regexes", matcher.len());
    }

    let check = |line: &str| {
        let bytes = line.as_bytes();
        let output = if ignorer.is_match(bytes) {
            format_test_line(line, "ignored", None)
        } else if let Some(found) = matcher.find(bytes) {
            format_test_line(line, "match", Some(&String::from_utf8_lossy(found)))
        } else {
            format_test_line(line, "no-match", None)
        };
        println!("{output}");
    };

    if args.lines.is_empty() {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => check(line.as_str()),
                Err(e) => {
                    eprintln!("Error: Failed to read stdin: {e}");
                    return 4;
                }
            }
        }
    } else {
        args.lines.iter().for_each(|line| check(line.as_str()));
    }

    0
}

fn print_help() {
    println!("Incremental log scanner (logscan) - Tail growing logs and report new matches");
    println!();
    println!("USAGE:");
    println!("    logscan watch <GLOB|DIR> --match <RE> [OPTIONS]");
    println!("    logscan test --match <RE> [LINE...]");
    println!("    logscan test --paths <GLOB|DIR>");
    println!();
    println!("COMMANDS:");
    println!("    watch     Scan new content of matching files, once or every N seconds");
    println!("    test      Dry-run a regex against lines (stdin if none) or list files");
    println!();
    println!("GLOBAL OPTIONS:");
    println!("    -h, --help                 Show this help message");
    println!("    -v, --version              Show version information");
    println!();
    println!("WATCH OPTIONS:");
    println!("    --match <RE>              Regex counted as a match (empty matches nothing)");
    println!("    --ignore <RE>             Regex for lines to skip (empty ignores nothing)");
    println!("    --every <SECS>            Repeat every SECS seconds (default: 0, run once)");
    println!("    --state <FILE>            Parquet state file (default: ~/{DEFAULT_STATE_FILE})");
    println!("    --no-state                Keep state in memory only");
    println!("    --min <N>                 Report when at least N matches (default: 1)");
    println!("    --streak <N>              ...in each of the last N scans (default: 1)");
    println!("    --max-buffer-mb <N>       Longest accepted line in MB (default: 64KB)");
    println!("    --anomaly                 Count distinct matched substrings instead");
    println!("    --anomaly-window <DAYS>   Days of anomaly history kept (default: 7)");
    println!("    --anomaly-policy <P>      evict (default) or cap when a count passes 100");
    println!("    --geoip-csv <FILE>        Count countries of IPv4 addresses in matches");
    println!("    --file-paths-cap <N>      Watch at most N files (default: 100)");
    println!("    --file-recent-secs <S>    Only files modified in the last S seconds");
    println!("                              (default: 86400, 0 to disable)");
    println!("    --parallel <N>            Files scanned concurrently (default: 1)");
    println!("    --json                    Emit one JSON object per reported file");
    println!("    --quiet                   Only warnings on stderr, no colors");
    println!("    --log-level <LEVEL>       error|warn|info|debug|trace (RUST_LOG wins)");
    println!();
    println!("TEST OPTIONS:");
    println!("    --match <RE>              Regex to try");
    println!("    --ignore <RE>             Ignore regex to try");
    println!("    --paths <GLOB|DIR>        List the files a watch pattern resolves to");
    println!();
    println!("EXIT CODES:");
    println!("    0 success, 2 invalid usage, 3 some scans failed, 4 fatal error");
    println!();
    println!("EXAMPLES:");
    println!("    logscan watch '/var/log/nginx/*.log' --match 'HTTP/1.1\" 5\\d\\d' --every 60");
    println!("    logscan watch /var/log/app --match ERROR --ignore healthcheck --json");
    println!("    echo 'code=500 oops' | logscan test --match 'code=5\\d\\d'");
}

fn print_version() {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const GIT_DATE: &str = env!("GIT_DATE");
    const BUILD_TARGET: &str = env!("BUILD_TARGET");

    println!("logscan {VERSION}");
    println!("Commit: {GIT_HASH} ({GIT_DATE})");
    println!("Target: {BUILD_TARGET}");

    #[cfg(debug_assertions)]
    println!("Build: debug");
    #[cfg(not(debug_assertions))]
    println!("Build: release");
}
