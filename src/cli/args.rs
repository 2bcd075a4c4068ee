//! CLI argument parsing

use crate::{EvictionPolicy, WatchConfig};

/// Largest accepted `--max-buffer-mb`.
pub const MAX_BUFFER_MB: usize = 1024;

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub command: Command,
}

#[derive(Debug, Clone)]
pub enum Command {
    Watch(WatchArgs),
    Test(TestArgs),
}

#[derive(Debug, Clone)]
pub struct WatchArgs {
    /// Glob or directory naming the files to watch
    pub path: String,
    pub match_pattern: String,
    pub ignore_pattern: String,
    /// Seconds between cycles; 0 runs a single cycle
    pub every_secs: u64,
    pub state: Option<String>,
    pub no_state: bool,
    pub streak: usize,
    pub max_buffer_mb: usize,
    pub anomaly: bool,
    pub anomaly_window_days: u32,
    pub anomaly_policy: EvictionPolicy,
    pub geoip_csv: Option<String>,
    pub file_paths_cap: usize,
    pub file_recent_secs: u64,
    pub parallel: usize,
    pub min: u64,
    pub json: bool,
    pub quiet: bool,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TestArgs {
    pub match_pattern: String,
    pub ignore_pattern: String,
    /// Glob or directory to list instead of testing lines
    pub paths: Option<String>,
    pub lines: Vec<String>,
}

impl Default for WatchArgs {
    fn default() -> Self {
        Self {
            path: String::new(),
            match_pattern: String::new(),
            ignore_pattern: String::new(),
            every_secs: 0,
            state: None,
            no_state: false,
            streak: 1,
            max_buffer_mb: 0,
            anomaly: false,
            anomaly_window_days: 7,
            anomaly_policy: EvictionPolicy::EvictOnExceed,
            geoip_csv: None,
            file_paths_cap: 100,
            file_recent_secs: 86_400,
            parallel: 1,
            min: 1,
            json: false,
            quiet: false,
            log_level: None,
        }
    }
}

impl WatchArgs {
    /// Scan options for the engine.
    #[must_use]
    pub fn to_config(&self) -> WatchConfig {
        WatchConfig {
            match_pattern: self.match_pattern.clone(),
            ignore_pattern: self.ignore_pattern.clone(),
            anomaly: self.anomaly,
            anomaly_window_days: self.anomaly_window_days,
            anomaly_policy: self.anomaly_policy,
            streak_width: self.streak,
            max_line_bytes: self.max_buffer_mb.saturating_mul(1024 * 1024),
            notify_interval_secs: self.every_secs,
            parallelism: self.parallel,
            ..WatchConfig::default()
        }
    }
}

/// Parse command line arguments
pub fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    if args.len() < 2 {
        return Err("No command specified".to_string());
    }

    let command = match args[1].as_str() {
        "watch" => Command::Watch(parse_watch_args(&args[2..])?),
        "test" => Command::Test(parse_test_args(&args[2..])?),
        _ => return Err(format!("Unknown command: {}", args[1])),
    };

    Ok(CliArgs { command })
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn number<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> Result<T, String> {
    value(args, i, flag)?
        .parse()
        .map_err(|_| format!("{flag} must be a non-negative integer"))
}

fn parse_watch_args(args: &[String]) -> Result<WatchArgs, String> {
    let mut watch = WatchArgs::default();
    let mut i = 0;

    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--match" => {
                i += 1;
                watch.match_pattern = value(args, i, flag)?.to_string();
            }
            "--ignore" => {
                i += 1;
                watch.ignore_pattern = value(args, i, flag)?.to_string();
            }
            "--every" => {
                i += 1;
                watch.every_secs = number(args, i, flag)?;
            }
            "--state" => {
                i += 1;
                watch.state = Some(value(args, i, flag)?.to_string());
            }
            "--no-state" => {
                watch.no_state = true;
            }
            "--streak" => {
                i += 1;
                watch.streak = number(args, i, flag)?;
                if watch.streak == 0 {
                    return Err("--streak must be greater than zero".to_string());
                }
            }
            "--max-buffer-mb" => {
                i += 1;
                watch.max_buffer_mb = number(args, i, flag)?;
                if watch.max_buffer_mb > MAX_BUFFER_MB {
                    return Err(format!("--max-buffer-mb must be at most {MAX_BUFFER_MB}"));
                }
            }
            "--anomaly" => {
                watch.anomaly = true;
            }
            "--anomaly-window" => {
                i += 1;
                watch.anomaly_window_days = number(args, i, flag)?;
            }
            "--anomaly-policy" => {
                i += 1;
                watch.anomaly_policy = value(args, i, flag)?.parse()?;
            }
            "--geoip-csv" => {
                i += 1;
                watch.geoip_csv = Some(value(args, i, flag)?.to_string());
            }
            "--file-paths-cap" => {
                i += 1;
                watch.file_paths_cap = number(args, i, flag)?;
            }
            "--file-recent-secs" => {
                i += 1;
                watch.file_recent_secs = number(args, i, flag)?;
            }
            "--parallel" => {
                i += 1;
                watch.parallel = number(args, i, flag)?;
                if watch.parallel == 0 {
                    return Err("--parallel must be greater than zero".to_string());
                }
            }
            "--min" => {
                i += 1;
                watch.min = number(args, i, flag)?;
            }
            "--log-level" => {
                i += 1;
                watch.log_level = Some(value(args, i, flag)?.to_string());
            }
            "--json" => {
                watch.json = true;
            }
            "--quiet" => {
                watch.quiet = true;
            }
            arg if !arg.starts_with("--") => {
                if watch.path.is_empty() {
                    watch.path = arg.to_string();
                } else {
                    return Err(format!("Unexpected argument: {arg}"));
                }
            }
            _ => return Err(format!("Unknown option: {flag}")),
        }
        i += 1;
    }

    if watch.path.is_empty() {
        return Err("Missing required argument: GLOB|DIR".to_string());
    }
    if watch.state.is_some() && watch.no_state {
        return Err("--state and --no-state cannot be combined".to_string());
    }

    Ok(watch)
}

fn parse_test_args(args: &[String]) -> Result<TestArgs, String> {
    let mut test = TestArgs::default();
    let mut i = 0;

    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--match" => {
                i += 1;
                test.match_pattern = value(args, i, flag)?.to_string();
            }
            "--ignore" => {
                i += 1;
                test.ignore_pattern = value(args, i, flag)?.to_string();
            }
            "--paths" => {
                i += 1;
                test.paths = Some(value(args, i, flag)?.to_string());
            }
            arg if !arg.starts_with("--") => test.lines.push(arg.to_string()),
            _ => return Err(format!("Unknown option: {flag}")),
        }
        i += 1;
    }

    if test.paths.is_none() && test.match_pattern.is_empty() {
        return Err("test requires --match or --paths".to_string());
    }

    Ok(test)
}
