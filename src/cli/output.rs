//! Output formatting for CLI

use crate::models::{ScanResult, Severity};

const COLOR_RED: &str = "\x1b[31m";
const COLOR_YELLOW: &str = "\x1b[33m";
const COLOR_RESET: &str = "\x1b[0m";

/// Characters of first/last line shown in text output.
const LINE_DISPLAY_CHARS: usize = 120;

/// Whether a result is worth reporting: at least `min` matches now and in each of the
/// last `streak` scans.
#[must_use]
pub fn meets_threshold(result: &ScanResult, min: u64, streak: usize) -> bool {
    if result.baseline || result.error_count < min {
        return false;
    }
    let streak = streak.max(1);
    result.streak.len() >= streak && result.streak.iter().rev().take(streak).all(|&c| c >= min)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => COLOR_RED,
        Severity::Error => COLOR_YELLOW,
    }
}

/// Format one scan result as human-readable text
#[must_use]
pub fn format_text(result: &ScanResult, color: bool) -> String {
    let (start, end) = if color {
        (severity_color(result.severity), COLOR_RESET)
    } else {
        ("", "")
    };

    let mut out = format!(
        "{start}[{}]{end} {}: {} matches in {} lines ({:.2}%), scan #{}",
        result.severity,
        result.file_path,
        result.error_count,
        result.lines_read,
        result.error_percent,
        result.scan_count
    );

    if result.rotated {
        out.push_str(" (rotated)");
    }
    if !result.streak.is_empty() {
        let streak: Vec<String> = result.streak.iter().map(u64::to_string).collect();
        out.push_str(&format!("\n  streak: {}", streak.join(" ")));
    }
    if !result.first_line.is_empty() {
        out.push_str(&format!(
            "\n  first: {}",
            truncate(&result.first_line, LINE_DISPLAY_CHARS)
        ));
    }
    if !result.last_line.is_empty() {
        out.push_str(&format!(
            "\n  last:  {}",
            truncate(&result.last_line, LINE_DISPLAY_CHARS)
        ));
    }
    match (result.first_date.is_empty(), result.last_date.is_empty()) {
        (false, false) => {
            out.push_str(&format!("\n  span:  {} to {}", result.first_date, result.last_date));
        }
        (false, true) => out.push_str(&format!("\n  since: {}", result.first_date)),
        _ => {}
    }
    if !result.country_counts.is_empty() {
        let countries: Vec<String> = result
            .country_counts
            .iter()
            .map(|(name, count)| format!("{name}={count}"))
            .collect();
        out.push_str(&format!("\n  countries: {}", countries.join(", ")));
    }
    if !result.anomalies.is_empty() {
        let mut anomalies: Vec<(&String, &u64)> = result.anomalies.iter().collect();
        anomalies.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (matched, count) in anomalies.into_iter().take(10) {
            out.push_str(&format!("\n  {count:>6}  {}", truncate(matched, LINE_DISPLAY_CHARS)));
            if let Some(before) = result.anomaly_history.get(matched) {
                let before: Vec<String> = before.iter().map(u64::to_string).collect();
                out.push_str(&format!("  (earlier days: {})", before.join(" ")));
            }
        }
    }

    out
}

/// Format one scan result as a single JSON line
#[must_use]
pub fn format_json(result: &ScanResult) -> String {
    serde_json::to_string(result).unwrap_or_else(|_| "{}".to_string())
}

/// Format a dry-run verdict for one input line
#[must_use]
pub fn format_test_line(line: &str, verdict: &str, found: Option<&str>) -> String {
    match found {
        Some(found) => format!("{verdict:<8} {line}  [{found}]"),
        None => format!("{verdict:<8} {line}"),
    }
}
