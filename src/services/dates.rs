//! Best-effort timestamp extraction from free-form log lines

use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::LazyLock;

/// Format used for every extracted timestamp.
pub const OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

struct DateShape {
    regex: Regex,
    format: &'static str,
}

static SHAPES: LazyLock<Vec<DateShape>> = LazyLock::new(|| {
    vec![
        // 2026-03-01 10:30:00, 2026-03-01T10:30:00.123Z
        DateShape {
            regex: Regex::new(r"(\d{4})-(\d{2})-(\d{2})[T ](\d{2}):(\d{2}):(\d{2})").unwrap(),
            format: "%Y-%m-%d %H:%M:%S",
        },
        // 2026/03/01 10:30:00
        DateShape {
            regex: Regex::new(r"(\d{4})/(\d{2})/(\d{2}) (\d{2}):(\d{2}):(\d{2})").unwrap(),
            format: "%Y/%m/%d %H:%M:%S",
        },
        // Apache/nginx access logs: 01/Mar/2026:10:30:00
        DateShape {
            regex: Regex::new(r"(\d{2})/([A-Z][a-z]{2})/(\d{4}):(\d{2}):(\d{2}):(\d{2})").unwrap(),
            format: "%d/%b/%Y:%H:%M:%S",
        },
    ]
});

/// Find the first recognisable timestamp in `line`, normalised to [`OUTPUT_FORMAT`].
#[must_use]
pub fn extract_date(line: &str) -> Option<String> {
    for shape in SHAPES.iter() {
        let Some(m) = shape.regex.find(line) else {
            continue;
        };
        let candidate = m.as_str().replacen('T', " ", 1);
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&candidate, shape.format) {
            return Some(parsed.format(OUTPUT_FORMAT).to_string());
        }
    }
    None
}
