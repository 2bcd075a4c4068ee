//! Match/ignore pattern compilation with splitting of very long alternations
//!
//! Patterns shorter than [`SPLIT_THRESHOLD`] compile to a single regex. Longer patterns
//! are cut into their top-level alternation branches on unescaped `|` characters and
//! regrouped into chunks of roughly [`CHUNK_TARGET`] characters, each compiled on its
//! own. A line matches the pattern when any chunk matches it.

use crate::{Error, Result};
use regex::bytes::Regex;

/// Patterns at or above this length are considered for splitting.
pub const SPLIT_THRESHOLD: usize = 500;

/// Approximate number of branch characters per compiled chunk.
pub const CHUNK_TARGET: usize = 300;

/// One logical match or ignore pattern, possibly backed by several regexes
#[derive(Debug, Clone, Default)]
pub struct CompiledPattern {
    source: String,
    regexes: Vec<Regex>,
}

impl CompiledPattern {
    /// Compile `pattern`; an empty pattern yields an empty set that never matches.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            source: pattern.to_string(),
            regexes: compile(pattern)?,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regexes.is_empty()
    }

    /// Number of independently compiled sub-expressions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regexes.len()
    }

    #[must_use]
    pub fn is_split(&self) -> bool {
        self.regexes.len() > 1
    }

    #[must_use]
    pub fn regexes(&self) -> &[Regex] {
        &self.regexes
    }

    #[must_use]
    pub fn is_match(&self, line: &[u8]) -> bool {
        matches_any(&self.regexes, line)
    }

    /// First matched substring, taken from the first chunk that matches.
    #[must_use]
    pub fn find<'a>(&self, line: &'a [u8]) -> Option<&'a [u8]> {
        self.regexes
            .iter()
            .find_map(|re| re.find(line))
            .map(|m| m.as_bytes())
    }
}

/// Whether any of `regexes` matches `line`.
#[must_use]
pub fn matches_any(regexes: &[Regex], line: &[u8]) -> bool {
    regexes.iter().any(|re| re.is_match(line))
}

/// Compile a pattern into one or more regexes.
///
/// Splitting only happens when the pattern contains real (unescaped) separators. If a
/// chunk fails to compile on its own because a group or class straddled a chunk
/// boundary, the pattern is compiled whole instead.
pub fn compile(pattern: &str) -> Result<Vec<Regex>> {
    if pattern.is_empty() {
        return Ok(Vec::new());
    }

    if pattern.len() < SPLIT_THRESHOLD {
        return Ok(vec![compile_one(pattern)?]);
    }

    // A leading `(?i)`-style group applies to every branch, so each chunk needs it.
    let (flags, body) = split_leading_flags(pattern);
    if has_flag_directive(body) {
        log::debug!("Pattern sets flags mid-way, compiling it whole");
        return Ok(vec![compile_one(pattern)?]);
    }
    let branches = split_pattern(body);
    if branches.len() <= 1 {
        return Ok(vec![compile_one(pattern)?]);
    }

    let chunks = group_branches(&branches, CHUNK_TARGET);
    let mut regexes = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        match Regex::new(&format!("{flags}{chunk}")) {
            Ok(re) => regexes.push(re),
            Err(err) => {
                log::debug!("Chunk failed to compile ({err}), compiling pattern whole");
                return Ok(vec![compile_one(pattern)?]);
            }
        }
    }

    log::debug!(
        "Split {} char pattern into {} chunks ({} branches)",
        pattern.len(),
        regexes.len(),
        branches.len()
    );
    Ok(regexes)
}

fn split_leading_flags(pattern: &str) -> (&str, &str) {
    let Some(rest) = pattern.strip_prefix("(?") else {
        return ("", pattern);
    };
    match rest.find(')') {
        Some(end) if end > 0 && rest[..end].chars().all(|c| c.is_ascii_alphabetic() || c == '-') => {
            pattern.split_at(end + 3)
        }
        _ => ("", pattern),
    }
}

/// Whether `body` contains a bare `(?flags)` group. Its flags carry over to every later
/// branch, which separately compiled chunks cannot reproduce.
fn has_flag_directive(body: &str) -> bool {
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'(' if bytes.get(i + 1) == Some(&b'?') => {
                let flags = bytes[i + 2..]
                    .iter()
                    .take_while(|b| b.is_ascii_alphabetic() || **b == b'-')
                    .count();
                if flags > 0 && bytes.get(i + 2 + flags) == Some(&b')') {
                    return true;
                }
                i += 2;
            }
            _ => i += 1,
        }
    }
    false
}

fn compile_one(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|err| Error::InvalidPattern {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })
}

/// Split a pattern on unescaped `|` characters.
///
/// Any backslash escape (`\|`, `\\`, `\d`, ...) is copied through untouched, so an
/// escaped pipe never becomes a split point. Empty branches are preserved.
#[must_use]
pub fn split_pattern(pattern: &str) -> Vec<String> {
    if pattern.is_empty() {
        return Vec::new();
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for ch in pattern.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                current.push(ch);
                escaped = true;
            }
            '|' => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    parts.push(current);

    parts
}

/// Regroup branches into `|`-joined chunks whose branch lengths sum to about `target`.
fn group_branches(branches: &[String], target: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for branch in branches {
        current.push(branch);
        current_len += branch.len();
        if current_len >= target {
            chunks.push(current.join("|"));
            current.clear();
            current_len = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current.join("|"));
    }

    chunks
}
