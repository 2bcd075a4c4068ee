//! Discovery of the files to watch: directory walks, glob expansion and cheap filters.

use crate::{Error, Result};
use std::fs::{File, Metadata};
use std::io::Read;
use std::path::Path;
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

/// Bytes inspected when deciding whether a file holds text.
const SNIFF_BYTES: usize = 512;

/// Slack added to the recency window so files touched just before a restart still count.
const RECENT_BUFFER_SECS: u64 = 3600;

/// Resolve `pattern` to a sorted list of files, at most `cap` long (0 = unlimited).
///
/// A directory is walked recursively; anything else is expanded as a glob.
pub fn files_by_pattern(pattern: &str, cap: usize) -> Result<Vec<String>> {
    let mut files = if Path::new(pattern).is_dir() {
        walk_directory(pattern)?
    } else {
        expand_glob(pattern)?
    };

    files.sort();
    files.dedup();
    if cap > 0 && files.len() > cap {
        log::warn!(
            "{pattern} matched {} files; watching only the first {cap}",
            files.len()
        );
        files.truncate(cap);
    }

    log::info!("Discovered {} files for {pattern}", files.len());
    Ok(files)
}

/// Resolve the files a watch pattern should cover in this cycle.
///
/// Binary files are skipped. The recency filter only gates files not yet in `watched`:
/// a watched file stays in the set however long it has been quiet, so its cursor
/// survives until it disappears from disk or from the pattern's matches.
pub fn watch_candidates(
    pattern: &str,
    cap: usize,
    recent_secs: u64,
    watched: &[String],
) -> Result<Vec<String>> {
    let candidates = files_by_pattern(pattern, cap)?;
    let mut files = Vec::with_capacity(candidates.len());

    for path in candidates {
        match is_text_file(&path) {
            Ok(true) => {}
            Ok(false) => {
                log::warn!("Skipping non-text file {path}");
                continue;
            }
            Err(e) => {
                log::warn!("Skipping {path}: {e}");
                continue;
            }
        }

        if !watched.contains(&path) {
            let recent = std::fs::metadata(&path)
                .map(|meta| is_recently_modified(&meta, recent_secs))
                .unwrap_or(false);
            if !recent {
                log::debug!("Skipping {path}: not modified recently");
                continue;
            }
        }

        files.push(path);
    }

    Ok(files)
}

fn walk_directory(root: &str) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| Error::InvalidInput(format!("cannot walk {root}: {e}")))?;
        if entry.file_type().is_file() {
            files.push(entry.path().to_string_lossy().into_owned());
        }
    }
    Ok(files)
}

fn expand_glob(pattern: &str) -> Result<Vec<String>> {
    let paths = glob::glob(pattern)
        .map_err(|e| Error::InvalidInput(format!("invalid glob '{pattern}': {e}")))?;

    let mut files = Vec::new();
    for path in paths {
        match path {
            Ok(path) if path.is_file() => files.push(path.to_string_lossy().into_owned()),
            Ok(_) => {}
            Err(e) => log::debug!("Skipping unreadable glob match: {e}"),
        }
    }
    Ok(files)
}

/// True when the first bytes of `path` are valid UTF-8. Empty files count as text.
pub fn is_text_file<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::FileOpen {
        path: path.display().to_string(),
        source,
    })?;

    let mut buffer = Vec::with_capacity(SNIFF_BYTES);
    file.take(SNIFF_BYTES as u64)
        .read_to_end(&mut buffer)
        .map_err(|source| Error::FileRead {
            path: path.display().to_string(),
            source,
        })?;

    Ok(match std::str::from_utf8(&buffer) {
        Ok(_) => true,
        // A multi-byte character cut off by the sniff window is still text.
        Err(e) => e.error_len().is_none() && buffer.len() == SNIFF_BYTES,
    })
}

/// True when the file was modified within `within_secs` (plus an hour of slack).
/// A window of 0 disables the check.
#[must_use]
pub fn is_recently_modified(metadata: &Metadata, within_secs: u64) -> bool {
    if within_secs == 0 {
        return true;
    }
    let Ok(modified) = metadata.modified() else {
        return true;
    };
    modified_within(modified, SystemTime::now(), within_secs)
}

fn modified_within(modified: SystemTime, now: SystemTime, within_secs: u64) -> bool {
    let window = Duration::from_secs(within_secs.saturating_add(RECENT_BUFFER_SECS));
    match now.duration_since(modified) {
        Ok(age) => age <= window,
        // Modified in the future: clock skew, treat as fresh.
        Err(_) => true,
    }
}
