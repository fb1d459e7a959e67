//! Logging helpers shared by the pipeline stages
//!
//! Reads, writes and per-row event counts are logged in one format so a run
//! log lines up source by source.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use itertools::Itertools;

/// Log the start of a file operation
pub fn log_operation_start(operation: &str, path: &Path) {
    log::info!("{} {}", operation, path.display());
}

/// Log a finished file operation with its row count
///
/// `verb` is the past tense of the operation ("read", "wrote", "scored").
pub fn log_operation_complete(verb: &str, path: &Path, rows: usize, elapsed: Option<Duration>) {
    match elapsed {
        Some(duration) => log::info!(
            "{} {} rows ({}) in {:.2?}",
            capitalize(verb),
            rows,
            path.display(),
            duration
        ),
        None => log::info!("{} {} rows ({})", capitalize(verb), rows, path.display()),
    }
}

/// Log a warning, optionally about a file
pub fn log_warning(message: &str, path: Option<&Path>) {
    match path {
        Some(path) => log::warn!("{}: {}", message, path.display()),
        None => log::warn!("{message}"),
    }
}

/// Log a labelled set of counts once, skipping zeros
///
/// Per-row events (dropped keys, clipped values) are counted rather than
/// logged row by row; this is where the counts become visible.
pub fn log_counts(label: &str, counts: &BTreeMap<String, usize>) {
    let line = counts
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(kind, count)| format!("{kind}={count}"))
        .join(", ");
    if !line.is_empty() {
        log::warn!("{label}: {line}");
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}
