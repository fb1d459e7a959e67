//! Progress reporting for extract loading and model training
//!
//! Bars draw to stderr through indicatif and stay hidden when it is not a
//! terminal, so test and batch logs are not cluttered.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const ROWS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} rows ({per_sec}) {msg}";

const SPINNER_TEMPLATE: &str = "{spinner:.green} {elapsed_precise} {msg}";

/// Bar counting the raw rows of one source extract
#[must_use]
pub fn create_rows_progress_bar(rows: u64, source_name: &str) -> ProgressBar {
    let pb = ProgressBar::new(rows);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(ROWS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(source_name.to_string());
    pb
}

/// Spinner for work without a known length
#[must_use]
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Finish a bar, leaving `message` on screen when given
pub fn finish_progress_bar(pb: &ProgressBar, message: Option<&str>) {
    match message {
        Some(msg) => pb.finish_with_message(msg.to_string()),
        None => pb.finish_and_clear(),
    }
}
