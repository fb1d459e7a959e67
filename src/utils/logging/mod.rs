//! Logging, progress bars and the end-of-run console summary

pub mod console;
pub mod log;
pub mod progress;

pub use log::{log_counts, log_operation_complete, log_operation_start, log_warning};
pub use progress::{create_rows_progress_bar, create_spinner, finish_progress_bar};
