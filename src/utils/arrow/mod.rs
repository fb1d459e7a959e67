//! Arrow data handling utilities
//!
//! This module contains utilities for working with Arrow arrays and record
//! batches: typed column access and per-row views of raw extracts.

pub mod array_utils;
pub mod extractors;

// Re-export commonly used functions for convenience
pub use array_utils::{downcast_array, get_column};
pub use extractors::{BoundColumns, RawRow, extract_str};
