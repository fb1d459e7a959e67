//! IO utilities for flat tabular extracts
//!
//! Extracts arrive as delimited text or Parquet. Both are read into Arrow
//! record batches whose columns are all `Utf8`, so every value goes through
//! the same tolerant coercion in [`crate::schema::coerce`].

pub mod csv;
pub mod parquet;

use std::path::Path;

use arrow::record_batch::RecordBatch;

use crate::error::Result;

pub use self::csv::{read_csv, write_csv};
pub use self::parquet::{read_parquet, write_parquet};

/// Default batch size when reading extracts
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// Record batches of one extract and the rows the reader had to skip
#[derive(Debug, Default)]
pub struct Extract {
    pub batches: Vec<RecordBatch>,
    /// Delimited-text rows with more fields than the header
    pub overlong_rows: usize,
}

impl Extract {
    /// Rows that made it into the batches
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

/// Read an extract, choosing the reader by file extension
///
/// `.parquet` and `.pq` files are read as Parquet; anything else as
/// delimited text.
pub fn read_extract(path: &Path) -> Result<Extract> {
    let is_parquet = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet") || ext.eq_ignore_ascii_case("pq"));
    if is_parquet {
        Ok(Extract {
            batches: read_parquet(path)?,
            overlong_rows: 0,
        })
    } else {
        read_csv(path)
    }
}

/// Read an extract and keep only its record batches
pub fn read_table(path: &Path) -> Result<Vec<RecordBatch>> {
    read_extract(path).map(|extract| extract.batches)
}
