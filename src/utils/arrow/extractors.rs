//! Field extraction utilities for Arrow record batches
//!
//! Extracts are read as all-`Utf8` batches. These helpers bind the columns a
//! source adapter declared and hand out per-row string views.

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;

use crate::error::Result;
use crate::schema::ResolvedColumns;
use crate::utils::arrow::array_utils::{downcast_array, get_column};

/// Extract a string value from a string array
///
/// Returns `None` for nulls and out-of-range rows.
#[must_use]
pub fn extract_str(array: &StringArray, row: usize) -> Option<&str> {
    (row < array.len() && !array.is_null(row)).then(|| array.value(row))
}

/// The declared columns of one batch, ready for row access
#[derive(Debug)]
pub struct BoundColumns {
    names: Vec<&'static str>,
    arrays: Vec<ArrayRef>,
    num_rows: usize,
}

impl BoundColumns {
    /// Bind every resolved column of `batch` as a `Utf8` array
    pub fn bind(batch: &RecordBatch, resolved: &ResolvedColumns) -> Result<Self> {
        let mut names = Vec::new();
        let mut arrays = Vec::new();
        for column in resolved.iter() {
            let array = get_column(batch, column.index, &DataType::Utf8)?;
            downcast_array::<StringArray>(&array, &column.found_as, "Utf8")?;
            names.push(column.spec.canonical);
            arrays.push(array);
        }
        Ok(Self {
            names,
            arrays,
            num_rows: batch.num_rows(),
        })
    }

    /// Number of rows in the bound batch
    #[must_use]
    pub const fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// View of one row
    #[must_use]
    pub const fn row(&self, row: usize) -> RawRow<'_> {
        RawRow { bound: self, row }
    }

    fn value(&self, canonical: &str, row: usize) -> Option<&str> {
        let index = self.names.iter().position(|name| *name == canonical)?;
        let array = self.arrays[index].as_any().downcast_ref::<StringArray>()?;
        extract_str(array, row)
    }
}

/// One raw extract row, addressed by canonical column name
#[derive(Debug, Clone, Copy)]
pub struct RawRow<'a> {
    bound: &'a BoundColumns,
    row: usize,
}

impl<'a> RawRow<'a> {
    /// Raw text of a column; `None` when null or when the column is absent
    #[must_use]
    pub fn get(&self, canonical: &str) -> Option<&'a str> {
        self.bound.value(canonical, self.row)
    }

    /// Row index within its batch
    #[must_use]
    pub const fn index(&self) -> usize {
        self.row
    }
}
