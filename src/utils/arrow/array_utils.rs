//! Utilities for working with Arrow arrays.
//!
//! This module provides utility functions for safely extracting data from
//! Arrow arrays with clear errors when a column has an unexpected type.

use arrow::array::{Array, ArrayRef};
use arrow::compute::kernels::cast;
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::error::Result;

/// Get a column by index, cast to `expected_type` when it differs
///
/// # Arguments
///
/// * `batch` - The record batch containing the column
/// * `index` - Column index in the batch schema
/// * `expected_type` - The data type the caller reads
pub fn get_column(batch: &RecordBatch, index: usize, expected_type: &DataType) -> Result<ArrayRef> {
    if index >= batch.num_columns() {
        return Err(ArrowError::SchemaError(format!(
            "column index {index} out of range for batch with {} columns",
            batch.num_columns()
        ))
        .into());
    }
    let column = batch.column(index);
    if column.data_type() == expected_type {
        return Ok(column.clone());
    }
    log::debug!(
        "Converting column '{}' from {:?} to {:?}",
        batch.schema().field(index).name(),
        column.data_type(),
        expected_type
    );
    Ok(cast::cast(column, expected_type)?)
}

/// Downcast a column to a specific array type with clear error messages
///
/// # Type Parameters
///
/// * `A` - The target array type to downcast to
///
/// # Arguments
///
/// * `array` - The array reference to downcast
/// * `column_name` - The name of the column (for error messages)
/// * `expected_type_name` - A human-readable name of the expected type (for error messages)
pub fn downcast_array<'a, A: Array + 'static>(
    array: &'a ArrayRef,
    column_name: &str,
    expected_type_name: &str,
) -> Result<&'a A> {
    array.as_any().downcast_ref::<A>().ok_or_else(|| {
        ArrowError::CastError(format!(
            "column '{column_name}' is {:?}, expected {expected_type_name}",
            array.data_type()
        ))
        .into()
    })
}
