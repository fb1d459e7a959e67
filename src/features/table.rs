//! The feature table and its Arrow/CSV/Parquet output
//!
//! Rows are converted to a [`RecordBatch`] with `serde_arrow`; the classifier
//! fields are appended as extra columns when assessments are supplied.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, FieldRef, Schema};
use arrow::record_batch::RecordBatch;
use serde_arrow::schema::{SchemaLike, TracingOptions};

use crate::algorithm::risk::RiskAssessment;
use crate::error::{PipelineError, Result};
use crate::features::{Indicator, MunicipalityYearFeatures};
use crate::keys::{MunicipalityCode, MunicipalityYearKey, RegionCode};
use crate::utils::io::{write_csv, write_parquet};

/// Read-only municipality-year table, ordered by key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    rows: Vec<MunicipalityYearFeatures>,
}

impl FeatureTable {
    /// Create a table, ordering rows by key
    #[must_use]
    pub fn new(mut rows: Vec<MunicipalityYearFeatures>) -> Self {
        rows.sort_by_key(MunicipalityYearFeatures::key);
        Self { rows }
    }

    /// All rows
    #[must_use]
    pub fn rows(&self) -> &[MunicipalityYearFeatures] {
        &self.rows
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row for a municipality-year
    #[must_use]
    pub fn get(&self, key: &MunicipalityYearKey) -> Option<&MunicipalityYearFeatures> {
        self.rows
            .binary_search_by_key(key, MunicipalityYearFeatures::key)
            .ok()
            .map(|index| &self.rows[index])
    }

    /// Rows flagged reliable
    pub fn reliable_rows(&self) -> impl Iterator<Item = &MunicipalityYearFeatures> {
        self.rows.iter().filter(|row| row.reliable)
    }

    /// One indicator over every row
    #[must_use]
    pub fn column(&self, indicator: Indicator) -> Vec<f64> {
        self.rows.iter().map(|row| indicator.value(row)).collect()
    }

    /// Convert to a record batch, appending classifier columns when given
    ///
    /// `assessments` must be in table order.
    pub fn to_record_batch(&self, assessments: Option<&[RiskAssessment]>) -> Result<RecordBatch> {
        let placeholder: Vec<MunicipalityYearFeatures> = placeholder_row().into_iter().collect();
        let samples = if self.rows.is_empty() {
            placeholder.as_slice()
        } else {
            self.rows.as_slice()
        };

        let fields: Vec<FieldRef> =
            Vec::<FieldRef>::from_samples(samples, TracingOptions::default().allow_null_fields(true))?
                .into_iter()
                .map(concrete_field)
                .collect();
        let batch = serde_arrow::to_record_batch(&fields, &self.rows)?;

        match assessments {
            Some(assessments) => append_assessments(&batch, assessments),
            None => Ok(batch),
        }
    }

    /// Write the table as CSV and, when asked, Parquet next to it
    pub fn write(
        &self,
        csv_path: &Path,
        assessments: Option<&[RiskAssessment]>,
        parquet: bool,
    ) -> Result<()> {
        let batch = self.to_record_batch(assessments)?;
        write_csv(csv_path, std::slice::from_ref(&batch))?;
        if parquet {
            write_parquet(&csv_path.with_extension("parquet"), &[batch])?;
        }
        Ok(())
    }
}

/// Row used to trace the schema of an empty table
fn placeholder_row() -> Option<MunicipalityYearFeatures> {
    Some(MunicipalityYearFeatures::empty(MunicipalityYearKey {
        region: RegionCode::new(1)?,
        municipality: MunicipalityCode::new(1)?,
        year: 0,
    }))
}

/// Settle traced types: plain `Utf8` strings, and a concrete type for
/// columns that were `None` on every row
fn concrete_field(field: FieldRef) -> FieldRef {
    let data_type = match (field.data_type(), field.name().as_str()) {
        (DataType::Null, "latitude" | "longitude") => DataType::Float64,
        (DataType::Null | DataType::LargeUtf8, _) => DataType::Utf8,
        _ => return field,
    };
    Arc::new(Field::new(field.name(), data_type, field.is_nullable()))
}

fn append_assessments(batch: &RecordBatch, assessments: &[RiskAssessment]) -> Result<RecordBatch> {
    if assessments.len() != batch.num_rows() {
        return Err(PipelineError::Config(format!(
            "{} assessments for {} feature rows",
            assessments.len(),
            batch.num_rows()
        )));
    }

    let schema = batch.schema();
    let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
    fields.push(Arc::new(Field::new("risk_score", DataType::Int32, false)));
    fields.push(Arc::new(Field::new("classification", DataType::Utf8, false)));
    fields.push(Arc::new(Field::new("triggered_criteria", DataType::Utf8, false)));

    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    columns.push(Arc::new(Int32Array::from_iter_values(
        assessments.iter().map(|a| a.risk_score),
    )));
    columns.push(Arc::new(StringArray::from_iter_values(
        assessments.iter().map(|a| a.classification.as_str()),
    )));
    columns.push(Arc::new(StringArray::from_iter_values(
        assessments.iter().map(RiskAssessment::criteria_label),
    )));

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, StringArray as Strings};
    use crate::utils::arrow::downcast_array;

    fn row(municipality: u16, births: u32) -> MunicipalityYearFeatures {
        let mut row = MunicipalityYearFeatures::empty(MunicipalityYearKey {
            region: RegionCode::new(50).unwrap(),
            municipality: MunicipalityCode::new(municipality).unwrap(),
            year: 2024,
        });
        row.total_births = births;
        row.reliable = births >= 10;
        row
    }

    #[test]
    fn test_rows_sorted_and_found() {
        let table = FeatureTable::new(vec![row(150, 30), row(1, 100), row(6, 4)]);
        assert_eq!(table.rows()[0].municipality_code.value(), 1);
        assert_eq!(table.get(&row(6, 0).key()).unwrap().total_births, 4);
        assert!(table.get(&row(7, 0).key()).is_none());
        assert_eq!(table.reliable_rows().count(), 2);
        assert_eq!(table.column(Indicator::TotalBirths), vec![100.0, 4.0, 30.0]);
    }

    #[test]
    fn test_record_batch_with_assessments() {
        let table = FeatureTable::new(vec![row(1, 100), row(6, 4)]);
        let assessments = vec![
            RiskAssessment {
                risk_score: 0,
                classification: crate::algorithm::risk::Classification::Bajo,
                triggered: smallvec::SmallVec::new(),
            },
            RiskAssessment::excluded(),
        ];
        let batch = table.to_record_batch(Some(&assessments)).unwrap();
        assert_eq!(batch.num_rows(), 2);

        let schema = batch.schema();
        let codes = schema.index_of("municipality_code").unwrap();
        let codes = downcast_array::<Strings>(batch.column(codes), "municipality_code", "Utf8").unwrap();
        assert_eq!(codes.value(0), "001");
        assert_eq!(codes.value(1), "006");

        let class = schema.index_of("classification").unwrap();
        let class = downcast_array::<Strings>(batch.column(class), "classification", "Utf8").unwrap();
        assert_eq!(class.value(1), "EXCLUDED");
        assert!(batch.column(schema.index_of("municipality_name").unwrap()).is_null(0));

        assert!(table.to_record_batch(Some(&assessments[..1])).is_err());
    }

    #[test]
    fn test_empty_table_keeps_schema() {
        let batch = FeatureTable::default().to_record_batch(None).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert!(batch.schema().index_of("fragility_index").is_ok());
    }
}
