//! Source adapters and the generic extract loader
//!
//! Each administrative extract has its own column names and encodings. A
//! [`SourceAdapter`] declares the columns it needs and turns one raw row into
//! a typed record with a canonical key. [`load_source`] runs any adapter over
//! an extract and does the bookkeeping: column resolution, scope filtering,
//! and counting of dropped rows in the [`DataQualityReport`].
//!
//! Available sources:
//! - births: live births, one row per birth
//! - fetal deaths: one row per fetal death
//! - infant deaths: non-fetal deaths, restricted to the first year of life
//! - facilities: health-facility registry (undated)
//! - services: service-utilization log, one row per service line
//! - gazetteer: municipality names and coordinates (optional)

pub mod births;
pub mod facilities;
pub mod fetal_deaths;
pub mod gazetteer;
pub mod infant_deaths;
pub mod services;

use std::fmt;
use std::path::Path;
use std::time::Instant;

use crate::error::Result;
use crate::keys::{KeyMappingError, KeyNormalizer, KeyScope};
use crate::quality::DataQualityReport;
use crate::schema::{ColumnResolver, ColumnSpec};
use crate::utils::arrow::{BoundColumns, RawRow};
use crate::utils::io::read_extract;
use crate::utils::logging::{create_rows_progress_bar, finish_progress_bar};

pub use births::{BirthCodes, BirthRecord, BirthsAdapter};
pub use facilities::{FacilitiesAdapter, FacilityRecord};
pub use fetal_deaths::{FetalDeathRecord, FetalDeathsAdapter};
pub use gazetteer::{GazetteerAdapter, GazetteerEntry};
pub use infant_deaths::{InfantDeathRecord, InfantDeathsAdapter};
pub use services::{ServiceCategory, ServiceRecord, ServicesAdapter};

/// Individual rejections logged per source before switching to counts only
const MAX_LOGGED_REJECTIONS: usize = 5;

/// The administrative extracts the pipeline reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    /// Live births
    Births,
    /// Fetal deaths
    FetalDeaths,
    /// Non-fetal deaths under one year
    InfantDeaths,
    /// Health-facility registry
    Facilities,
    /// Service-utilization log
    Services,
    /// Municipality names and coordinates
    Gazetteer,
}

impl Source {
    /// Stable name used in logs and the quality report
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Births => "births",
            Self::FetalDeaths => "fetal_deaths",
            Self::InfantDeaths => "infant_deaths",
            Self::Facilities => "facilities",
            Self::Services => "services",
            Self::Gazetteer => "gazetteer",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a row produced no record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowRejection {
    /// The row's identity could not be established
    #[error(transparent)]
    Key(#[from] KeyMappingError),
    /// A field the record cannot do without was unusable
    #[error("malformed row: {0}")]
    Malformed(&'static str),
}

/// Converts raw rows of one source into typed records
pub trait SourceAdapter {
    /// Typed record produced per row
    type Record;

    /// Which source this adapter reads
    fn source(&self) -> Source;

    /// Columns the adapter reads
    fn columns(&self) -> &'static [ColumnSpec];

    /// Convert one row
    ///
    /// Returns [`KeyScope::OutOfScope`] for valid rows outside the configured
    /// regions or years.
    fn adapt(
        &self,
        row: &RawRow<'_>,
        keys: &KeyNormalizer,
    ) -> std::result::Result<KeyScope<Self::Record>, RowRejection>;
}

/// Read an extract and adapt every row
///
/// A missing required column aborts with a schema error. Rejected rows are
/// counted in `quality` and the rest of the extract is processed.
pub fn load_source<A: SourceAdapter>(
    adapter: &A,
    path: &Path,
    keys: &KeyNormalizer,
    quality: &mut DataQualityReport,
) -> Result<Vec<A::Record>> {
    let start = Instant::now();
    let source = adapter.source();
    let extract = read_extract(path)?;
    let batches = extract.batches;

    let resolver = ColumnResolver::new(source.name());
    let schema = match batches.first() {
        Some(batch) => batch.schema(),
        None => std::sync::Arc::new(arrow::datatypes::Schema::empty()),
    };
    let resolved = resolver.resolve(&schema, adapter.columns())?;
    quality.record_columns(source.name(), &resolved);

    let total_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    let pb = create_rows_progress_bar(total_rows as u64, source.name());

    let stats = quality.source_mut(source.name());
    if extract.overlong_rows > 0 {
        stats.rows_read += extract.overlong_rows;
        *stats.malformed.entry("extra_fields".to_string()).or_default() += extract.overlong_rows;
    }
    let mut records = Vec::with_capacity(total_rows);
    let mut logged = 0;

    for batch in &batches {
        let bound = BoundColumns::bind(batch, &resolved)?;
        for index in 0..bound.num_rows() {
            let row = bound.row(index);
            stats.rows_read += 1;
            match adapter.adapt(&row, keys) {
                Ok(KeyScope::InScope(record)) => {
                    stats.rows_kept += 1;
                    records.push(record);
                }
                Ok(KeyScope::OutOfScope) => stats.out_of_scope += 1,
                Err(rejection) => {
                    if logged < MAX_LOGGED_REJECTIONS {
                        log::debug!("{source}: skipping row {index}: {rejection}");
                        logged += 1;
                    }
                    let (bucket, kind) = match &rejection {
                        RowRejection::Key(err) => (&mut stats.dropped_keys, err.kind()),
                        RowRejection::Malformed(reason) => (&mut stats.malformed, *reason),
                    };
                    *bucket.entry(kind.to_string()).or_default() += 1;
                }
            }
        }
        pb.inc(bound.num_rows() as u64);
    }
    finish_progress_bar(&pb, None);

    log::info!(
        "Loaded {} {} records from {} in {:?}",
        records.len(),
        source,
        path.display(),
        start.elapsed()
    );
    Ok(records)
}
