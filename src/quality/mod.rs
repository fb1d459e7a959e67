//! Data-quality accounting for one pipeline run
//!
//! Per-row problems never abort a run. They are counted here and written
//! next to the feature table as `data_quality.json`, because they decide how
//! far the classification can be trusted: rows dropped per source and reason,
//! columns found through a fallback name, values clipped or imputed per
//! indicator, and municipality-years excluded for small samples.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::algorithm::risk::RiskThresholds;
use crate::error::Result;
use crate::error::util::write_string;
use crate::schema::{LookupStrategy, ResolvedColumns};
use crate::utils::logging::log_counts;

/// Row accounting for one source extract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceQuality {
    /// Data rows read from the extract
    pub rows_read: usize,
    /// Rows that produced a record
    pub rows_kept: usize,
    /// Valid rows outside the configured regions or years
    pub out_of_scope: usize,
    /// Rows dropped because their key could not be mapped, by reason
    pub dropped_keys: BTreeMap<String, usize>,
    /// Rows skipped because a value was unusable, by reason
    pub malformed: BTreeMap<String, usize>,
    /// Aggregated keys with no matching births row
    pub orphan_keys: usize,
    /// Optional columns absent from the extract
    pub missing_optional_columns: Vec<String>,
}

impl SourceQuality {
    /// Rows dropped for any reason other than scope
    #[must_use]
    pub fn rows_dropped(&self) -> usize {
        self.dropped_keys.values().sum::<usize>() + self.malformed.values().sum::<usize>()
    }
}

/// A column found under a non-canonical name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnFallback {
    /// Source extract
    pub source: String,
    /// Canonical column name
    pub column: String,
    /// Name as written in the extract
    pub found_as: String,
    /// Lookup step that matched
    pub strategy: LookupStrategy,
}

/// Aggregate data-quality counts reported alongside the feature table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataQualityReport {
    /// Row accounting per source
    pub sources: BTreeMap<String, SourceQuality>,
    /// Columns resolved through an alias or case-insensitive match
    pub column_fallbacks: Vec<ColumnFallback>,
    /// Values clipped to plausibility bounds, per indicator
    pub clipped_values: BTreeMap<String, usize>,
    /// Missing values imputed, per indicator
    pub imputed_values: BTreeMap<String, usize>,
    /// Rows in the feature table
    pub municipality_years: usize,
    /// Rows below the minimum reliable sample
    pub excluded_municipality_years: usize,
    /// Rows per classification label
    pub classifications: BTreeMap<String, usize>,
    /// Thresholds the classifier used in this run
    pub thresholds: Option<RiskThresholds>,
    /// Whether the thresholds were recomputed from this run's data
    pub adaptive_thresholds: bool,
    /// Forecasts per band source
    pub forecast_sources: BTreeMap<String, usize>,
}

impl DataQualityReport {
    /// Create an empty report
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutable accounting for a source, created on first use
    pub fn source_mut(&mut self, source: &str) -> &mut SourceQuality {
        self.sources.entry(source.to_string()).or_default()
    }

    /// Record fallback and missing-column outcomes of a column lookup
    pub fn record_columns(&mut self, source: &str, resolved: &ResolvedColumns) {
        for column in resolved.fallbacks() {
            let fallback = ColumnFallback {
                source: source.to_string(),
                column: column.spec.canonical.to_string(),
                found_as: column.found_as.clone(),
                strategy: column.strategy.clone(),
            };
            if !self.column_fallbacks.contains(&fallback) {
                self.column_fallbacks.push(fallback);
            }
        }
        let quality = self.source_mut(source);
        for missing in resolved.missing_optional() {
            if !quality.missing_optional_columns.iter().any(|m| m == missing) {
                quality.missing_optional_columns.push((*missing).to_string());
            }
        }
    }

    /// Add clip events for an indicator
    pub fn record_clips(&mut self, indicator: &str, count: usize) {
        if count > 0 {
            *self.clipped_values.entry(indicator.to_string()).or_default() += count;
        }
    }

    /// Add imputations for an indicator
    pub fn record_imputations(&mut self, indicator: &str, count: usize) {
        if count > 0 {
            *self.imputed_values.entry(indicator.to_string()).or_default() += count;
        }
    }

    /// Total rows dropped across sources
    #[must_use]
    pub fn total_rows_dropped(&self) -> usize {
        self.sources.values().map(SourceQuality::rows_dropped).sum()
    }

    /// Total clip events across indicators
    #[must_use]
    pub fn total_clipped(&self) -> usize {
        self.clipped_values.values().sum()
    }

    /// Log the report once, as summaries
    pub fn log_summary(&self) {
        for (name, source) in &self.sources {
            log::info!(
                "{}: kept {} of {} rows ({} out of scope, {} dropped)",
                name,
                source.rows_kept,
                source.rows_read,
                source.out_of_scope,
                source.rows_dropped()
            );
            log_counts(&format!("{name}: dropped keys"), &source.dropped_keys);
            log_counts(&format!("{name}: malformed rows"), &source.malformed);
            if source.orphan_keys > 0 {
                log::warn!(
                    "{}: {} municipality-years have no births and were not joined",
                    name,
                    source.orphan_keys
                );
            }
        }
        log_counts("clipped values", &self.clipped_values);
        log_counts("imputed values", &self.imputed_values);
        if self.excluded_municipality_years > 0 {
            log::warn!(
                "{} of {} municipality-years excluded as unreliable",
                self.excluded_municipality_years,
                self.municipality_years
            );
        }
    }

    /// Write the report as pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_string(path, &json)
    }
}
