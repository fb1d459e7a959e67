//! Pipeline orchestration
//!
//! A [`Pipeline`] owns one validated configuration and runs the stages in
//! order: load and join the extracts into a [`FeatureTable`], classify it,
//! train the quantile ensemble and score every row. Each stage writes its
//! outputs under the configured directories. [`Predictor`] is the read-only
//! interface for consumers that need a forecast and a class for one row.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use arrow::array::{ArrayRef, Float64Array, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde::Serialize;

use crate::algorithm::forecast::{
    BandSource, Forecaster, QuantileForecast, TrainingOutcome, load_forecaster, save_artifacts,
    train_ensemble, write_importance_csv,
};
use crate::algorithm::risk::{Classification, HybridRiskClassifier, RiskAssessment};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::features::{FeatureSources, FeatureTable, FeatureTableBuilder, MunicipalityYearFeatures};
use crate::quality::DataQualityReport;
use crate::utils::io::write_csv;
use crate::utils::logging::{log_operation_complete, log_operation_start};

pub const FEATURES_FILE: &str = "features.csv";
pub const FORECASTS_FILE: &str = "forecasts.csv";
pub const IMPORTANCE_FILE: &str = "feature_importance.csv";
pub const QUALITY_FILE: &str = "data_quality.json";

/// Feature table of one run with its classification
#[derive(Debug, Clone)]
pub struct ClassifiedTable {
    pub table: FeatureTable,
    pub classifier: HybridRiskClassifier,
    /// One assessment per row, in table order
    pub assessments: Vec<RiskAssessment>,
}

/// Forecast and class of one municipality-year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    pub band_source: BandSource,
    /// Whether the band came from the heuristic fallback
    pub degraded: bool,
    pub classification: Classification,
    pub risk_score: i32,
}

impl Prediction {
    fn new(forecast: QuantileForecast, assessment: &RiskAssessment) -> Self {
        Self {
            p10: forecast.p10,
            p50: forecast.p50,
            p90: forecast.p90,
            band_source: forecast.source,
            degraded: forecast.is_degraded(),
            classification: assessment.classification,
            risk_score: assessment.risk_score,
        }
    }
}

/// Scaling, inference, post-processing and classification behind one call
///
/// Consumers never see raw model outputs or re-implement ordering.
#[derive(Debug, Clone)]
pub struct Predictor {
    classifier: HybridRiskClassifier,
    forecaster: Forecaster,
}

impl Predictor {
    #[must_use]
    pub const fn new(classifier: HybridRiskClassifier, forecaster: Forecaster) -> Self {
        Self {
            classifier,
            forecaster,
        }
    }

    /// Whether forecasts come from the heuristic fallback
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.forecaster.is_degraded()
    }

    #[must_use]
    pub const fn classifier(&self) -> &HybridRiskClassifier {
        &self.classifier
    }

    /// Forecast band and risk class for one feature row
    #[must_use]
    pub fn predict(&self, row: &MunicipalityYearFeatures) -> Prediction {
        Prediction::new(self.forecaster.forecast(row), &self.classifier.assess(row))
    }
}

/// What a run produced
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub municipality_years: usize,
    pub reliable: usize,
    pub alto: usize,
    pub bajo: usize,
    pub excluded: usize,
    /// Set once forecasts were produced
    pub degraded_forecasts: Option<bool>,
    pub outputs: Vec<PathBuf>,
}

impl RunSummary {
    fn from_classified(classified: &ClassifiedTable) -> Self {
        let count = |class| {
            classified
                .assessments
                .iter()
                .filter(|a| a.classification == class)
                .count()
        };
        Self {
            municipality_years: classified.table.len(),
            reliable: classified.table.reliable_rows().count(),
            alto: count(Classification::Alto),
            bajo: count(Classification::Bajo),
            excluded: count(Classification::Excluded),
            degraded_forecasts: None,
            outputs: Vec::new(),
        }
    }
}

/// Batch pipeline over one configuration
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline, validating the configuration first
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn output_path(&self, file: &str) -> PathBuf {
        self.config.output.directory.join(file)
    }

    /// Load every extract and build the feature table
    pub fn build_features(&self, quality: &mut DataQualityReport) -> Result<FeatureTable> {
        let sources = FeatureSources::load(&self.config, quality)?;
        Ok(FeatureTableBuilder::new(&self.config).build(&sources, quality))
    }

    /// Fit the classifier on `table` and assess every row
    #[must_use]
    pub fn classify(&self, table: FeatureTable, quality: &mut DataQualityReport) -> ClassifiedTable {
        let classifier = HybridRiskClassifier::fit(&table, &self.config.risk);
        let assessments = classifier.assess_all(&table);

        quality.thresholds = classifier.thresholds().copied();
        quality.adaptive_thresholds = classifier.is_adaptive();
        quality.classifications.clear();
        for assessment in &assessments {
            *quality
                .classifications
                .entry(assessment.classification.as_str().to_string())
                .or_default() += 1;
        }

        ClassifiedTable {
            table,
            classifier,
            assessments,
        }
    }

    /// Write the classified feature table
    pub fn write_features(&self, classified: &ClassifiedTable) -> Result<Vec<PathBuf>> {
        let path = self.output_path(FEATURES_FILE);
        let parquet = self.config.output.write_parquet;
        classified
            .table
            .write(&path, Some(&classified.assessments), parquet)?;
        let mut written = vec![path.clone()];
        if parquet {
            written.push(path.with_extension("parquet"));
        }
        Ok(written)
    }

    /// Write the data-quality report and log its summary
    pub fn write_quality(&self, quality: &DataQualityReport) -> Result<PathBuf> {
        quality.log_summary();
        let path = self.output_path(QUALITY_FILE);
        quality.write_json(&path)?;
        Ok(path)
    }

    /// Build, classify and write the feature table
    pub fn build(&self, quality: &mut DataQualityReport) -> Result<(ClassifiedTable, RunSummary)> {
        let table = self.build_features(quality)?;
        let classified = self.classify(table, quality);
        let mut summary = RunSummary::from_classified(&classified);
        summary.outputs = self.write_features(&classified)?;
        Ok((classified, summary))
    }

    /// Train the ensemble and write its artifacts and feature ranking
    pub fn train(&self, table: &FeatureTable) -> Result<(TrainingOutcome, Vec<PathBuf>)> {
        let models_dir = &self.config.output.models_directory;
        log_operation_start("Training quantile ensemble into", models_dir);

        let outcome = train_ensemble(table, &self.config)?;
        let mut written = save_artifacts(models_dir, &outcome.ensemble, &outcome.manifest)?;
        let importance = self.output_path(IMPORTANCE_FILE);
        write_importance_csv(&importance, &outcome.importance)?;
        written.push(importance);
        Ok((outcome, written))
    }

    /// Forecaster from the models directory, heuristic when unavailable
    #[must_use]
    pub fn load_forecaster(&self) -> Forecaster {
        load_forecaster(&self.config.output.models_directory, &self.config.forecast)
    }

    /// Forecast every row and write `forecasts.csv`
    pub fn score(
        &self,
        classified: &ClassifiedTable,
        forecaster: &Forecaster,
        quality: &mut DataQualityReport,
    ) -> Result<(Vec<QuantileForecast>, PathBuf)> {
        let start = Instant::now();
        let forecasts: Vec<QuantileForecast> = classified
            .table
            .rows()
            .iter()
            .map(|row| forecaster.forecast(row))
            .collect();

        quality.forecast_sources.clear();
        for forecast in &forecasts {
            *quality
                .forecast_sources
                .entry(forecast.source.as_str().to_string())
                .or_default() += 1;
        }

        let path = self.output_path(FORECASTS_FILE);
        write_forecasts(&path, classified, &forecasts)?;
        log_operation_complete("scored", &path, forecasts.len(), Some(start.elapsed()));
        Ok((forecasts, path))
    }

    /// Every stage: build, classify, train, score
    ///
    /// Too little data to train leaves forecasting to the heuristic band
    /// instead of failing the run.
    pub fn run(&self, quality: &mut DataQualityReport) -> Result<RunSummary> {
        let (classified, mut summary) = self.build(quality)?;

        let forecaster = match self.train(&classified.table) {
            Ok((outcome, written)) => {
                summary.outputs.extend(written);
                Forecaster::calibrated(outcome.ensemble, &self.config.forecast)
            }
            Err(e @ PipelineError::ModelUnavailable { .. }) => {
                log::warn!("{e}; forecasts fall back to the heuristic band");
                Forecaster::heuristic(&self.config.forecast)
            }
            Err(e) => return Err(e),
        };

        let (_, forecasts) = self.score(&classified, &forecaster, quality)?;
        summary.outputs.push(forecasts);
        summary.degraded_forecasts = Some(forecaster.is_degraded());
        summary.outputs.push(self.write_quality(quality)?);
        Ok(summary)
    }

    /// Predictor over a classified table and the stored models
    #[must_use]
    pub fn predictor(&self, classified: &ClassifiedTable) -> Predictor {
        Predictor::new(classified.classifier.clone(), self.load_forecaster())
    }
}

/// Write the scored rows, in table order
fn write_forecasts(
    path: &Path,
    classified: &ClassifiedTable,
    forecasts: &[QuantileForecast],
) -> Result<()> {
    let rows = classified.table.rows();
    let assessments = &classified.assessments;
    if assessments.len() != rows.len() || forecasts.len() != rows.len() {
        return Err(PipelineError::Config(format!(
            "{} rows, {} assessments and {} forecasts to write",
            rows.len(),
            assessments.len(),
            forecasts.len()
        )));
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("region_code", DataType::Utf8, false),
        Field::new("municipality_code", DataType::Utf8, false),
        Field::new("year", DataType::Int32, false),
        Field::new("p10", DataType::Float64, false),
        Field::new("p50", DataType::Float64, false),
        Field::new("p90", DataType::Float64, false),
        Field::new("band_source", DataType::Utf8, false),
        Field::new("classification", DataType::Utf8, false),
        Field::new("risk_score", DataType::Int32, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|row| row.region_code.to_string()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|row| row.municipality_code.to_string()),
        )),
        Arc::new(Int32Array::from_iter_values(rows.iter().map(|row| row.year))),
        Arc::new(Float64Array::from_iter_values(forecasts.iter().map(|f| f.p10))),
        Arc::new(Float64Array::from_iter_values(forecasts.iter().map(|f| f.p50))),
        Arc::new(Float64Array::from_iter_values(forecasts.iter().map(|f| f.p90))),
        Arc::new(StringArray::from_iter_values(
            forecasts.iter().map(|f| f.source.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            assessments.iter().map(|a| a.classification.as_str()),
        )),
        Arc::new(Int32Array::from_iter_values(
            assessments.iter().map(|a| a.risk_score),
        )),
    ];
    write_csv(path, &[RecordBatch::try_new(schema, columns)?])
}
