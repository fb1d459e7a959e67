//! A Rust library for fusing perinatal vital-statistics extracts into a
//! municipality-year indicator table, classifying each row with a hybrid
//! rule-based risk score and forecasting its infant mortality rate with a
//! quantile ensemble.

pub mod aggregate;
pub mod algorithm;
pub mod config;
pub mod error;
pub mod features;
pub mod keys;
pub mod pipeline;
pub mod quality;
pub mod registry;
pub mod schema;
pub mod utils;

// Re-export the most common types for easier use
// Core types
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use features::{FeatureTable, FeatureTableBuilder, Indicator, MunicipalityYearFeatures};
pub use keys::{KeyMappingError, KeyNormalizer, MunicipalityYearKey};
pub use pipeline::{Pipeline, Prediction, Predictor, RunSummary};
pub use quality::DataQualityReport;

// Risk assessment
pub use algorithm::forecast::{BandSource, Forecaster, QuantileEnsemble, QuantileForecast};
pub use algorithm::risk::{Classification, HybridRiskClassifier, RiskAssessment, RiskThresholds};

// Arrow types
pub use arrow::record_batch::RecordBatch;
