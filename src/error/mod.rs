//! Error handling for the perinatal risk pipeline.
//!
//! Only conditions that must abort a run are errors here. Per-row problems
//! (unmappable keys, malformed values) and clipping events are counted in the
//! [`DataQualityReport`](crate::quality::DataQualityReport) instead.

pub mod util;

use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

use crate::keys::KeyMappingError;

/// Specialized error type for the pipeline
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// An administrative code could not be mapped to a canonical key
    #[error("Key mapping error: {0}")]
    KeyMapping(#[from] KeyMappingError),

    /// A column the aggregation needs is absent from a source extract
    #[error("Schema error: source {source_name} has no column {column} (tried: {tried})")]
    Schema {
        /// Name of the source extract
        source_name: String,
        /// Canonical column name
        column: String,
        /// Every name that was looked up
        tried: String,
    },

    /// A model artifact could not be loaded
    #[error("Model unavailable: {artifact}: {reason}")]
    ModelUnavailable {
        /// Artifact file or logical name
        artifact: String,
        /// Why loading failed
        reason: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error opening or reading a file
    #[error("IO error on {path}: {source}")]
    Io {
        /// Path involved in the failed operation
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Error processing Arrow data
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error processing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Error converting records to or from Arrow
    #[error("Serde arrow error: {0}")]
    SerdeArrow(#[from] serde_arrow::Error),

    /// JSON artifact error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PipelineError {
    /// Wrap an IO error with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a `ModelUnavailable` error
    pub fn model_unavailable(artifact: impl Into<String>, reason: impl ToString) -> Self {
        Self::ModelUnavailable {
            artifact: artifact.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error must abort the pipeline
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::KeyMapping(_) | Self::ModelUnavailable { .. })
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
