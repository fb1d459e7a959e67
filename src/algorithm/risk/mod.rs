//! Hybrid risk classification of municipality-years

pub mod classifier;
pub mod thresholds;

pub use classifier::{
    Classification, EXCLUDED_SCORE, HybridRiskClassifier, RiskAssessment, RiskCriterion,
};
pub use thresholds::RiskThresholds;
