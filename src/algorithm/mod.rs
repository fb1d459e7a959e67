//! Risk assessment on top of the feature table
//!
//! This module holds the two assessment subsystems: the rule-based hybrid
//! classifier and the quantile forecaster, plus the small statistics both
//! rely on.

pub mod forecast;
pub mod risk;
pub mod stats;
