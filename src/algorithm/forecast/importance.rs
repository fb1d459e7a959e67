//! Feature ranking of the median model
//!
//! Inputs are robust-scaled, so coefficient magnitudes are comparable. The
//! ranking is |w| of the p50 model normalised to sum to 1.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::algorithm::forecast::QuantileEnsemble;
use crate::error::Result;
use crate::features::Indicator;
use crate::utils::io::write_csv;

/// Share of the median model's weight carried by one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: Indicator,
    pub importance: f64,
}

/// Rank the ensemble's features, most important first
#[must_use]
pub fn feature_importance(ensemble: &QuantileEnsemble) -> Vec<FeatureImportance> {
    let weights = &ensemble.models()[1].weights;
    let total: f64 = weights.iter().map(|w| w.abs()).sum();

    let mut ranking: Vec<FeatureImportance> = ensemble
        .features()
        .iter()
        .zip(weights)
        .map(|(&feature, weight)| FeatureImportance {
            feature,
            importance: if total > 0.0 { weight.abs() / total } else { 0.0 },
        })
        .collect();
    ranking.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranking
}

/// Write the ranking as `rank,feature,importance`
#[allow(clippy::cast_possible_truncation)]
pub fn write_importance_csv(path: &Path, ranking: &[FeatureImportance]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("rank", DataType::UInt32, false),
        Field::new("feature", DataType::Utf8, false),
        Field::new("importance", DataType::Float64, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt32Array::from_iter_values(1..=ranking.len() as u32)),
        Arc::new(StringArray::from_iter_values(
            ranking.iter().map(|r| r.feature.name()),
        )),
        Arc::new(Float64Array::from_iter_values(
            ranking.iter().map(|r| r.importance),
        )),
    ];
    let batch = RecordBatch::try_new(schema, columns)?;
    write_csv(path, &[batch])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::forecast::{ForecastBounds, QuantileRegressor, RobustScaler};
    use crate::config::ForecastConfig;

    #[test]
    fn test_ranking_normalised_and_sorted() {
        let model = |weights: Vec<f64>| QuantileRegressor {
            tau: 0.5,
            weights,
            bias: 0.0,
        };
        let ensemble = QuantileEnsemble::new(
            vec![
                Indicator::PctPreterm,
                Indicator::FetalMortalityRate,
                Indicator::PctCesarean,
            ],
            RobustScaler {
                center: vec![0.0; 3],
                scale: vec![1.0; 3],
            },
            [
                model(vec![9.0, 9.0, 9.0]),
                model(vec![1.0, -3.0, 0.0]),
                model(vec![0.0; 3]),
            ],
            ForecastBounds::new(&ForecastConfig::default(), None),
        )
        .unwrap();

        let ranking = feature_importance(&ensemble);
        assert_eq!(ranking[0].feature, Indicator::FetalMortalityRate);
        assert_eq!(ranking[0].importance, 0.75);
        assert_eq!(ranking[1].importance, 0.25);
        assert_eq!(ranking[2].importance, 0.0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feature_importance.csv");
        write_importance_csv(&path, &ranking).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("rank,feature,importance\n1,fetal_mortality_rate,0.75"));
    }
}
