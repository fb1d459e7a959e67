use proptest::prelude::*;

use crate::utils::feature_row;
use perinatal_risk::algorithm::forecast::{
    BandSource, ForecastBounds, Forecaster, QuantileEnsemble, QuantileRegressor, RobustScaler,
};
use perinatal_risk::config::{ForecastConfig, RiskConfig};
use perinatal_risk::features::{FORECAST_FEATURES, Indicator};
use perinatal_risk::pipeline::Predictor;
use perinatal_risk::{Classification, FeatureTable, HybridRiskClassifier};

const EPS: f64 = 1e-9;

fn bounds() -> ForecastBounds {
    ForecastBounds::new(&ForecastConfig::default(), Some(80.0))
}

/// Ensemble whose models ignore their inputs and return fixed values
fn constant_ensemble(p10: f64, p50: f64, p90: f64) -> QuantileEnsemble {
    let width = FORECAST_FEATURES.len();
    let model = |tau, bias| QuantileRegressor {
        tau,
        weights: vec![0.0; width],
        bias,
    };
    QuantileEnsemble::new(
        FORECAST_FEATURES.to_vec(),
        RobustScaler {
            center: vec![0.0; width],
            scale: vec![1.0; width],
        },
        [model(0.1, p10), model(0.5, p50), model(0.9, p90)],
        bounds(),
    )
    .unwrap()
}

proptest! {
    #[test]
    fn repaired_band_is_always_valid(
        a in -1000.0..1000.0f64,
        b in -1000.0..1000.0f64,
        c in -1000.0..1000.0f64,
        neonatal in 0.0..300.0f64,
    ) {
        let bounds = bounds();
        let [p10, p50, p90] = bounds.repair([a, b, c], neonatal);
        prop_assert!(p10 >= 0.0);
        prop_assert!(p10 <= p50 && p50 <= p90, "{} {} {}", p10, p50, p90);
        prop_assert!(p90 - p10 >= bounds.min_width - EPS);
        prop_assert!(p10 >= neonatal);
        prop_assert!(p10 >= bounds.floor);
    }

    #[test]
    fn inverted_models_still_give_ordered_forecasts(
        low in 0.0..100.0f64,
        gap in 0.0..50.0f64,
        neonatal in 0.0..40.0f64,
    ) {
        // the p10 model predicts the largest value, the p90 model the smallest
        let ensemble = constant_ensemble(low + 2.0 * gap, low + gap, low);
        let mut row = feature_row(1);
        row.neonatal_mortality_rate = neonatal;
        let forecast = ensemble.forecast(&row).unwrap();

        prop_assert_eq!(forecast.source, BandSource::Calibrated);
        prop_assert!(forecast.p10 <= forecast.p50 && forecast.p50 <= forecast.p90);
        prop_assert!(forecast.width() >= 2.0 - EPS);
        prop_assert!(forecast.p10 >= neonatal);
    }
}

#[test]
fn test_zero_width_output_is_widened_around_p50() {
    let forecast = constant_ensemble(20.0, 20.0, 20.0)
        .forecast(&feature_row(1))
        .unwrap();
    assert_eq!(forecast.p50, 20.0);
    assert!((forecast.p10 - 19.0).abs() < EPS);
    assert!((forecast.p90 - 21.0).abs() < EPS);
}

#[test]
fn test_p90_capped_at_observed_maximum() {
    let forecast = constant_ensemble(10.0, 30.0, 500.0)
        .forecast(&feature_row(1))
        .unwrap();
    assert_eq!(forecast.p90, 80.0);
    assert_eq!(forecast.p10, 10.0);
}

#[test]
fn test_feature_order_is_preserved() {
    let width = FORECAST_FEATURES.len();
    let mut weights = vec![0.0; width];
    let preterm = FORECAST_FEATURES
        .iter()
        .position(|f| *f == Indicator::PctPreterm)
        .unwrap();
    weights[preterm] = 2.0;
    let model = |tau| QuantileRegressor {
        tau,
        weights: weights.clone(),
        bias: 5.0,
    };
    let ensemble = QuantileEnsemble::new(
        FORECAST_FEATURES.to_vec(),
        RobustScaler {
            center: vec![0.0; width],
            scale: vec![1.0; width],
        },
        [model(0.1), model(0.5), model(0.9)],
        bounds(),
    )
    .unwrap();

    let mut row = feature_row(1);
    row.pct_preterm = 10.0;
    row.pct_cesarean = 90.0;
    assert_eq!(ensemble.forecast(&row).unwrap().p50, 25.0);
}

#[test]
fn test_predictor_reports_degraded_band() {
    let config = ForecastConfig::default();
    let classifier = HybridRiskClassifier::fit(&FeatureTable::default(), &RiskConfig::default());
    let predictor = Predictor::new(classifier, Forecaster::heuristic(&config));
    assert!(predictor.is_degraded());

    let mut row = feature_row(1);
    row.total_births = 200;
    row.infant_mortality_rate = 30.0;
    row.neonatal_mortality_rate = 20.0;
    row.fetal_mortality_rate = 60.0;
    let prediction = predictor.predict(&row);

    assert!(prediction.degraded);
    assert_eq!(prediction.band_source, BandSource::Heuristic);
    assert_eq!(prediction.p50, 30.0);
    assert!(prediction.p10 >= 20.0);
    assert!(prediction.p10 <= prediction.p50 && prediction.p50 <= prediction.p90);
    assert_eq!(prediction.classification, Classification::Alto);
    assert_eq!(prediction.risk_score, 3);
}
