use pretty_assertions::assert_eq;

use crate::utils::feature_row;
use perinatal_risk::config::RiskConfig;
use perinatal_risk::{
    Classification, FeatureTable, HybridRiskClassifier, MunicipalityYearFeatures, RiskThresholds,
};

/// A region where every municipality has the same mediocre profile
fn uniform_region(rows: u16, fetal_rate: f64) -> Vec<MunicipalityYearFeatures> {
    (1..=rows)
        .map(|m| {
            let mut row = feature_row(m);
            row.total_births = 500;
            row.reliable = true;
            row.fetal_mortality_rate = fetal_rate;
            row.pct_no_prenatal_care = 8.0;
            row.pct_low_birth_weight = 9.0;
            row.pct_preterm = 10.0;
            row.pct_cesarean = 35.0;
            row.obstetric_pressure = 120.0;
            row
        })
        .collect()
}

#[test]
fn test_critical_fetal_mortality_overrides_percentiles() {
    // all other indicators at the most favourable end of the region
    let mut rows = uniform_region(20, 60.0);
    let mut target = feature_row(400);
    target.total_births = 500;
    target.fetal_mortality_rate = 55.0;
    target.pct_cesarean = 35.0;
    target.obstetric_pressure = 10.0;
    rows.push(target.clone());

    let table = FeatureTable::new(rows);
    let classifier = HybridRiskClassifier::fit(&table, &RiskConfig::default());
    let assessment = classifier.assess(&target);

    assert_eq!(assessment.classification, Classification::Alto);
    assert!(assessment.risk_score >= 3);
}

#[test]
fn test_small_sample_excluded_regardless_of_indicators() {
    let table = FeatureTable::new(uniform_region(10, 5.0));
    let classifier = HybridRiskClassifier::fit(&table, &RiskConfig::default());

    let mut row = feature_row(500);
    row.total_births = 5;
    row.fetal_mortality_rate = 400.0;
    row.pct_no_prenatal_care = 100.0;
    let assessment = classifier.assess(&row);

    assert_eq!(assessment.classification, Classification::Excluded);
    assert_eq!(assessment.risk_score, -1);
    assert!(assessment.triggered.is_empty());
}

#[test]
fn test_thresholds_ignore_unreliable_rows() {
    let mut rows = uniform_region(8, 10.0);
    let mut tiny = feature_row(700);
    tiny.total_births = 3;
    tiny.fetal_mortality_rate = 333.0;
    rows.push(tiny);

    let table = FeatureTable::new(rows);
    let classifier = HybridRiskClassifier::fit(&table, &RiskConfig::default());
    assert!(classifier.is_adaptive());
    assert_eq!(classifier.thresholds().unwrap().fetal_mortality, 10.0);
}

#[test]
fn test_adaptive_thresholds_shift_with_the_region() {
    let mut row = feature_row(900);
    row.total_births = 500;
    row.fetal_mortality_rate = 20.0;
    row.pct_cesarean = 35.0;
    row.obstetric_pressure = 120.0;

    let mut calm = uniform_region(10, 10.0);
    calm.push(row.clone());
    let mut severe = uniform_region(10, 30.0);
    severe.push(row.clone());

    let config = RiskConfig::default();
    let in_calm = HybridRiskClassifier::fit(&FeatureTable::new(calm), &config).assess(&row);
    let in_severe = HybridRiskClassifier::fit(&FeatureTable::new(severe), &config).assess(&row);

    assert_eq!(in_calm.criteria_label(), "fetal_mortality");
    assert_eq!(in_severe.risk_score, 0);
}

#[test]
fn test_fixed_thresholds_pin_the_boundaries() {
    let fixed = RiskThresholds {
        fetal_mortality: 15.0,
        prenatal_gap: 20.0,
        low_birth_weight: 12.0,
        preterm: 14.0,
        cesarean: 20.0,
        obstetric_pressure: 200.0,
    };
    let config = RiskConfig {
        fixed_thresholds: Some(fixed),
        ..RiskConfig::default()
    };

    for fetal_rate in [5.0, 45.0] {
        let classifier =
            HybridRiskClassifier::fit(&FeatureTable::new(uniform_region(10, fetal_rate)), &config);
        assert!(!classifier.is_adaptive());
        assert_eq!(classifier.thresholds(), Some(&fixed));
    }
}

#[test]
fn test_no_reliable_rows_keeps_absolute_rules() {
    let mut row = feature_row(1);
    row.total_births = 12;
    row.fetal_mortality_rate = 80.0;
    row.pct_no_prenatal_care = 60.0;

    let config = RiskConfig {
        min_reliable_births: 1000,
        ..RiskConfig::default()
    };
    let classifier = HybridRiskClassifier::fit(&FeatureTable::new(vec![row.clone()]), &config);
    assert!(classifier.thresholds().is_none());
    assert_eq!(classifier.assess(&row).classification, Classification::Excluded);

    let relaxed = RiskConfig {
        min_reliable_births: 10,
        ..config
    };
    let classifier = HybridRiskClassifier::fit(&FeatureTable::default(), &relaxed);
    let assessment = classifier.assess(&row);
    assert_eq!(assessment.risk_score, 4);
    assert_eq!(
        assessment.criteria_label(),
        "critical_prenatal_gap;critical_fetal_mortality"
    );
}
