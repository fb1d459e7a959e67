use std::fs;
use std::path::Path;

use arrow::array::{Array, StringArray};
use pretty_assertions::assert_eq;

use crate::utils::{Extracts, HEALTHY_BIRTH, RISKY_BIRTH, config_for, raw_dir, regional_extracts};
use perinatal_risk::features::Indicator;
use perinatal_risk::pipeline::{FEATURES_FILE, FORECASTS_FILE, IMPORTANCE_FILE, QUALITY_FILE};
use perinatal_risk::utils::arrow::downcast_array;
use perinatal_risk::utils::io::read_table;
use perinatal_risk::{Classification, DataQualityReport, Pipeline, PipelineError};

/// Every value of a column of a written CSV, as text
fn read_column(path: &Path, name: &str) -> Vec<String> {
    let mut values = Vec::new();
    for batch in read_table(path).unwrap() {
        let index = batch.schema().index_of(name).unwrap();
        let column = downcast_array::<StringArray>(batch.column(index), name, "Utf8").unwrap();
        values.extend((0..column.len()).map(|i| column.value(i).to_string()));
    }
    values
}

#[test]
fn test_births_without_deaths_classify_bajo() {
    let root = tempfile::tempdir().unwrap();
    let mut extracts = Extracts::default();
    extracts.births("50", "50001", 2024, 100, HEALTHY_BIRTH);
    extracts.write(&raw_dir(root.path()));

    let pipeline = Pipeline::new(config_for(root.path())).unwrap();
    let mut quality = DataQualityReport::new();
    let (classified, summary) = pipeline.build(&mut quality).unwrap();

    assert_eq!(classified.table.len(), 1);
    let row = &classified.table.rows()[0];
    assert_eq!(row.key().to_string(), "50001/2024");
    assert_eq!(row.total_births, 100);
    assert_eq!(row.fetal_mortality_rate, 0.0);
    assert_eq!(row.total_deaths, 0);
    assert_eq!(classified.assessments[0].classification, Classification::Bajo);
    assert_eq!(summary.bajo, 1);

    // no institutions: a finite pressure of births per (at least one) institution
    assert!(row.obstetric_pressure.is_finite());
    assert_eq!(row.obstetric_pressure, 100.0);

    let features = root.path().join("output").join(FEATURES_FILE);
    assert_eq!(read_column(&features, "municipality_code"), vec!["001"]);
    assert_eq!(read_column(&features, "region_code"), vec!["50"]);
    assert_eq!(read_column(&features, "classification"), vec!["BAJO"]);
    assert_eq!(read_column(&features, "total_deaths"), vec!["0"]);
}

#[test]
fn test_feature_table_is_byte_identical_across_runs() {
    let root = tempfile::tempdir().unwrap();
    regional_extracts().write(&raw_dir(root.path()));

    let mut outputs = Vec::new();
    for run in ["first", "second"] {
        let mut config = config_for(root.path());
        config.output.directory = root.path().join(run);
        let pipeline = Pipeline::new(config).unwrap();
        pipeline.build(&mut DataQualityReport::new()).unwrap();
        outputs.push(fs::read(root.path().join(run).join(FEATURES_FILE)).unwrap());
    }
    assert!(!outputs[0].is_empty());
    assert!(outputs[0] == outputs[1], "feature tables differ between runs");
}

#[test]
fn test_indicators_respect_bounds() {
    let root = tempfile::tempdir().unwrap();
    let mut extracts = regional_extracts();
    // corrupt utilisation: far above the plausibility ceiling
    extracts.service("50", "010", 2023, 9_000_000, "Urgencias");
    extracts.write(&raw_dir(root.path()));

    let pipeline = Pipeline::new(config_for(root.path())).unwrap();
    let mut quality = DataQualityReport::new();
    let (classified, _) = pipeline.build(&mut quality).unwrap();

    for row in classified.table.rows() {
        for indicator in Indicator::ALL.iter().filter(|i| i.is_percentage()) {
            let value = indicator.value(row);
            assert!((0.0..=100.0).contains(&value), "{indicator} = {value} for {}", row.key());
        }
        assert!(row.fetal_mortality_rate >= 0.0);
        assert!(row.neonatal_mortality_rate >= 0.0);
        assert!(row.visits_per_birth <= 500.0);
        assert!(row.fragility_index.is_finite());
    }
    assert!(quality.total_clipped() > 0);
    assert!(quality.clipped_values.contains_key("visits_per_birth"));
}

#[test]
fn test_small_sample_is_excluded_not_dropped() {
    let root = tempfile::tempdir().unwrap();
    let mut extracts = regional_extracts();
    extracts.births("50", "606", 2023, 5, RISKY_BIRTH);
    extracts.fetal_deaths("50", "606", 2023, 3, 402);
    extracts.write(&raw_dir(root.path()));

    let pipeline = Pipeline::new(config_for(root.path())).unwrap();
    let mut quality = DataQualityReport::new();
    let (classified, summary) = pipeline.build(&mut quality).unwrap();

    assert_eq!(classified.table.len(), 13);
    assert_eq!(summary.excluded, 1);
    assert_eq!(quality.excluded_municipality_years, 1);
    assert_eq!(quality.classifications["EXCLUDED"], 1);

    let index = classified
        .table
        .rows()
        .iter()
        .position(|row| row.total_births == 5)
        .unwrap();
    assert_eq!(classified.assessments[index].classification, Classification::Excluded);
    assert_eq!(classified.assessments[index].risk_score, -1);
}

#[test]
fn test_unmappable_rows_are_counted() {
    let root = tempfile::tempdir().unwrap();
    let mut extracts = regional_extracts();
    extracts.births("50", "abc", 2023, 2, HEALTHY_BIRTH);
    extracts.births("11", "001", 2023, 4, HEALTHY_BIRTH);
    extracts.write(&raw_dir(root.path()));

    let pipeline = Pipeline::new(config_for(root.path())).unwrap();
    let mut quality = DataQualityReport::new();
    let (classified, _) = pipeline.build(&mut quality).unwrap();

    assert_eq!(classified.table.len(), 12);
    let births = &quality.sources["births"];
    assert_eq!(births.rows_dropped(), 2);
    assert_eq!(births.out_of_scope, 4);
}

#[test]
fn test_missing_required_column_is_fatal() {
    let root = tempfile::tempdir().unwrap();
    let mut extracts = Extracts::default();
    extracts.births("50", "001", 2023, 20, HEALTHY_BIRTH);
    extracts.infant_deaths = "COD_DPTO,COD_MUNIC,ANO,CAUSA_667\n".to_string();
    extracts.write(&raw_dir(root.path()));

    let pipeline = Pipeline::new(config_for(root.path())).unwrap();
    let err = pipeline.build(&mut DataQualityReport::new()).unwrap_err();
    assert!(matches!(err, PipelineError::Schema { ref column, .. } if column == "GRU_ED1"));
    assert!(err.is_fatal());
}

#[test]
fn test_full_run_trains_and_scores() {
    let root = tempfile::tempdir().unwrap();
    regional_extracts().write(&raw_dir(root.path()));

    let pipeline = Pipeline::new(config_for(root.path())).unwrap();
    let mut quality = DataQualityReport::new();
    let summary = pipeline.run(&mut quality).unwrap();

    assert_eq!(summary.municipality_years, 12);
    assert_eq!(summary.degraded_forecasts, Some(false));
    let output = root.path().join("output");
    for file in [FEATURES_FILE, FORECASTS_FILE, IMPORTANCE_FILE, QUALITY_FILE] {
        assert!(output.join(file).exists(), "{file} missing");
    }
    assert!(root.path().join("models").join("manifest.json").exists());
    assert_eq!(quality.forecast_sources["calibrated"], 12);

    let forecasts = output.join(FORECASTS_FILE);
    let p10 = read_column(&forecasts, "p10");
    let p50 = read_column(&forecasts, "p50");
    let p90 = read_column(&forecasts, "p90");
    assert_eq!(p10.len(), 12);
    for ((low, mid), high) in p10.iter().zip(&p50).zip(&p90) {
        let (low, mid, high): (f64, f64, f64) =
            (low.parse().unwrap(), mid.parse().unwrap(), high.parse().unwrap());
        assert!(0.0 <= low && low <= mid && mid <= high);
        assert!(high - low >= 2.0 - 1e-9);
    }
    assert!(read_column(&forecasts, "band_source").iter().all(|s| s == "calibrated"));

    // the stored models serve the consumer-facing predictor
    let (classified, _) = pipeline.build(&mut DataQualityReport::new()).unwrap();
    let predictor = pipeline.predictor(&classified);
    assert!(!predictor.is_degraded());
    for (row, assessment) in classified.table.rows().iter().zip(&classified.assessments) {
        let prediction = predictor.predict(row);
        assert!(prediction.p10 >= row.neonatal_mortality_rate);
        assert!(prediction.p10 <= prediction.p50 && prediction.p50 <= prediction.p90);
        assert_eq!(prediction.classification, assessment.classification);
        assert!(!prediction.degraded);
    }
}

#[test]
fn test_scoring_without_models_is_degraded() {
    let root = tempfile::tempdir().unwrap();
    regional_extracts().write(&raw_dir(root.path()));

    let pipeline = Pipeline::new(config_for(root.path())).unwrap();
    let mut quality = DataQualityReport::new();
    let (classified, _) = pipeline.build(&mut quality).unwrap();
    let forecaster = pipeline.load_forecaster();
    assert!(forecaster.is_degraded());

    let (forecasts, path) = pipeline.score(&classified, &forecaster, &mut quality).unwrap();
    assert!(forecasts.iter().all(|f| f.is_degraded()));
    assert_eq!(quality.forecast_sources["heuristic"], 12);
    assert!(read_column(&path, "band_source").iter().all(|s| s == "heuristic"));
}

#[test]
fn test_run_with_too_few_rows_falls_back() {
    let root = tempfile::tempdir().unwrap();
    let mut extracts = Extracts::default();
    extracts.births("50", "001", 2024, 30, HEALTHY_BIRTH);
    extracts.births("50", "006", 2024, 30, RISKY_BIRTH);
    extracts.write(&raw_dir(root.path()));

    let pipeline = Pipeline::new(config_for(root.path())).unwrap();
    let summary = pipeline.run(&mut DataQualityReport::new()).unwrap();
    assert_eq!(summary.degraded_forecasts, Some(true));
    assert!(!root.path().join("models").exists());
}
