//! Console output utilities
//!
//! This module prints the end-of-run summary for the command line.

use std::time::Duration;

use crate::algorithm::risk::RiskThresholds;
use crate::pipeline::RunSummary;
use crate::quality::DataQualityReport;

/// Print classification counts, quality counts and written files
pub fn print_run_summary(summary: &RunSummary, quality: &DataQualityReport, elapsed: Duration) {
    println!("Finished in {elapsed:?}");
    println!(
        "Municipality-years: {} ({} reliable)",
        summary.municipality_years, summary.reliable
    );
    println!(
        "  ALTO: {}  BAJO: {}  EXCLUDED: {}",
        summary.alto, summary.bajo, summary.excluded
    );
    if let Some(thresholds) = &quality.thresholds {
        print_thresholds(thresholds, quality.adaptive_thresholds);
    }
    match summary.degraded_forecasts {
        Some(true) => println!("Forecasts: heuristic band (models unavailable)"),
        Some(false) => println!("Forecasts: calibrated quantile ensemble"),
        None => {}
    }
    println!(
        "Rows dropped: {}  Values clipped: {}  Values imputed: {}",
        quality.total_rows_dropped(),
        quality.total_clipped(),
        quality.imputed_values.values().sum::<usize>()
    );

    if !summary.outputs.is_empty() {
        println!("Outputs:");
        for path in &summary.outputs {
            println!("  - {}", path.display());
        }
    }
}

/// Print the classifier thresholds of the run
pub fn print_thresholds(thresholds: &RiskThresholds, adaptive: bool) {
    let origin = if adaptive {
        "recomputed from this run's reliable rows"
    } else {
        "fixed in configuration"
    };
    println!("Thresholds ({origin}):");
    println!("  {thresholds}");
}
