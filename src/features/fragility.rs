//! Health-system fragility index
//!
//! Unweighted mean of four components, each in [0, 100] with higher meaning
//! more fragile: institutional scarcity (institutions per 1000 births,
//! inverted against the best-served row of the table), insufficient
//! prenatal care, uninsured births and avoidable mortality.

use crate::aggregate::RateGuard;
use crate::features::MunicipalityYearFeatures;

/// Best institutional coverage in the table, 0 when no row has any
#[must_use]
pub fn max_institution_coverage(rows: &[MunicipalityYearFeatures]) -> f64 {
    rows.iter()
        .map(|row| row.institutions_per_1000_births)
        .filter(|value| value.is_finite())
        .fold(0.0, f64::max)
}

/// Fragility of one row given the best coverage in the table
pub fn fragility_index(row: &MunicipalityYearFeatures, max_coverage: f64, guard: &mut RateGuard) -> f64 {
    let coverage = if max_coverage > 0.0 {
        row.institutions_per_1000_births / max_coverage * 100.0
    } else {
        0.0
    };
    let components = [
        100.0 - guard.clip("fragility_scarcity", coverage, 0.0, 100.0),
        guard.clip("fragility_prenatal", row.pct_insufficient_prenatal, 0.0, 100.0),
        guard.clip("fragility_uninsured", row.pct_uninsured, 0.0, 100.0),
        guard.clip("fragility_avoidable", row.pct_avoidable_mortality, 0.0, 100.0),
    ];
    let mean = components.iter().sum::<f64>() / components.len() as f64;
    guard.clip("fragility_index", mean, 0.0, 100.0)
}

/// Fill `fragility_index` on every row
pub fn apply_fragility(rows: &mut [MunicipalityYearFeatures], guard: &mut RateGuard) {
    let max_coverage = max_institution_coverage(rows);
    for row in rows.iter_mut() {
        row.fragility_index = fragility_index(row, max_coverage, guard);
    }
}
