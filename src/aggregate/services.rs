//! Service-utilization totals per municipality-year

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::aggregate::rates::RateGuard;
use crate::features::MunicipalityYearFeatures;
use crate::keys::MunicipalityYearKey;
use crate::registry::{ServiceCategory, ServiceRecord};

/// Attentions by category for one municipality-year
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ServiceTotals {
    pub emergency: f64,
    pub consultation: f64,
    pub procedure: f64,
    pub other: f64,
}

impl ServiceTotals {
    /// Add a line of the utilization log
    pub fn add(&mut self, category: ServiceCategory, attentions: f64) {
        let slot = match category {
            ServiceCategory::Emergency => &mut self.emergency,
            ServiceCategory::Consultation => &mut self.consultation,
            ServiceCategory::Procedure => &mut self.procedure,
            ServiceCategory::Other => &mut self.other,
        };
        *slot += attentions;
    }

    /// All attentions
    #[must_use]
    pub fn total(&self) -> f64 {
        self.emergency + self.consultation + self.procedure + self.other
    }

    /// Write per-birth utilization ratios into a feature row
    pub fn apply(&self, row: &mut MunicipalityYearFeatures, guard: &mut RateGuard) {
        let births = f64::from(row.total_births);
        row.visits_per_birth = guard.ratio("visits_per_birth", self.total(), births);
        row.emergency_visits_per_birth =
            guard.ratio("emergency_visits_per_birth", self.emergency, births);
        row.consultations_per_birth =
            guard.ratio("consultations_per_birth", self.consultation, births);
        row.procedures_per_birth = guard.ratio("procedures_per_birth", self.procedure, births);
        row.pct_emergency_visits =
            guard.percent("pct_emergency_visits", self.emergency, self.total());
    }
}

/// Sum attentions by category per municipality-year
#[must_use]
pub fn aggregate_services(records: &[ServiceRecord]) -> BTreeMap<MunicipalityYearKey, ServiceTotals> {
    let mut totals: FxHashMap<MunicipalityYearKey, ServiceTotals> = FxHashMap::default();
    for record in records {
        totals
            .entry(record.key)
            .or_default()
            .add(record.category, record.attentions);
    }
    totals.into_iter().collect()
}
