//! Birth counts per municipality-year
//!
//! The births aggregate is also the skeleton of the feature table: every
//! municipality-year with at least one recorded birth gets a row.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::aggregate::rates::RateGuard;
use crate::features::MunicipalityYearFeatures;
use crate::keys::MunicipalityYearKey;
use crate::registry::{BirthCodes, BirthRecord};

/// Running mean over known values
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanAccumulator {
    sum: f64,
    count: u32,
}

impl MeanAccumulator {
    /// Add a value when present
    pub fn push(&mut self, value: Option<f64>) {
        if let Some(value) = value {
            self.sum += value;
            self.count += 1;
        }
    }

    /// Mean of the pushed values, `None` when there were none
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / f64::from(self.count))
    }
}

/// Counts of births and flagged births for one municipality-year
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BirthCounts {
    /// Live births
    pub total: u32,
    pub adolescent: u32,
    pub single_mother: u32,
    pub low_education: u32,
    pub preterm: u32,
    pub low_birth_weight: u32,
    pub low_apgar: u32,
    pub low_apgar_5min: u32,
    pub multiple: u32,
    pub cesarean: u32,
    pub high_risk: u32,
    pub uninsured: u32,
    pub subsidized: u32,
    pub multiparous: u32,
    pub insufficient_prenatal: u32,
    pub no_prenatal: u32,
    /// Maternal age bracket midpoints
    pub maternal_age: MeanAccumulator,
    /// Known prenatal visit counts
    pub prenatal_visits: MeanAccumulator,
    /// Known gestational brackets
    pub gestation: MeanAccumulator,
}

impl BirthCounts {
    /// Count one birth
    pub fn add(&mut self, codes: &BirthCodes) {
        let flag = |set: bool| u32::from(set);
        self.total += 1;
        self.adolescent += flag(codes.is_adolescent());
        self.single_mother += flag(codes.is_single_mother());
        self.low_education += flag(codes.has_low_education());
        self.preterm += flag(codes.is_preterm());
        self.low_birth_weight += flag(codes.is_low_birth_weight());
        self.low_apgar += flag(codes.has_low_apgar());
        self.low_apgar_5min += flag(codes.has_low_apgar_5min());
        self.multiple += flag(codes.is_multiple());
        self.cesarean += flag(codes.is_cesarean());
        self.high_risk += flag(codes.is_high_risk_pregnancy());
        self.uninsured += flag(codes.is_uninsured());
        self.subsidized += flag(codes.is_subsidized());
        self.multiparous += flag(codes.is_multiparous());
        self.insufficient_prenatal += flag(codes.has_insufficient_prenatal_care());
        self.no_prenatal += flag(codes.has_no_prenatal_care());
        self.maternal_age.push(codes.maternal_age_years());
        self.prenatal_visits
            .push(codes.known_prenatal_visits().map(f64::from));
        self.gestation
            .push(codes.known_gestation_bracket().map(f64::from));
    }

    /// Write the birth-derived shares into a feature row
    ///
    /// Mean-type indicators are left to the caller, which imputes them when
    /// no birth had a known value.
    pub fn apply(&self, row: &mut MunicipalityYearFeatures, guard: &mut RateGuard) {
        let total = f64::from(self.total);
        let mut pct = |name: &'static str, count: u32| guard.percent(name, f64::from(count), total);

        row.total_births = self.total;
        row.pct_adolescent_mothers = pct("pct_adolescent_mothers", self.adolescent);
        row.pct_single_mothers = pct("pct_single_mothers", self.single_mother);
        row.pct_low_education = pct("pct_low_education", self.low_education);
        row.pct_preterm = pct("pct_preterm", self.preterm);
        row.pct_low_birth_weight = pct("pct_low_birth_weight", self.low_birth_weight);
        row.pct_low_apgar = pct("pct_low_apgar", self.low_apgar);
        row.pct_low_apgar_5min = pct("pct_low_apgar_5min", self.low_apgar_5min);
        row.pct_multiple_births = pct("pct_multiple_births", self.multiple);
        row.pct_cesarean = pct("pct_cesarean", self.cesarean);
        row.pct_high_risk_pregnancies = pct("pct_high_risk_pregnancies", self.high_risk);
        row.pct_uninsured = pct("pct_uninsured", self.uninsured);
        row.pct_subsidized = pct("pct_subsidized", self.subsidized);
        row.pct_multiparity = pct("pct_multiparity", self.multiparous);
        row.pct_insufficient_prenatal = pct("pct_insufficient_prenatal", self.insufficient_prenatal);
        row.pct_no_prenatal_care = pct("pct_no_prenatal_care", self.no_prenatal);
    }
}

/// Group births by municipality-year
#[must_use]
pub fn aggregate_births(records: &[BirthRecord]) -> BTreeMap<MunicipalityYearKey, BirthCounts> {
    let mut counts: FxHashMap<MunicipalityYearKey, BirthCounts> = FxHashMap::default();
    for record in records {
        counts.entry(record.key).or_default().add(&record.codes);
    }
    counts.into_iter().collect()
}
