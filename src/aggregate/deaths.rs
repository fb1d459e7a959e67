//! Death counts per municipality-year
//!
//! Fetal and infant deaths are counted separately and turned into rates
//! against the live births of the same municipality-year. A key with no
//! death records has zero deaths, never a missing value.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::aggregate::rates::RateGuard;
use crate::config::AggregationConfig;
use crate::features::MunicipalityYearFeatures;
use crate::keys::MunicipalityYearKey;
use crate::registry::{FetalDeathRecord, InfantDeathRecord};

/// Deaths for one municipality-year
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeathCounts {
    /// Fetal deaths
    pub fetal: u32,
    /// Fetal deaths with an avoidable cause
    pub fetal_avoidable: u32,
    /// Deaths in the first 27 days
    pub neonatal: u32,
    /// Deaths in the first year, neonatal included
    pub infant: u32,
    /// Infant deaths with an avoidable cause
    pub infant_avoidable: u32,
}

impl DeathCounts {
    /// Fetal plus infant deaths
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.fetal + self.infant
    }

    /// Deaths of either kind with an avoidable cause
    #[must_use]
    pub const fn avoidable(&self) -> u32 {
        self.fetal_avoidable + self.infant_avoidable
    }

    /// Write counts and rates into a feature row
    ///
    /// `row.total_births` must already be set: every rate uses live births
    /// as denominator.
    pub fn apply(&self, row: &mut MunicipalityYearFeatures, guard: &mut RateGuard) {
        let births = f64::from(row.total_births);
        row.fetal_deaths = self.fetal;
        row.neonatal_deaths = self.neonatal;
        row.infant_deaths = self.infant;
        row.total_deaths = self.total();
        row.fetal_mortality_rate = guard.per_mille("fetal_mortality_rate", f64::from(self.fetal), births);
        row.neonatal_mortality_rate =
            guard.per_mille("neonatal_mortality_rate", f64::from(self.neonatal), births);
        row.infant_mortality_rate =
            guard.per_mille("infant_mortality_rate", f64::from(self.infant), births);
        row.pct_avoidable_mortality = guard.percent(
            "pct_avoidable_mortality",
            f64::from(self.avoidable()),
            f64::from(self.total()),
        );
    }
}

/// Group fetal and infant deaths by municipality-year
#[must_use]
pub fn aggregate_deaths(
    fetal: &[FetalDeathRecord],
    infant: &[InfantDeathRecord],
    config: &AggregationConfig,
) -> BTreeMap<MunicipalityYearKey, DeathCounts> {
    let avoidable = |cause: Option<u16>| u32::from(cause.is_some_and(|code| config.is_avoidable(code)));
    let mut counts: FxHashMap<MunicipalityYearKey, DeathCounts> = FxHashMap::default();

    for record in fetal {
        let entry = counts.entry(record.key).or_default();
        entry.fetal += 1;
        entry.fetal_avoidable += avoidable(record.cause_667);
    }
    for record in infant {
        let entry = counts.entry(record.key).or_default();
        entry.infant += 1;
        entry.neonatal += u32::from(record.is_neonatal());
        entry.infant_avoidable += avoidable(record.cause_667);
    }

    counts.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{MunicipalityCode, RegionCode};

    fn key() -> MunicipalityYearKey {
        MunicipalityYearKey {
            region: RegionCode::new(85).unwrap(),
            municipality: MunicipalityCode::new(1).unwrap(),
            year: 2022,
        }
    }

    #[test]
    fn test_counts_and_rates() {
        let fetal = vec![
            FetalDeathRecord { key: key(), cause_667: Some(402) },
            FetalDeathRecord { key: key(), cause_667: Some(311) },
            FetalDeathRecord { key: key(), cause_667: None },
        ];
        let infant = vec![
            InfantDeathRecord { key: key(), age_group: 1, cause_667: Some(503) },
            InfantDeathRecord { key: key(), age_group: 5, cause_667: Some(101) },
        ];

        let counts = aggregate_deaths(&fetal, &infant, &AggregationConfig::default());
        let deaths = counts[&key()];
        assert_eq!(
            deaths,
            DeathCounts {
                fetal: 3,
                fetal_avoidable: 1,
                neonatal: 1,
                infant: 2,
                infant_avoidable: 1,
            }
        );

        let mut row = MunicipalityYearFeatures::empty(key());
        row.total_births = 200;
        let mut guard = RateGuard::new(&AggregationConfig::default());
        deaths.apply(&mut row, &mut guard);
        assert_eq!(row.total_deaths, 5);
        assert_eq!(row.fetal_mortality_rate, 15.0);
        assert_eq!(row.neonatal_mortality_rate, 5.0);
        assert_eq!(row.infant_mortality_rate, 10.0);
        assert_eq!(row.pct_avoidable_mortality, 40.0);
    }

    #[test]
    fn test_no_deaths_is_zero() {
        let mut row = MunicipalityYearFeatures::empty(key());
        row.total_births = 100;
        let mut guard = RateGuard::new(&AggregationConfig::default());
        DeathCounts::default().apply(&mut row, &mut guard);
        assert_eq!(row.total_deaths, 0);
        assert_eq!(row.fetal_mortality_rate, 0.0);
        assert_eq!(row.pct_avoidable_mortality, 0.0);
    }
}
