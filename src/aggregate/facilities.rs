//! Facility counts per municipality
//!
//! The registry is undated, so the same counts apply to every year of a
//! municipality. Sites are counted once per distinct name.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::aggregate::rates::RateGuard;
use crate::features::MunicipalityYearFeatures;
use crate::keys::MunicipalityKey;
use crate::registry::FacilityRecord;

/// Facility counts for one municipality
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FacilityCounts {
    /// Distinct sites
    pub institutions: u32,
    /// Distinct sites with at least one public registration
    pub public: u32,
}

impl FacilityCounts {
    /// Write institutional indicators into a feature row
    ///
    /// Obstetric pressure divides by at least one institution so a
    /// municipality without facilities gets its birth count, clipped.
    pub fn apply(&self, row: &mut MunicipalityYearFeatures, guard: &mut RateGuard) {
        let births = f64::from(row.total_births);
        let institutions = f64::from(self.institutions);
        row.num_institutions = self.institutions;
        row.pct_public_institutions =
            guard.percent("pct_public_institutions", f64::from(self.public), institutions);
        row.institutions_per_1000_births =
            guard.per_mille("institutions_per_1000_births", institutions, births);
        row.obstetric_pressure = guard.ratio("obstetric_pressure", births, institutions.max(1.0));
    }
}

/// Count distinct sites per municipality
#[must_use]
pub fn aggregate_facilities(records: &[FacilityRecord]) -> BTreeMap<MunicipalityKey, FacilityCounts> {
    let mut sites: FxHashMap<MunicipalityKey, FxHashMap<&str, bool>> = FxHashMap::default();
    for record in records {
        let public = sites
            .entry(record.key)
            .or_default()
            .entry(record.site_name.as_str())
            .or_default();
        *public |= record.public;
    }

    sites
        .into_iter()
        .map(|(key, names)| {
            let public = names.values().filter(|public| **public).count();
            let counts = FacilityCounts {
                institutions: u32::try_from(names.len()).unwrap_or(u32::MAX),
                public: u32::try_from(public).unwrap_or(u32::MAX),
            };
            (key, counts)
        })
        .collect()
}
