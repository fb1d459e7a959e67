//! Feature table assembly
//!
//! Births define the set of municipality-years. Every other aggregate is
//! left-joined onto that skeleton:
//! - deaths missing for a key mean zero deaths
//! - facilities and services missing for a key are imputed as zero and
//!   counted in the quality report
//! - mean-type indicators with no known value take the median of the rows
//!   that have one
//!
//! Aggregates for keys outside the skeleton are counted as orphans and
//! otherwise ignored.

use std::collections::BTreeMap;
use std::time::Instant;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::aggregate::{
    FacilityCounts, RateGuard, ServiceTotals, aggregate_births, aggregate_deaths,
    aggregate_facilities, aggregate_services,
};
use crate::algorithm::stats::median;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::features::fragility::apply_fragility;
use crate::features::{FeatureTable, Indicator, MunicipalityYearFeatures};
use crate::keys::{MunicipalityKey, MunicipalityYearKey};
use crate::quality::DataQualityReport;
use crate::registry::{
    BirthRecord, BirthsAdapter, FacilitiesAdapter, FacilityRecord, FetalDeathRecord,
    FetalDeathsAdapter, GazetteerAdapter, GazetteerEntry, InfantDeathRecord, InfantDeathsAdapter,
    ServiceRecord, ServicesAdapter, Source, load_source,
};
use crate::utils::logging::log_warning;

/// Imputation counter for rows without any registered facility
const FACILITY_IMPUTATION: &str = "facility_indicators";

/// Imputation counter for rows without any reported service
const SERVICE_IMPUTATION: &str = "service_indicators";

/// Typed records of every source for one run
#[derive(Debug, Clone, Default)]
pub struct FeatureSources {
    pub births: Vec<BirthRecord>,
    pub fetal_deaths: Vec<FetalDeathRecord>,
    pub infant_deaths: Vec<InfantDeathRecord>,
    pub facilities: Vec<FacilityRecord>,
    pub services: Vec<ServiceRecord>,
    /// Empty when no gazetteer was configured
    pub gazetteer: Vec<GazetteerEntry>,
}

impl FeatureSources {
    /// Load every configured extract
    ///
    /// Any missing required column aborts the load.
    pub fn load(config: &PipelineConfig, quality: &mut DataQualityReport) -> Result<Self> {
        let keys = config.key_normalizer();
        let paths = &config.sources;

        let gazetteer = match &paths.gazetteer {
            Some(path) => load_source(&GazetteerAdapter, &paths.resolve(path), &keys, quality)?,
            None => Vec::new(),
        };

        Ok(Self {
            births: load_source(&BirthsAdapter, &paths.resolve(&paths.births), &keys, quality)?,
            fetal_deaths: load_source(
                &FetalDeathsAdapter,
                &paths.resolve(&paths.fetal_deaths),
                &keys,
                quality,
            )?,
            infant_deaths: load_source(
                &InfantDeathsAdapter,
                &paths.resolve(&paths.infant_deaths),
                &keys,
                quality,
            )?,
            facilities: load_source(
                &FacilitiesAdapter,
                &paths.resolve(&paths.facilities),
                &keys,
                quality,
            )?,
            services: load_source(&ServicesAdapter, &paths.resolve(&paths.services), &keys, quality)?,
            gazetteer,
        })
    }
}

/// Builds the municipality-year feature table
#[derive(Debug, Clone)]
pub struct FeatureTableBuilder<'a> {
    config: &'a PipelineConfig,
}

impl<'a> FeatureTableBuilder<'a> {
    /// Create a builder for one configuration
    #[must_use]
    pub const fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Aggregate, join and derive every indicator
    ///
    /// The output is ordered by key and contains no randomness, so identical
    /// sources always give an identical table.
    pub fn build(&self, sources: &FeatureSources, quality: &mut DataQualityReport) -> FeatureTable {
        let start = Instant::now();
        let births = aggregate_births(&sources.births);
        let deaths = aggregate_deaths(
            &sources.fetal_deaths,
            &sources.infant_deaths,
            &self.config.aggregation,
        );
        let facilities = aggregate_facilities(&sources.facilities);
        let services = aggregate_services(&sources.services);

        count_orphans(&births, sources, &facilities, quality);

        let names: FxHashMap<MunicipalityKey, &GazetteerEntry> = sources
            .gazetteer
            .iter()
            .map(|entry| (entry.key, entry))
            .collect();

        let mut guard = RateGuard::new(&self.config.aggregation);
        let mut rows = Vec::with_capacity(births.len());
        let mut unknown_means: BTreeMap<Indicator, Vec<usize>> = BTreeMap::new();
        let mut facility_imputations = 0;
        let mut service_imputations = 0;

        for (index, (key, counts)) in births.iter().enumerate() {
            let mut row = MunicipalityYearFeatures::empty(*key);
            counts.apply(&mut row, &mut guard);

            let means = [
                (Indicator::MeanMaternalAge, counts.maternal_age.mean()),
                (Indicator::MeanGestationalBracket, counts.gestation.mean()),
                (Indicator::MeanPrenatalVisits, counts.prenatal_visits.mean()),
            ];
            for (indicator, mean) in means {
                match (mean, indicator.slot(&mut row)) {
                    (Some(value), Some(slot)) => *slot = value,
                    _ => unknown_means.entry(indicator).or_default().push(index),
                }
            }

            deaths.get(key).copied().unwrap_or_default().apply(&mut row, &mut guard);

            match facilities.get(&key.municipality_key()) {
                Some(counts) => counts.apply(&mut row, &mut guard),
                None => {
                    facility_imputations += 1;
                    FacilityCounts::default().apply(&mut row, &mut guard);
                }
            }
            match services.get(key) {
                Some(totals) => totals.apply(&mut row, &mut guard),
                None => {
                    service_imputations += 1;
                    ServiceTotals::default().apply(&mut row, &mut guard);
                }
            }

            if let Some(entry) = names.get(&key.municipality_key()) {
                row.municipality_name = Some(entry.name.clone());
                row.latitude = entry.latitude;
                row.longitude = entry.longitude;
            }
            row.reliable = row.total_births >= self.config.risk.min_reliable_births;
            rows.push(row);
        }

        impute_medians(&mut rows, &unknown_means, quality);
        apply_fragility(&mut rows, &mut guard);

        quality.record_imputations(FACILITY_IMPUTATION, facility_imputations);
        quality.record_imputations(SERVICE_IMPUTATION, service_imputations);
        for (indicator, count) in guard.clips() {
            quality.record_clips(indicator, *count);
        }
        quality.municipality_years = rows.len();
        quality.excluded_municipality_years = rows.iter().filter(|row| !row.reliable).count();

        log::info!(
            "Built {} municipality-year rows ({} reliable) in {:?}",
            rows.len(),
            rows.len() - quality.excluded_municipality_years,
            start.elapsed()
        );
        if rows.is_empty() {
            log_warning("No municipality-year has recorded births", None);
        }

        FeatureTable::new(rows)
    }
}

/// Fill unknown means with the median of the known ones, 0 when none is known
fn impute_medians(
    rows: &mut [MunicipalityYearFeatures],
    unknown: &BTreeMap<Indicator, Vec<usize>>,
    quality: &mut DataQualityReport,
) {
    for (indicator, indices) in unknown {
        let missing: FxHashSet<usize> = indices.iter().copied().collect();
        let known: Vec<f64> = rows
            .iter()
            .enumerate()
            .filter(|(index, _)| !missing.contains(index))
            .map(|(_, row)| indicator.value(row))
            .collect();
        let fill = median(&known).unwrap_or(0.0);

        for index in indices {
            if let Some(slot) = rows.get_mut(*index).and_then(|row| indicator.slot(row)) {
                *slot = fill;
            }
        }
        quality.record_imputations(indicator.name(), indices.len());
    }
}

/// Count aggregate keys that have no births and therefore no row
fn count_orphans<V>(
    births: &BTreeMap<MunicipalityYearKey, V>,
    sources: &FeatureSources,
    facilities: &BTreeMap<MunicipalityKey, FacilityCounts>,
    quality: &mut DataQualityReport,
) {
    let orphans = |keys: &mut dyn Iterator<Item = MunicipalityYearKey>| {
        keys.filter(|key| !births.contains_key(key))
            .collect::<FxHashSet<_>>()
            .len()
    };

    let fetal = orphans(&mut sources.fetal_deaths.iter().map(|r| r.key));
    let infant = orphans(&mut sources.infant_deaths.iter().map(|r| r.key));
    let services = orphans(&mut sources.services.iter().map(|r| r.key));

    let municipalities: FxHashSet<MunicipalityKey> =
        births.keys().map(MunicipalityYearKey::municipality_key).collect();
    let facilities = facilities
        .keys()
        .filter(|key| !municipalities.contains(key))
        .count();

    for (source, count) in [
        (Source::FetalDeaths, fetal),
        (Source::InfantDeaths, infant),
        (Source::Services, services),
        (Source::Facilities, facilities),
    ] {
        if count > 0 {
            quality.source_mut(source.name()).orphan_keys = count;
        }
    }
}
