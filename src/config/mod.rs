//! Pipeline configuration.
//!
//! One [`PipelineConfig`] value is built per run (defaults, optionally
//! overridden by a TOML file) and handed to every stage constructor. No
//! stage reads region lists or thresholds from anywhere else.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::algorithm::risk::RiskThresholds;
use crate::error::{PipelineError, Result};
use crate::keys::{DepartmentTable, KeyNormalizer, RegionCode};

/// Complete configuration of a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Departments in scope
    pub regions: RegionConfig,
    /// Years in scope
    pub years: YearRange,
    /// Extract locations
    pub sources: SourcePaths,
    /// Rate computation guards
    pub aggregation: AggregationConfig,
    /// Hybrid classifier rules
    pub risk: RiskConfig,
    /// Forecast post-processing bounds
    pub forecast: ForecastConfig,
    /// Quantile model training
    pub training: TrainingConfig,
    /// Output locations
    pub output: OutputConfig,
}

/// Departments in scope plus extra department-name spellings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegionConfig {
    /// Two-digit department codes
    pub codes: Vec<u8>,
    /// Additional department names mapped to codes
    pub department_aliases: BTreeMap<String, u8>,
}

impl Default for RegionConfig {
    fn default() -> Self {
        // Orinoquía: Meta, Arauca, Casanare, Guaviare, Vichada
        Self {
            codes: vec![50, 81, 85, 95, 99],
            department_aliases: BTreeMap::new(),
        }
    }
}

/// Inclusive year range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct YearRange {
    /// First year in scope
    pub first: i32,
    /// Last year in scope
    pub last: i32,
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            first: 2020,
            last: 2024,
        }
    }
}

/// Locations of the five extracts and the optional gazetteer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcePaths {
    /// Directory relative paths are resolved against
    pub data_dir: PathBuf,
    /// Live births
    pub births: PathBuf,
    /// Fetal deaths
    pub fetal_deaths: PathBuf,
    /// Non-fetal deaths
    pub infant_deaths: PathBuf,
    /// Facility registry
    pub facilities: PathBuf,
    /// Service-utilization log
    pub services: PathBuf,
    /// Municipality names and coordinates
    pub gazetteer: Option<PathBuf>,
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/raw"),
            births: PathBuf::from("nacimientos.csv"),
            fetal_deaths: PathBuf::from("defunciones_fetales.csv"),
            infant_deaths: PathBuf::from("defunciones_no_fetales.csv"),
            facilities: PathBuf::from("reps.csv"),
            services: PathBuf::from("rips.csv"),
            gazetteer: None,
        }
    }
}

impl SourcePaths {
    /// Resolve a configured path against `data_dir`
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }
}

/// Inclusive range of cause codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRange {
    /// First code
    pub start: u16,
    /// Last code
    pub end: u16,
}

impl CodeRange {
    /// Whether `code` lies in the range
    #[must_use]
    pub const fn contains(&self, code: u16) -> bool {
        self.start <= code && code <= self.end
    }
}

/// Guards applied when computing rates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregationConfig {
    /// Denominators below this are treated as zero
    pub epsilon: f64,
    /// Plausibility ceiling for per-birth and per-institution ratios
    pub utilization_ceiling: f64,
    /// Plausibility ceiling for per-mille rates
    pub per_mille_ceiling: f64,
    /// 667-list cause codes counted as avoidable deaths
    pub avoidable_causes: Vec<CodeRange>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-9,
            utilization_ceiling: 500.0,
            per_mille_ceiling: 1000.0,
            avoidable_causes: vec![
                CodeRange {
                    start: 401,
                    end: 410,
                },
                CodeRange {
                    start: 501,
                    end: 506,
                },
            ],
        }
    }
}

impl AggregationConfig {
    /// Whether a 667-list cause code is avoidable
    #[must_use]
    pub fn is_avoidable(&self, code: u16) -> bool {
        self.avoidable_causes.iter().any(|range| range.contains(code))
    }
}

/// Hybrid classifier rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskConfig {
    /// Minimum births for a municipality-year to be scored
    pub min_reliable_births: u32,
    /// Upper percentile, as a fraction
    pub upper_percentile: f64,
    /// Lower percentile (cesarean), as a fraction
    pub lower_percentile: f64,
    /// Fetal mortality (per mille) that forces ALTO
    pub critical_fetal_mortality: f64,
    /// Share without prenatal care (percent) that earns an extra point
    pub critical_prenatal_gap: f64,
    /// Points awarded by the critical fetal mortality rule
    pub critical_fetal_points: i32,
    /// Minimum score classified ALTO
    pub alto_threshold: i32,
    /// Upper bound of the reported score
    pub max_score: i32,
    /// Pinned thresholds; when absent they are recomputed every run
    pub fixed_thresholds: Option<RiskThresholds>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            min_reliable_births: 10,
            upper_percentile: 0.75,
            lower_percentile: 0.25,
            critical_fetal_mortality: 50.0,
            critical_prenatal_gap: 50.0,
            critical_fetal_points: 3,
            alto_threshold: 3,
            max_score: 8,
            fixed_thresholds: None,
        }
    }
}

/// Bounds for forecast post-processing and the degraded fallback band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForecastConfig {
    /// Lowest plausible infant mortality rate (per mille)
    pub global_floor: f64,
    /// p90 ceiling used when no training manifest provides one
    pub default_ceiling: f64,
    /// Minimum p90 - p10
    pub min_width: f64,
    /// Coefficient of variation of the fallback band
    pub fallback_cv: f64,
    /// Normal quantile matching the 10/90 band
    pub fallback_z: f64,
    /// Point estimate when no model output is available
    pub fallback_baseline: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            global_floor: 2.0,
            default_ceiling: 200.0,
            min_width: 2.0,
            fallback_cv: 0.30,
            fallback_z: 1.2816,
            fallback_baseline: 15.0,
        }
    }
}

/// Quantile model training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    /// Full-batch gradient steps
    pub epochs: usize,
    /// Step size
    pub learning_rate: f64,
    /// L2 penalty on weights
    pub l2: f64,
    /// Held-out share of rows
    pub test_fraction: f64,
    /// Seed of the train/test split
    pub seed: u64,
    /// Worker threads; defaults to the number of CPUs
    pub threads: Option<usize>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 3000,
            learning_rate: 0.05,
            l2: 1e-3,
            test_fraction: 0.2,
            seed: 42,
            threads: None,
        }
    }
}

impl TrainingConfig {
    /// Effective worker thread count
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Feature table, forecasts, quality report
    pub directory: PathBuf,
    /// Model artifacts
    pub models_directory: PathBuf,
    /// Also write the feature table as Parquet
    pub write_parquet: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            models_directory: PathBuf::from("models"),
            write_parquet: false,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject inconsistent settings
    pub fn validate(&self) -> Result<()> {
        if self.regions.codes.is_empty() {
            return Err(PipelineError::Config("no regions configured".into()));
        }
        if let Some(code) = self
            .regions
            .codes
            .iter()
            .chain(self.regions.department_aliases.values())
            .find(|code| RegionCode::new(**code).is_none())
        {
            return Err(PipelineError::Config(format!(
                "invalid department code {code}"
            )));
        }
        if self.years.first > self.years.last {
            return Err(PipelineError::Config(format!(
                "year range {}..={} is empty",
                self.years.first, self.years.last
            )));
        }

        let risk = &self.risk;
        let fraction = |p: f64| p > 0.0 && p < 1.0;
        if !fraction(risk.lower_percentile)
            || !fraction(risk.upper_percentile)
            || risk.lower_percentile >= risk.upper_percentile
        {
            return Err(PipelineError::Config(format!(
                "percentiles must satisfy 0 < lower < upper < 1, got {} and {}",
                risk.lower_percentile, risk.upper_percentile
            )));
        }
        if risk.max_score < risk.alto_threshold || risk.alto_threshold <= 0 {
            return Err(PipelineError::Config(format!(
                "ALTO threshold {} must be positive and at most the maximum score {}",
                risk.alto_threshold, risk.max_score
            )));
        }
        if risk.critical_fetal_points < risk.alto_threshold {
            return Err(PipelineError::Config(format!(
                "critical fetal mortality points {} must reach the ALTO threshold {}",
                risk.critical_fetal_points, risk.alto_threshold
            )));
        }

        let agg = &self.aggregation;
        if !(agg.epsilon > 0.0 && agg.utilization_ceiling > 0.0 && agg.per_mille_ceiling > 0.0) {
            return Err(PipelineError::Config(
                "aggregation epsilon and ceilings must be positive".into(),
            ));
        }
        if agg.avoidable_causes.iter().any(|r| r.start > r.end) {
            return Err(PipelineError::Config(
                "avoidable cause range with start after end".into(),
            ));
        }

        let forecast = &self.forecast;
        if !(forecast.min_width > 0.0) {
            return Err(PipelineError::Config(
                "forecast minimum width must be positive".into(),
            ));
        }
        if forecast.global_floor < 0.0
            || forecast.default_ceiling < forecast.global_floor
            || forecast.fallback_cv < 0.0
            || forecast.fallback_z < 0.0
            || forecast.fallback_baseline < 0.0
        {
            return Err(PipelineError::Config(
                "forecast bounds must be non-negative with ceiling >= floor".into(),
            ));
        }

        let training = &self.training;
        if training.epochs == 0 || !(training.learning_rate > 0.0) || training.l2 < 0.0 {
            return Err(PipelineError::Config(
                "training needs epochs > 0, learning rate > 0 and l2 >= 0".into(),
            ));
        }
        if !fraction(training.test_fraction) {
            return Err(PipelineError::Config(format!(
                "test fraction {} must be in (0, 1)",
                training.test_fraction
            )));
        }
        Ok(())
    }

    /// Configured regions as key types
    #[must_use]
    pub fn region_codes(&self) -> BTreeSet<RegionCode> {
        self.regions
            .codes
            .iter()
            .filter_map(|code| RegionCode::new(*code))
            .collect()
    }

    /// Configured years
    #[must_use]
    pub const fn year_range(&self) -> RangeInclusive<i32> {
        self.years.first..=self.years.last
    }

    /// Department lookup table with configured aliases
    #[must_use]
    pub fn department_table(&self) -> DepartmentTable {
        let mut table = DepartmentTable::default();
        for (name, code) in &self.regions.department_aliases {
            if let Some(region) = RegionCode::new(*code) {
                table.insert(name, region);
            }
        }
        table
    }

    /// Key normalizer restricted to the configured scope
    #[must_use]
    pub fn key_normalizer(&self) -> KeyNormalizer {
        KeyNormalizer::new(
            self.region_codes(),
            self.year_range(),
            self.department_table(),
        )
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline Configuration:")?;
        let regions: Vec<String> = self
            .region_codes()
            .iter()
            .map(|region| match DepartmentTable::official_name(*region) {
                Some(name) => format!("{region} {name}"),
                None => region.to_string(),
            })
            .collect();
        writeln!(f, "  Regions: {}", regions.join(", "))?;
        writeln!(f, "  Years: {}-{}", self.years.first, self.years.last)?;
        writeln!(f, "  Data Directory: {}", self.sources.data_dir.display())?;
        if let Some(gazetteer) = &self.sources.gazetteer {
            writeln!(f, "  Gazetteer: {}", gazetteer.display())?;
        }
        writeln!(
            f,
            "  Minimum Reliable Births: {}",
            self.risk.min_reliable_births
        )?;
        match &self.risk.fixed_thresholds {
            Some(_) => writeln!(f, "  Thresholds: fixed")?,
            None => writeln!(
                f,
                "  Thresholds: adaptive (p{:.0}/p{:.0} of reliable rows)",
                self.risk.upper_percentile * 100.0,
                self.risk.lower_percentile * 100.0
            )?,
        }
        writeln!(
            f,
            "  Forecast Floor/Min Width: {}/{}",
            self.forecast.global_floor, self.forecast.min_width
        )?;
        writeln!(f, "  Output Directory: {}", self.output.directory.display())?;
        writeln!(
            f,
            "  Models Directory: {}",
            self.output.models_directory.display()
        )?;
        Ok(())
    }
}
