//! Municipality-year feature rows
//!
//! [`MunicipalityYearFeatures`] is the central entity of the pipeline: one
//! row per municipality-year holding every derived indicator. Rows are
//! produced by [`FeatureTableBuilder`] and read by both risk subsystems.
//! [`Indicator`] names the numeric columns so the classifier and the
//! forecaster can address them without string matching on field names.

pub mod builder;
pub mod fragility;
pub mod table;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::keys::{MunicipalityCode, MunicipalityYearKey, RegionCode};

pub use builder::{FeatureSources, FeatureTableBuilder};
pub use fragility::fragility_index;
pub use table::FeatureTable;

/// Every derived indicator for one municipality-year
///
/// Percentage fields are on the 0-100 scale, mortality rates are per 1000
/// live births. Rows below the minimum reliable sample stay in the table
/// with `reliable = false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MunicipalityYearFeatures {
    pub region_code: RegionCode,
    pub municipality_code: MunicipalityCode,
    pub year: i32,
    /// Official municipality name, when a gazetteer was supplied
    pub municipality_name: Option<String>,

    // Demographic
    pub total_births: u32,
    pub mean_maternal_age: f64,
    pub pct_adolescent_mothers: f64,
    pub pct_single_mothers: f64,
    pub pct_low_education: f64,

    // Clinical
    pub pct_preterm: f64,
    pub pct_low_birth_weight: f64,
    pub pct_low_apgar: f64,
    pub pct_low_apgar_5min: f64,
    pub pct_multiple_births: f64,
    pub pct_cesarean: f64,
    pub mean_gestational_bracket: f64,
    pub pct_high_risk_pregnancies: f64,

    // Institutional
    pub num_institutions: u32,
    pub pct_public_institutions: f64,
    pub institutions_per_1000_births: f64,
    /// Births per institution, at least one institution assumed
    pub obstetric_pressure: f64,

    // Access and utilization
    pub visits_per_birth: f64,
    pub emergency_visits_per_birth: f64,
    pub consultations_per_birth: f64,
    pub procedures_per_birth: f64,
    pub pct_emergency_visits: f64,

    // Socioeconomic
    pub pct_uninsured: f64,
    pub pct_subsidized: f64,
    pub pct_multiparity: f64,

    // Prenatal care
    pub mean_prenatal_visits: f64,
    pub pct_insufficient_prenatal: f64,
    pub pct_no_prenatal_care: f64,

    // Mortality
    pub fetal_deaths: u32,
    pub neonatal_deaths: u32,
    pub infant_deaths: u32,
    pub total_deaths: u32,
    pub fetal_mortality_rate: f64,
    pub neonatal_mortality_rate: f64,
    pub infant_mortality_rate: f64,
    pub pct_avoidable_mortality: f64,

    /// Composite vulnerability score in [0, 100]
    pub fragility_index: f64,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// At least the minimum reliable number of births
    pub reliable: bool,
}

impl MunicipalityYearFeatures {
    /// A row with every indicator at zero
    #[must_use]
    pub const fn empty(key: MunicipalityYearKey) -> Self {
        Self {
            region_code: key.region,
            municipality_code: key.municipality,
            year: key.year,
            municipality_name: None,
            total_births: 0,
            mean_maternal_age: 0.0,
            pct_adolescent_mothers: 0.0,
            pct_single_mothers: 0.0,
            pct_low_education: 0.0,
            pct_preterm: 0.0,
            pct_low_birth_weight: 0.0,
            pct_low_apgar: 0.0,
            pct_low_apgar_5min: 0.0,
            pct_multiple_births: 0.0,
            pct_cesarean: 0.0,
            mean_gestational_bracket: 0.0,
            pct_high_risk_pregnancies: 0.0,
            num_institutions: 0,
            pct_public_institutions: 0.0,
            institutions_per_1000_births: 0.0,
            obstetric_pressure: 0.0,
            visits_per_birth: 0.0,
            emergency_visits_per_birth: 0.0,
            consultations_per_birth: 0.0,
            procedures_per_birth: 0.0,
            pct_emergency_visits: 0.0,
            pct_uninsured: 0.0,
            pct_subsidized: 0.0,
            pct_multiparity: 0.0,
            mean_prenatal_visits: 0.0,
            pct_insufficient_prenatal: 0.0,
            pct_no_prenatal_care: 0.0,
            fetal_deaths: 0,
            neonatal_deaths: 0,
            infant_deaths: 0,
            total_deaths: 0,
            fetal_mortality_rate: 0.0,
            neonatal_mortality_rate: 0.0,
            infant_mortality_rate: 0.0,
            pct_avoidable_mortality: 0.0,
            fragility_index: 0.0,
            latitude: None,
            longitude: None,
            reliable: false,
        }
    }

    /// Identity of the row
    #[must_use]
    pub const fn key(&self) -> MunicipalityYearKey {
        MunicipalityYearKey {
            region: self.region_code,
            municipality: self.municipality_code,
            year: self.year,
        }
    }

    /// Value of one indicator
    #[must_use]
    pub fn get(&self, indicator: Indicator) -> f64 {
        indicator.value(self)
    }

    /// Values of several indicators, in the given order
    #[must_use]
    pub fn vector(&self, indicators: &[Indicator]) -> Vec<f64> {
        indicators.iter().map(|indicator| indicator.value(self)).collect()
    }
}

macro_rules! indicators {
    (@read $value:expr, count) => { f64::from($value) };
    (@read $value:expr) => { $value };
    (@slot $value:expr, count) => { None };
    (@slot $value:expr) => { Some(&mut $value) };
    ($($variant:ident => $field:ident $(as $cast:ident)?),+ $(,)?) => {
        /// A numeric column of [`MunicipalityYearFeatures`]
        ///
        /// Serialized as its column name.
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(into = "&'static str", try_from = "String")]
        pub enum Indicator {
            $($variant),+
        }

        impl Indicator {
            /// Every indicator, in column order
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Column name
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($field)),+
                }
            }

            /// Read this indicator from a row
            #[must_use]
            pub fn value(self, row: &MunicipalityYearFeatures) -> f64 {
                match self {
                    $(Self::$variant => indicators!(@read row.$field $(, $cast)?)),+
                }
            }

            /// Mutable access to a floating-point indicator; counts have none
            pub fn slot(self, row: &mut MunicipalityYearFeatures) -> Option<&mut f64> {
                match self {
                    $(Self::$variant => indicators!(@slot row.$field $(, $cast)?)),+
                }
            }
        }
    };
}

indicators! {
    TotalBirths => total_births as count,
    MeanMaternalAge => mean_maternal_age,
    PctAdolescentMothers => pct_adolescent_mothers,
    PctSingleMothers => pct_single_mothers,
    PctLowEducation => pct_low_education,
    PctPreterm => pct_preterm,
    PctLowBirthWeight => pct_low_birth_weight,
    PctLowApgar => pct_low_apgar,
    PctLowApgar5Min => pct_low_apgar_5min,
    PctMultipleBirths => pct_multiple_births,
    PctCesarean => pct_cesarean,
    MeanGestationalBracket => mean_gestational_bracket,
    PctHighRiskPregnancies => pct_high_risk_pregnancies,
    NumInstitutions => num_institutions as count,
    PctPublicInstitutions => pct_public_institutions,
    InstitutionsPer1000Births => institutions_per_1000_births,
    ObstetricPressure => obstetric_pressure,
    VisitsPerBirth => visits_per_birth,
    EmergencyVisitsPerBirth => emergency_visits_per_birth,
    ConsultationsPerBirth => consultations_per_birth,
    ProceduresPerBirth => procedures_per_birth,
    PctEmergencyVisits => pct_emergency_visits,
    PctUninsured => pct_uninsured,
    PctSubsidized => pct_subsidized,
    PctMultiparity => pct_multiparity,
    MeanPrenatalVisits => mean_prenatal_visits,
    PctInsufficientPrenatal => pct_insufficient_prenatal,
    PctNoPrenatalCare => pct_no_prenatal_care,
    FetalDeaths => fetal_deaths as count,
    NeonatalDeaths => neonatal_deaths as count,
    InfantDeaths => infant_deaths as count,
    TotalDeaths => total_deaths as count,
    FetalMortalityRate => fetal_mortality_rate,
    NeonatalMortalityRate => neonatal_mortality_rate,
    InfantMortalityRate => infant_mortality_rate,
    PctAvoidableMortality => pct_avoidable_mortality,
    FragilityIndex => fragility_index,
}

impl Indicator {
    /// Whether the indicator is a share on the 0-100 scale
    #[must_use]
    pub fn is_percentage(self) -> bool {
        self.name().starts_with("pct_") || self == Self::FragilityIndex
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Indicator {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|indicator| indicator.name() == s)
            .ok_or_else(|| PipelineError::Config(format!("unknown indicator '{s}'")))
    }
}

impl From<Indicator> for &'static str {
    fn from(indicator: Indicator) -> Self {
        indicator.name()
    }
}

impl TryFrom<String> for Indicator {
    type Error = PipelineError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

/// Inputs of the quantile forecaster, in model order
pub const FORECAST_FEATURES: [Indicator; 15] = [
    Indicator::NeonatalMortalityRate,
    Indicator::FetalMortalityRate,
    Indicator::PctLowBirthWeight,
    Indicator::PctPreterm,
    Indicator::PctLowApgar,
    Indicator::PctAvoidableMortality,
    Indicator::PctNoPrenatalCare,
    Indicator::NumInstitutions,
    Indicator::MeanPrenatalVisits,
    Indicator::ObstetricPressure,
    Indicator::PctAdolescentMothers,
    Indicator::PctLowEducation,
    Indicator::TotalBirths,
    Indicator::PctCesarean,
    Indicator::PctHighRiskPregnancies,
];

/// Quantity the forecaster predicts
pub const FORECAST_TARGET: Indicator = Indicator::InfantMortalityRate;
