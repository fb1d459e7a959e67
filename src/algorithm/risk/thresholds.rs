//! Regional percentile thresholds for the hybrid classifier

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::algorithm::stats::percentile;
use crate::config::RiskConfig;
use crate::features::{Indicator, MunicipalityYearFeatures};

/// Six percentile cutoffs computed on the reliable rows of one run
///
/// Cesarean share is inverted: rows *below* its lower percentile score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskThresholds {
    pub fetal_mortality: f64,
    pub prenatal_gap: f64,
    pub low_birth_weight: f64,
    pub preterm: f64,
    pub cesarean: f64,
    pub obstetric_pressure: f64,
}

impl RiskThresholds {
    /// Compute thresholds over `rows`
    ///
    /// Returns `None` when no row is given. Callers pass only reliable rows.
    pub fn from_rows<'a, I>(rows: I, config: &RiskConfig) -> Option<Self>
    where
        I: IntoIterator<Item = &'a MunicipalityYearFeatures>,
    {
        let rows: Vec<&MunicipalityYearFeatures> = rows.into_iter().collect();
        let column = |indicator: Indicator| -> Vec<f64> {
            rows.iter().map(|row| indicator.value(row)).collect()
        };
        let upper = |indicator| percentile(&column(indicator), config.upper_percentile);

        Some(Self {
            fetal_mortality: upper(Indicator::FetalMortalityRate)?,
            prenatal_gap: upper(Indicator::PctNoPrenatalCare)?,
            low_birth_weight: upper(Indicator::PctLowBirthWeight)?,
            preterm: upper(Indicator::PctPreterm)?,
            cesarean: percentile(&column(Indicator::PctCesarean), config.lower_percentile)?,
            obstetric_pressure: upper(Indicator::ObstetricPressure)?,
        })
    }
}

impl fmt::Display for RiskThresholds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Risk thresholds:")?;
        writeln!(f, "  Fetal mortality rate: > {:.2} per 1000", self.fetal_mortality)?;
        writeln!(f, "  No prenatal care: > {:.2}%", self.prenatal_gap)?;
        writeln!(f, "  Low birth weight: > {:.2}%", self.low_birth_weight)?;
        writeln!(f, "  Preterm: > {:.2}%", self.preterm)?;
        writeln!(f, "  Cesarean: < {:.2}%", self.cesarean)?;
        write!(f, "  Obstetric pressure: > {:.2} births/institution", self.obstetric_pressure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{MunicipalityCode, MunicipalityYearKey, RegionCode};

    #[test]
    fn test_thresholds_from_rows() {
        let rows: Vec<_> = (1..=5u16)
            .map(|m| {
                let mut row = MunicipalityYearFeatures::empty(MunicipalityYearKey {
                    region: RegionCode::new(50).unwrap(),
                    municipality: MunicipalityCode::new(m).unwrap(),
                    year: 2024,
                });
                row.fetal_mortality_rate = f64::from(m) * 10.0;
                row.pct_cesarean = f64::from(m) * 10.0;
                row
            })
            .collect();

        let thresholds = RiskThresholds::from_rows(&rows, &RiskConfig::default()).unwrap();
        assert_eq!(thresholds.fetal_mortality, 40.0);
        assert_eq!(thresholds.cesarean, 20.0);
        assert_eq!(thresholds.preterm, 0.0);
        assert!(RiskThresholds::from_rows(&[], &RiskConfig::default()).is_none());
    }
}
