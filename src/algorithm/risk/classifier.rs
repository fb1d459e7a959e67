//! Hybrid rule-based risk classifier
//!
//! Each reliable row starts at zero points and gains:
//! - 1 point per regional percentile criterion it exceeds (six criteria,
//!   cesarean share counting when *below* its lower percentile)
//! - 1 extra point when the share without prenatal care exceeds the absolute
//!   critical gap
//! - 3 extra points when fetal mortality exceeds the absolute critical rate,
//!   enough on its own to classify ALTO
//!
//! The score is capped at the configured maximum and a row is ALTO from the
//! configured score threshold. Rows below the minimum number of births are
//! EXCLUDED with a score of -1 and stay in the output.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::algorithm::risk::RiskThresholds;
use crate::config::RiskConfig;
use crate::features::{FeatureTable, MunicipalityYearFeatures};

/// Score given to excluded rows
pub const EXCLUDED_SCORE: i32 = -1;

/// Outcome of classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
    /// High risk
    Alto,
    /// Low risk
    Bajo,
    /// Too few births to classify
    Excluded,
}

impl Classification {
    /// Label used in output files
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alto => "ALTO",
            Self::Bajo => "BAJO",
            Self::Excluded => "EXCLUDED",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule that awarded points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCriterion {
    FetalMortality,
    PrenatalGap,
    LowBirthWeight,
    Preterm,
    LowCesarean,
    ObstetricPressure,
    CriticalPrenatalGap,
    CriticalFetalMortality,
}

impl RiskCriterion {
    /// Label used in output files
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FetalMortality => "fetal_mortality",
            Self::PrenatalGap => "prenatal_gap",
            Self::LowBirthWeight => "low_birth_weight",
            Self::Preterm => "preterm",
            Self::LowCesarean => "low_cesarean",
            Self::ObstetricPressure => "obstetric_pressure",
            Self::CriticalPrenatalGap => "critical_prenatal_gap",
            Self::CriticalFetalMortality => "critical_fetal_mortality",
        }
    }
}

/// Score and class of one municipality-year
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAssessment {
    /// Points in `[0, max_score]`, or -1 when excluded
    pub risk_score: i32,
    pub classification: Classification,
    /// Rules that awarded points, in evaluation order
    pub triggered: SmallVec<[RiskCriterion; 8]>,
}

impl RiskAssessment {
    /// Assessment of a row with too few births
    #[must_use]
    pub fn excluded() -> Self {
        Self {
            risk_score: EXCLUDED_SCORE,
            classification: Classification::Excluded,
            triggered: SmallVec::new(),
        }
    }

    /// Triggered criteria joined with `;`
    #[must_use]
    pub fn criteria_label(&self) -> String {
        self.triggered
            .iter()
            .map(|criterion| criterion.name())
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Classifier with the thresholds of one run
#[derive(Debug, Clone)]
pub struct HybridRiskClassifier {
    config: RiskConfig,
    thresholds: Option<RiskThresholds>,
    adaptive: bool,
}

impl HybridRiskClassifier {
    /// Fit thresholds on the reliable rows of `table`
    ///
    /// Fixed thresholds from the configuration take precedence. Otherwise the
    /// thresholds depend on this table, so the class of a row can change when
    /// other rows change between runs.
    #[must_use]
    pub fn fit(table: &FeatureTable, config: &RiskConfig) -> Self {
        let (thresholds, adaptive) = match config.fixed_thresholds {
            Some(fixed) => (Some(fixed), false),
            None => {
                let reliable = table
                    .rows()
                    .iter()
                    .filter(|row| row.total_births >= config.min_reliable_births);
                (RiskThresholds::from_rows(reliable, config), true)
            }
        };

        match &thresholds {
            Some(thresholds) => log::info!(
                "{} {}",
                if adaptive { "Adaptive" } else { "Fixed" },
                thresholds
            ),
            None => log::warn!("No reliable municipality-year; percentile criteria disabled"),
        }

        Self {
            config: config.clone(),
            thresholds,
            adaptive,
        }
    }

    /// Classifier with explicit thresholds
    #[must_use]
    pub fn with_thresholds(thresholds: RiskThresholds, config: &RiskConfig) -> Self {
        Self {
            config: config.clone(),
            thresholds: Some(thresholds),
            adaptive: false,
        }
    }

    /// Thresholds in use
    #[must_use]
    pub const fn thresholds(&self) -> Option<&RiskThresholds> {
        self.thresholds.as_ref()
    }

    /// Whether thresholds were computed from the current table
    #[must_use]
    pub const fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    /// Score and classify one row
    #[must_use]
    pub fn assess(&self, row: &MunicipalityYearFeatures) -> RiskAssessment {
        if row.total_births < self.config.min_reliable_births {
            return RiskAssessment::excluded();
        }

        let mut triggered: SmallVec<[RiskCriterion; 8]> = SmallVec::new();
        if let Some(t) = &self.thresholds {
            let percentile_rules = [
                (row.fetal_mortality_rate > t.fetal_mortality, RiskCriterion::FetalMortality),
                (row.pct_no_prenatal_care > t.prenatal_gap, RiskCriterion::PrenatalGap),
                (row.pct_low_birth_weight > t.low_birth_weight, RiskCriterion::LowBirthWeight),
                (row.pct_preterm > t.preterm, RiskCriterion::Preterm),
                (row.pct_cesarean < t.cesarean, RiskCriterion::LowCesarean),
                (row.obstetric_pressure > t.obstetric_pressure, RiskCriterion::ObstetricPressure),
            ];
            triggered.extend(
                percentile_rules
                    .into_iter()
                    .filter_map(|(hit, criterion)| hit.then_some(criterion)),
            );
        }
        if row.pct_no_prenatal_care > self.config.critical_prenatal_gap {
            triggered.push(RiskCriterion::CriticalPrenatalGap);
        }
        if row.fetal_mortality_rate > self.config.critical_fetal_mortality {
            triggered.push(RiskCriterion::CriticalFetalMortality);
        }

        let points: i32 = triggered
            .iter()
            .map(|criterion| match criterion {
                RiskCriterion::CriticalFetalMortality => self.config.critical_fetal_points,
                _ => 1,
            })
            .sum();
        let risk_score = points.min(self.config.max_score);
        let classification = if risk_score >= self.config.alto_threshold {
            Classification::Alto
        } else {
            Classification::Bajo
        };

        RiskAssessment {
            risk_score,
            classification,
            triggered,
        }
    }

    /// Assess every row of a table, in table order
    #[must_use]
    pub fn assess_all(&self, table: &FeatureTable) -> Vec<RiskAssessment> {
        table.rows().iter().map(|row| self.assess(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{MunicipalityCode, MunicipalityYearKey, RegionCode};

    fn thresholds() -> RiskThresholds {
        RiskThresholds {
            fetal_mortality: 20.0,
            prenatal_gap: 10.0,
            low_birth_weight: 9.0,
            preterm: 12.0,
            cesarean: 25.0,
            obstetric_pressure: 150.0,
        }
    }

    fn favourable(births: u32) -> MunicipalityYearFeatures {
        let mut row = MunicipalityYearFeatures::empty(MunicipalityYearKey {
            region: RegionCode::new(50).unwrap(),
            municipality: MunicipalityCode::new(1).unwrap(),
            year: 2024,
        });
        row.total_births = births;
        row.pct_cesarean = 40.0;
        row
    }

    #[test]
    fn test_critical_fetal_mortality_forces_alto() {
        let classifier = HybridRiskClassifier::with_thresholds(
            RiskThresholds {
                fetal_mortality: 80.0,
                ..thresholds()
            },
            &RiskConfig::default(),
        );
        let mut row = favourable(500);
        row.fetal_mortality_rate = 55.0;
        let assessment = classifier.assess(&row);
        assert_eq!(assessment.classification, Classification::Alto);
        assert_eq!(assessment.risk_score, 3);
        assert_eq!(assessment.criteria_label(), "critical_fetal_mortality");
    }

    #[test]
    fn test_small_sample_excluded() {
        let classifier = HybridRiskClassifier::with_thresholds(thresholds(), &RiskConfig::default());
        let mut row = favourable(5);
        row.fetal_mortality_rate = 200.0;
        let assessment = classifier.assess(&row);
        assert_eq!(assessment.classification, Classification::Excluded);
        assert_eq!(assessment.risk_score, EXCLUDED_SCORE);
    }

    #[test]
    fn test_prenatal_gap_counts_twice() {
        let classifier = HybridRiskClassifier::with_thresholds(thresholds(), &RiskConfig::default());
        let mut row = favourable(100);
        row.pct_no_prenatal_care = 60.0;
        let assessment = classifier.assess(&row);
        assert_eq!(assessment.risk_score, 2);
        assert_eq!(assessment.classification, Classification::Bajo);

        row.pct_cesarean = 10.0;
        let assessment = classifier.assess(&row);
        assert_eq!(assessment.risk_score, 3);
        assert_eq!(assessment.classification, Classification::Alto);
        assert_eq!(
            assessment.criteria_label(),
            "prenatal_gap;low_cesarean;critical_prenatal_gap"
        );
    }

    #[test]
    fn test_score_is_capped() {
        let classifier = HybridRiskClassifier::with_thresholds(thresholds(), &RiskConfig::default());
        let mut row = favourable(100);
        row.fetal_mortality_rate = 90.0;
        row.pct_no_prenatal_care = 90.0;
        row.pct_low_birth_weight = 30.0;
        row.pct_preterm = 30.0;
        row.pct_cesarean = 1.0;
        row.obstetric_pressure = 400.0;
        let assessment = classifier.assess(&row);
        assert_eq!(assessment.triggered.len(), 8);
        assert_eq!(assessment.risk_score, 8);
    }

    #[test]
    fn test_equal_to_threshold_does_not_score() {
        let classifier = HybridRiskClassifier::with_thresholds(thresholds(), &RiskConfig::default());
        let mut row = favourable(100);
        row.fetal_mortality_rate = 20.0;
        row.pct_cesarean = 25.0;
        assert_eq!(classifier.assess(&row).risk_score, 0);
    }
}
