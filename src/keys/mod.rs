//! Canonical municipality-year identity
//!
//! Every source names its region, municipality and year differently: plain
//! integers, zero-padded strings, five-digit "department+municipality"
//! composites, or a department name. [`KeyNormalizer`] turns any of these
//! into a [`MunicipalityYearKey`]. A value it cannot map produces a
//! [`KeyMappingError`]; the row is dropped and counted, never kept with a
//! partial key.

pub mod departments;

use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::schema::coerce;

pub use departments::DepartmentTable;

/// Two-digit department (region) code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionCode(u8);

impl RegionCode {
    /// Create a region code; valid codes are 1..=99
    #[must_use]
    pub const fn new(code: u8) -> Option<Self> {
        if code >= 1 && code <= 99 {
            Some(Self(code))
        } else {
            None
        }
    }

    /// Numeric value
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl TryFrom<String> for RegionCode {
    type Error = KeyMappingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        coerce::parse_code(Some(&value))
            .and_then(|code| u8::try_from(code).ok())
            .and_then(Self::new)
            .ok_or(KeyMappingError::UnparseableRegion(value))
    }
}

impl From<RegionCode> for String {
    fn from(value: RegionCode) -> Self {
        value.to_string()
    }
}

/// Three-digit municipality code, unique within a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MunicipalityCode(u16);

impl MunicipalityCode {
    /// Create a municipality code; valid codes are 1..=999
    #[must_use]
    pub const fn new(code: u16) -> Option<Self> {
        if code >= 1 && code <= 999 {
            Some(Self(code))
        } else {
            None
        }
    }

    /// Numeric value
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for MunicipalityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl TryFrom<String> for MunicipalityCode {
    type Error = KeyMappingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        coerce::parse_code(Some(&value))
            .and_then(|code| u16::try_from(code).ok())
            .and_then(Self::new)
            .ok_or(KeyMappingError::UnparseableMunicipality(value))
    }
}

impl From<MunicipalityCode> for String {
    fn from(value: MunicipalityCode) -> Self {
        value.to_string()
    }
}

/// Region + municipality, without a year (facility registries are undated)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MunicipalityKey {
    /// Department code
    pub region: RegionCode,
    /// Municipality code
    pub municipality: MunicipalityCode,
}

impl MunicipalityKey {
    /// Five-digit DANE code, e.g. `50001`
    #[must_use]
    pub fn dane_code(&self) -> String {
        format!("{}{}", self.region, self.municipality)
    }

    /// Attach a year
    #[must_use]
    pub const fn with_year(self, year: i32) -> MunicipalityYearKey {
        MunicipalityYearKey {
            region: self.region,
            municipality: self.municipality,
            year,
        }
    }
}

impl fmt::Display for MunicipalityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dane_code())
    }
}

/// Composite identity of every feature-table row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MunicipalityYearKey {
    /// Department code
    pub region: RegionCode,
    /// Municipality code
    pub municipality: MunicipalityCode,
    /// Calendar year
    pub year: i32,
}

impl MunicipalityYearKey {
    /// Drop the year
    #[must_use]
    pub const fn municipality_key(&self) -> MunicipalityKey {
        MunicipalityKey {
            region: self.region,
            municipality: self.municipality,
        }
    }
}

impl fmt::Display for MunicipalityYearKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", self.region, self.municipality, self.year)
    }
}

/// Reasons a row's identity could not be established
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyMappingError {
    /// No department value at all
    #[error("missing department code")]
    MissingRegion,

    /// A numeric department code outside 1..=99
    #[error("unparseable department code '{0}'")]
    UnparseableRegion(String),

    /// A department name absent from the lookup table
    #[error("unknown department name '{0}'")]
    UnknownDepartment(String),

    /// No municipality value
    #[error("missing municipality code")]
    MissingMunicipality,

    /// A municipality value that is not a 1-5 digit code
    #[error("unparseable municipality code '{0}'")]
    UnparseableMunicipality(String),

    /// A composite municipality code whose department prefix contradicts the
    /// department column
    #[error("municipality code {composite} does not belong to department {region}")]
    RegionMismatch {
        /// Department from the department column
        region: String,
        /// The composite code as written
        composite: String,
    },

    /// No year value
    #[error("missing year")]
    MissingYear,

    /// Year not an integer in 1900..=2100
    #[error("unparseable year '{0}'")]
    UnparseableYear(String),
}

impl KeyMappingError {
    /// Short stable label used for data-quality counts
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingRegion => "missing_region",
            Self::UnparseableRegion(_) => "unparseable_region",
            Self::UnknownDepartment(_) => "unknown_department",
            Self::MissingMunicipality => "missing_municipality",
            Self::UnparseableMunicipality(_) => "unparseable_municipality",
            Self::RegionMismatch { .. } => "region_mismatch",
            Self::MissingYear => "missing_year",
            Self::UnparseableYear(_) => "unparseable_year",
        }
    }
}

/// Result of normalizing a row's identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope<K> {
    /// Key inside the configured regions and years
    InScope(K),
    /// Valid key outside the configured regions or years
    OutOfScope,
}

impl<K> KeyScope<K> {
    /// The key when in scope
    pub fn into_option(self) -> Option<K> {
        match self {
            Self::InScope(key) => Some(key),
            Self::OutOfScope => None,
        }
    }
}

/// Canonicalizes region/municipality/year values from any source schema
#[derive(Debug, Clone)]
pub struct KeyNormalizer {
    regions: BTreeSet<RegionCode>,
    years: RangeInclusive<i32>,
    departments: DepartmentTable,
}

impl KeyNormalizer {
    /// Create a normalizer restricted to `regions` and `years`
    #[must_use]
    pub fn new(
        regions: BTreeSet<RegionCode>,
        years: RangeInclusive<i32>,
        departments: DepartmentTable,
    ) -> Self {
        Self {
            regions,
            years,
            departments,
        }
    }

    /// Configured regions
    #[must_use]
    pub const fn regions(&self) -> &BTreeSet<RegionCode> {
        &self.regions
    }

    /// Configured year range
    #[must_use]
    pub const fn years(&self) -> &RangeInclusive<i32> {
        &self.years
    }

    /// Resolve a department given as a code (`50`, `"05"`, `"50.0"`) or a name
    pub fn normalize_region(&self, raw: Option<&str>) -> Result<RegionCode, KeyMappingError> {
        let value = coerce::clean(raw).ok_or(KeyMappingError::MissingRegion)?;
        if coerce::digit_count(Some(value)).is_some() {
            return coerce::parse_code(Some(value))
                .and_then(|code| u8::try_from(code).ok())
                .and_then(RegionCode::new)
                .ok_or_else(|| KeyMappingError::UnparseableRegion(value.to_string()));
        }
        self.departments
            .lookup(value)
            .ok_or_else(|| KeyMappingError::UnknownDepartment(value.to_string()))
    }

    /// Resolve a municipality, accepting plain three-digit codes and
    /// four/five-digit department+municipality composites
    ///
    /// When `region` is absent the department is taken from the composite.
    pub fn normalize_municipality(
        &self,
        region: Option<&str>,
        municipality: Option<&str>,
    ) -> Result<MunicipalityKey, KeyMappingError> {
        let raw = coerce::clean(municipality).ok_or(KeyMappingError::MissingMunicipality)?;
        let code = coerce::parse_code(Some(raw))
            .filter(|code| *code <= 99_999)
            .ok_or_else(|| KeyMappingError::UnparseableMunicipality(raw.to_string()))?;

        let declared_region = match coerce::clean(region) {
            Some(value) => Some(self.normalize_region(Some(value))?),
            None => None,
        };

        let (region, municipality) = if code >= 1000 {
            let prefix = u8::try_from(code / 1000)
                .ok()
                .and_then(RegionCode::new)
                .ok_or_else(|| KeyMappingError::UnparseableMunicipality(raw.to_string()))?;
            if let Some(declared) = declared_region {
                if declared != prefix {
                    return Err(KeyMappingError::RegionMismatch {
                        region: declared.to_string(),
                        composite: raw.to_string(),
                    });
                }
            }
            (prefix, code % 1000)
        } else {
            (declared_region.ok_or(KeyMappingError::MissingRegion)?, code)
        };

        let municipality = u16::try_from(municipality)
            .ok()
            .and_then(MunicipalityCode::new)
            .ok_or_else(|| KeyMappingError::UnparseableMunicipality(raw.to_string()))?;

        Ok(MunicipalityKey {
            region,
            municipality,
        })
    }

    /// Parse a year value
    pub fn normalize_year(raw: Option<&str>) -> Result<i32, KeyMappingError> {
        let value = coerce::clean(raw).ok_or(KeyMappingError::MissingYear)?;
        coerce::parse_code(Some(value))
            .and_then(|year| i32::try_from(year).ok())
            .filter(|year| (1900..=2100).contains(year))
            .ok_or_else(|| KeyMappingError::UnparseableYear(value.to_string()))
    }

    /// Normalize an undated municipality identity and check the region scope
    pub fn municipality_key(
        &self,
        region: Option<&str>,
        municipality: Option<&str>,
    ) -> Result<KeyScope<MunicipalityKey>, KeyMappingError> {
        let key = self.normalize_municipality(region, municipality)?;
        if self.regions.contains(&key.region) {
            Ok(KeyScope::InScope(key))
        } else {
            Ok(KeyScope::OutOfScope)
        }
    }

    /// Normalize a full municipality-year identity and check region and year scope
    pub fn municipality_year_key(
        &self,
        region: Option<&str>,
        municipality: Option<&str>,
        year: Option<&str>,
    ) -> Result<KeyScope<MunicipalityYearKey>, KeyMappingError> {
        let key = self.normalize_municipality(region, municipality)?;
        let year = Self::normalize_year(year)?;
        if self.regions.contains(&key.region) && self.years.contains(&year) {
            Ok(KeyScope::InScope(key.with_year(year)))
        } else {
            Ok(KeyScope::OutOfScope)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orinoquia() -> KeyNormalizer {
        let regions = [50, 81, 85, 95, 99]
            .into_iter()
            .filter_map(RegionCode::new)
            .collect();
        KeyNormalizer::new(regions, 2020..=2024, DepartmentTable::default())
    }

    fn key(region: u8, municipality: u16, year: i32) -> MunicipalityYearKey {
        MunicipalityYearKey {
            region: RegionCode::new(region).unwrap(),
            municipality: MunicipalityCode::new(municipality).unwrap(),
            year,
        }
    }

    #[test]
    fn test_codes_display_zero_padded() {
        let k = key(5, 1, 2021);
        assert_eq!(k.region.to_string(), "05");
        assert_eq!(k.municipality.to_string(), "001");
        assert_eq!(k.municipality_key().dane_code(), "05001");
        assert_eq!(k.to_string(), "05001/2021");
    }

    #[test]
    fn test_plain_and_padded_codes() {
        let normalizer = orinoquia();
        let expected = KeyScope::InScope(key(50, 1, 2024));
        assert_eq!(
            normalizer.municipality_year_key(Some("50"), Some("1"), Some("2024")),
            Ok(expected)
        );
        assert_eq!(
            normalizer.municipality_year_key(Some("50"), Some("001"), Some("2024.0")),
            Ok(expected)
        );
    }

    #[test]
    fn test_composite_municipality() {
        let normalizer = orinoquia();
        assert_eq!(
            normalizer.municipality_year_key(Some("50"), Some("50001"), Some("2024")),
            Ok(KeyScope::InScope(key(50, 1, 2024)))
        );
        assert_eq!(
            normalizer.municipality_year_key(None, Some("81065"), Some("2022")),
            Ok(KeyScope::InScope(key(81, 65, 2022)))
        );
        assert_eq!(
            normalizer.municipality_year_key(Some("85"), Some("50001"), Some("2024")),
            Err(KeyMappingError::RegionMismatch {
                region: "85".to_string(),
                composite: "50001".to_string(),
            })
        );
    }

    #[test]
    fn test_department_names() {
        let normalizer = orinoquia();
        assert_eq!(
            normalizer.municipality_key(Some("Casanare"), Some("001")),
            Ok(KeyScope::InScope(key(85, 1, 0).municipality_key()))
        );
        assert_eq!(
            normalizer.municipality_key(Some("Antioquia"), Some("05001")),
            Ok(KeyScope::OutOfScope)
        );
        assert_eq!(
            normalizer.municipality_key(Some("Atlantida"), Some("001")),
            Err(KeyMappingError::UnknownDepartment("Atlantida".to_string()))
        );
    }

    #[test]
    fn test_scope_filters() {
        let normalizer = orinoquia();
        assert_eq!(
            normalizer.municipality_year_key(Some("05"), Some("001"), Some("2024")),
            Ok(KeyScope::OutOfScope)
        );
        assert_eq!(
            normalizer.municipality_year_key(Some("50"), Some("001"), Some("2015")),
            Ok(KeyScope::OutOfScope)
        );
    }

    #[test]
    fn test_unmappable_values() {
        let normalizer = orinoquia();
        assert_eq!(
            normalizer.municipality_year_key(None, Some("001"), Some("2024")),
            Err(KeyMappingError::MissingRegion)
        );
        assert_eq!(
            normalizer.municipality_year_key(Some("50"), Some("abc"), Some("2024")),
            Err(KeyMappingError::UnparseableMunicipality("abc".to_string()))
        );
        assert_eq!(
            normalizer.municipality_year_key(Some("50"), Some("0"), Some("2024")),
            Err(KeyMappingError::UnparseableMunicipality("0".to_string()))
        );
        assert_eq!(
            normalizer.municipality_year_key(Some("50"), Some("001"), Some("20x4")),
            Err(KeyMappingError::UnparseableYear("20x4".to_string()))
        );
        assert_eq!(
            normalizer.municipality_year_key(Some("123"), Some("001"), Some("2024")),
            Err(KeyMappingError::UnparseableRegion("123".to_string()))
        );
        assert_eq!(
            normalizer.municipality_year_key(Some("50"), None, Some("2024")),
            Err(KeyMappingError::MissingMunicipality)
        );
    }

    #[test]
    fn test_serde_as_strings() {
        let k = key(50, 1, 2024);
        let json = serde_json::to_string(&k).unwrap();
        assert_eq!(json, r#"{"region":"50","municipality":"001","year":2024}"#);
        let back: MunicipalityYearKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, k);
    }
}
