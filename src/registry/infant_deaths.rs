//! Non-fetal death extract, restricted to deaths in the first year of life
//!
//! `GRU_ED1` groups age at death: 1 under an hour, 2 one to 23 hours,
//! 3 one to 6 days, 4 seven to 27 days, 5 28 days to 11 months, 6 and up
//! one year or older. Groups 1-4 are neonatal.

use crate::keys::{KeyNormalizer, KeyScope, MunicipalityYearKey};
use crate::registry::{RowRejection, Source, SourceAdapter};
use crate::schema::coerce::{parse_code, parse_small_code};
use crate::schema::{ColumnSpec, MUNICIPALITY_COLUMN, REGION_COLUMN, YEAR_COLUMN};
use crate::utils::arrow::RawRow;

/// Last age group of the neonatal period (7-27 days)
pub const LAST_NEONATAL_AGE_GROUP: u8 = 4;

/// Last age group under one year (28 days - 11 months)
pub const LAST_INFANT_AGE_GROUP: u8 = 5;

const COLUMNS: &[ColumnSpec] = &[
    REGION_COLUMN,
    MUNICIPALITY_COLUMN,
    YEAR_COLUMN,
    ColumnSpec::required("GRU_ED1", &["GRUPO_EDAD1", "GRU_ED_1"]),
    ColumnSpec::required("CAUSA_667", &["CAUSA667", "CAUSA_BASICA_667"]),
];

/// One death under one year of age
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfantDeathRecord {
    /// Municipality-year of residence
    pub key: MunicipalityYearKey,
    /// Age group at death, 1..=5
    pub age_group: u8,
    /// Cause on the 6/67 grouped list
    pub cause_667: Option<u16>,
}

impl InfantDeathRecord {
    /// Died within the first 27 days
    #[must_use]
    pub const fn is_neonatal(&self) -> bool {
        self.age_group <= LAST_NEONATAL_AGE_GROUP
    }
}

/// Adapter for the non-fetal death extract
#[derive(Debug, Clone, Copy, Default)]
pub struct InfantDeathsAdapter;

impl SourceAdapter for InfantDeathsAdapter {
    type Record = InfantDeathRecord;

    fn source(&self) -> Source {
        Source::InfantDeaths
    }

    fn columns(&self) -> &'static [ColumnSpec] {
        COLUMNS
    }

    fn adapt(
        &self,
        row: &RawRow<'_>,
        keys: &KeyNormalizer,
    ) -> Result<KeyScope<InfantDeathRecord>, RowRejection> {
        let key =
            match keys.municipality_year_key(row.get("COD_DPTO"), row.get("COD_MUNIC"), row.get("ANO"))? {
                KeyScope::InScope(key) => key,
                KeyScope::OutOfScope => return Ok(KeyScope::OutOfScope),
            };

        let age_group = parse_small_code(row.get("GRU_ED1"))
            .filter(|group| *group >= 1)
            .ok_or(RowRejection::Malformed("unparseable_age_group"))?;
        if age_group > LAST_INFANT_AGE_GROUP {
            // older than one year
            return Ok(KeyScope::OutOfScope);
        }

        Ok(KeyScope::InScope(InfantDeathRecord {
            key,
            age_group,
            cause_667: parse_code(row.get("CAUSA_667")).and_then(|c| u16::try_from(c).ok()),
        }))
    }
}
