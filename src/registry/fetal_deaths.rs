//! Fetal-death extract

use crate::keys::{KeyNormalizer, KeyScope, MunicipalityYearKey};
use crate::registry::{RowRejection, Source, SourceAdapter};
use crate::schema::coerce::parse_code;
use crate::schema::{ColumnSpec, MUNICIPALITY_COLUMN, REGION_COLUMN, YEAR_COLUMN};
use crate::utils::arrow::RawRow;

const COLUMNS: &[ColumnSpec] = &[
    REGION_COLUMN,
    MUNICIPALITY_COLUMN,
    YEAR_COLUMN,
    ColumnSpec::required("CAUSA_667", &["CAUSA667", "CAUSA_BASICA_667"]),
];

/// One fetal death
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetalDeathRecord {
    /// Municipality-year of residence
    pub key: MunicipalityYearKey,
    /// Cause on the 6/67 grouped list
    pub cause_667: Option<u16>,
}

/// Adapter for the fetal-death extract
#[derive(Debug, Clone, Copy, Default)]
pub struct FetalDeathsAdapter;

impl SourceAdapter for FetalDeathsAdapter {
    type Record = FetalDeathRecord;

    fn source(&self) -> Source {
        Source::FetalDeaths
    }

    fn columns(&self) -> &'static [ColumnSpec] {
        COLUMNS
    }

    fn adapt(
        &self,
        row: &RawRow<'_>,
        keys: &KeyNormalizer,
    ) -> Result<KeyScope<FetalDeathRecord>, RowRejection> {
        let scope =
            keys.municipality_year_key(row.get("COD_DPTO"), row.get("COD_MUNIC"), row.get("ANO"))?;
        Ok(match scope {
            KeyScope::InScope(key) => KeyScope::InScope(FetalDeathRecord {
                key,
                cause_667: parse_code(row.get("CAUSA_667")).and_then(|c| u16::try_from(c).ok()),
            }),
            KeyScope::OutOfScope => KeyScope::OutOfScope,
        })
    }
}
