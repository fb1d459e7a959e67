//! Health-facility registry
//!
//! One row per registered site. The registry is not dated and names the
//! department in words, so rows resolve to a [`MunicipalityKey`] through the
//! department-name table.

use itertools::Itertools;

use crate::keys::{KeyNormalizer, KeyScope, MunicipalityKey};
use crate::registry::{RowRejection, Source, SourceAdapter};
use crate::schema::ColumnSpec;
use crate::schema::coerce::clean;
use crate::utils::arrow::RawRow;

const COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::required(
        "DepartamentoSedeDesc",
        &["Departamento", "COD_DEP", "COD_DPTO"],
    ),
    ColumnSpec::required("COD_MUN", &["COD_MUNIC", "CodigoMunicipio", "MunicipioSede"]),
    ColumnSpec::required("NombreSede", &["NOMBRE_SEDE", "nombre_sede"]),
    ColumnSpec::optional("NaturalezaJuridica", &["NATURALEZA_JURIDICA", "Naturaleza"]),
];

/// One registered facility site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacilityRecord {
    /// Municipality of the site
    pub key: MunicipalityKey,
    /// Site name, trimmed and upper-cased for distinct counting
    pub site_name: String,
    /// Publicly owned
    pub public: bool,
}

/// Whether a legal-nature description denotes public ownership
///
/// Matches "Pública" in any case and with a mangled accent, as seen in
/// re-encoded extracts.
#[must_use]
pub fn is_public_nature(description: &str) -> bool {
    description.to_lowercase().contains("blica")
}

/// Adapter for the facility registry
#[derive(Debug, Clone, Copy, Default)]
pub struct FacilitiesAdapter;

impl SourceAdapter for FacilitiesAdapter {
    type Record = FacilityRecord;

    fn source(&self) -> Source {
        Source::Facilities
    }

    fn columns(&self) -> &'static [ColumnSpec] {
        COLUMNS
    }

    fn adapt(
        &self,
        row: &RawRow<'_>,
        keys: &KeyNormalizer,
    ) -> Result<KeyScope<FacilityRecord>, RowRejection> {
        let key = match keys.municipality_key(row.get("DepartamentoSedeDesc"), row.get("COD_MUN"))? {
            KeyScope::InScope(key) => key,
            KeyScope::OutOfScope => return Ok(KeyScope::OutOfScope),
        };
        let site_name = clean(row.get("NombreSede"))
            .map(|name| name.split_whitespace().join(" ").to_uppercase())
            .ok_or(RowRejection::Malformed("missing_site_name"))?;
        let public = clean(row.get("NaturalezaJuridica")).is_some_and(is_public_nature);

        Ok(KeyScope::InScope(FacilityRecord {
            key,
            site_name,
            public,
        }))
    }
}
