//! Municipality gazetteer: names and coordinates

use crate::keys::{KeyNormalizer, KeyScope, MunicipalityKey};
use crate::registry::{RowRejection, Source, SourceAdapter};
use crate::schema::coerce::{clean, parse_number};
use crate::schema::{ColumnSpec, MUNICIPALITY_COLUMN, REGION_COLUMN};
use crate::utils::arrow::RawRow;

const COLUMNS: &[ColumnSpec] = &[
    REGION_COLUMN,
    MUNICIPALITY_COLUMN,
    ColumnSpec::required("NOMBRE_MUNICIPIO", &["MUNICIPIO", "NOM_MPIO", "NOMBRE"]),
    ColumnSpec::optional("LATITUD", &["LAT", "LATITUDE"]),
    ColumnSpec::optional("LONGITUD", &["LON", "LONG", "LONGITUDE"]),
];

/// Name and location of a municipality
#[derive(Debug, Clone, PartialEq)]
pub struct GazetteerEntry {
    /// Municipality
    pub key: MunicipalityKey,
    /// Official name
    pub name: String,
    /// Latitude in degrees
    pub latitude: Option<f64>,
    /// Longitude in degrees
    pub longitude: Option<f64>,
}

/// Adapter for the gazetteer
#[derive(Debug, Clone, Copy, Default)]
pub struct GazetteerAdapter;

impl SourceAdapter for GazetteerAdapter {
    type Record = GazetteerEntry;

    fn source(&self) -> Source {
        Source::Gazetteer
    }

    fn columns(&self) -> &'static [ColumnSpec] {
        COLUMNS
    }

    fn adapt(
        &self,
        row: &RawRow<'_>,
        keys: &KeyNormalizer,
    ) -> Result<KeyScope<GazetteerEntry>, RowRejection> {
        let key = match keys.municipality_key(row.get("COD_DPTO"), row.get("COD_MUNIC"))? {
            KeyScope::InScope(key) => key,
            KeyScope::OutOfScope => return Ok(KeyScope::OutOfScope),
        };
        let name = clean(row.get("NOMBRE_MUNICIPIO"))
            .ok_or(RowRejection::Malformed("missing_name"))?
            .to_string();

        Ok(KeyScope::InScope(GazetteerEntry {
            key,
            name,
            latitude: parse_number(row.get("LATITUD")).filter(|v| (-90.0..=90.0).contains(v)),
            longitude: parse_number(row.get("LONGITUD")).filter(|v| (-180.0..=180.0).contains(v)),
        }))
    }
}
