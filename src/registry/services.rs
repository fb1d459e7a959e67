//! Service-utilization log
//!
//! Each row reports a number of attentions of one type for a
//! municipality-year. Attention types are free text; they are bucketed by
//! keyword into [`ServiceCategory`].

use crate::keys::{KeyNormalizer, KeyScope, MunicipalityYearKey};
use crate::registry::{RowRejection, Source, SourceAdapter};
use crate::schema::coerce::{clean, parse_number};
use crate::schema::{ColumnSpec, MUNICIPALITY_COLUMN, REGION_COLUMN, YEAR_COLUMN};
use crate::utils::arrow::RawRow;

const COLUMNS: &[ColumnSpec] = &[
    REGION_COLUMN,
    MUNICIPALITY_COLUMN,
    YEAR_COLUMN,
    ColumnSpec::required("NumeroAtenciones", &["NUMERO_ATENCIONES", "Atenciones"]),
    ColumnSpec::required("TipoAtencion", &["TIPO_ATENCION", "TipoServicio"]),
];

/// Kind of attention reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceCategory {
    /// Emergency room
    Emergency,
    /// Outpatient consultation
    Consultation,
    /// Procedure
    Procedure,
    /// Anything else (hospitalisation, unlabelled)
    Other,
}

impl ServiceCategory {
    /// Bucket a free-text attention type
    #[must_use]
    pub fn classify(description: &str) -> Self {
        let text = description.to_lowercase();
        if text.contains("urgencia") {
            Self::Emergency
        } else if text.contains("consulta") {
            Self::Consultation
        } else if text.contains("procedimiento") {
            Self::Procedure
        } else {
            Self::Other
        }
    }
}

/// One line of the utilization log
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceRecord {
    /// Municipality-year of the provider
    pub key: MunicipalityYearKey,
    /// Number of attentions on this line
    pub attentions: f64,
    /// Attention type
    pub category: ServiceCategory,
}

/// Adapter for the utilization log
#[derive(Debug, Clone, Copy, Default)]
pub struct ServicesAdapter;

impl SourceAdapter for ServicesAdapter {
    type Record = ServiceRecord;

    fn source(&self) -> Source {
        Source::Services
    }

    fn columns(&self) -> &'static [ColumnSpec] {
        COLUMNS
    }

    fn adapt(
        &self,
        row: &RawRow<'_>,
        keys: &KeyNormalizer,
    ) -> Result<KeyScope<ServiceRecord>, RowRejection> {
        let key =
            match keys.municipality_year_key(row.get("COD_DPTO"), row.get("COD_MUNIC"), row.get("ANO"))? {
                KeyScope::InScope(key) => key,
                KeyScope::OutOfScope => return Ok(KeyScope::OutOfScope),
            };

        let attentions = match clean(row.get("NumeroAtenciones")) {
            None => 0.0,
            Some(raw) => parse_number(Some(raw))
                .filter(|n| *n >= 0.0)
                .ok_or(RowRejection::Malformed("invalid_attention_count"))?,
        };
        let category = clean(row.get("TipoAtencion"))
            .map_or(ServiceCategory::Other, ServiceCategory::classify);

        Ok(KeyScope::InScope(ServiceRecord {
            key,
            attentions,
            category,
        }))
    }
}
