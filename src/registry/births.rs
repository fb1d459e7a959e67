//! Live-birth extract
//!
//! One row per live birth. Clinical and socioeconomic fields are bracket
//! codes from the national birth certificate; the decoding of each bracket
//! into a risk flag lives on [`BirthCodes`].

use crate::keys::{KeyNormalizer, KeyScope, MunicipalityYearKey};
use crate::registry::{RowRejection, Source, SourceAdapter};
use crate::schema::coerce::parse_small_code;
use crate::schema::{ColumnSpec, MUNICIPALITY_COLUMN, REGION_COLUMN, YEAR_COLUMN};
use crate::utils::arrow::RawRow;

/// Code used by the certificate for "no information"
pub const UNKNOWN_CODE: u8 = 99;

const COLUMNS: &[ColumnSpec] = &[
    REGION_COLUMN,
    MUNICIPALITY_COLUMN,
    YEAR_COLUMN,
    ColumnSpec::required("EDAD_MADRE", &["EDAD_MAD", "GRUPO_EDAD_MADRE"]),
    ColumnSpec::required("NUMCONSUL", &["NUM_CONSUL", "CONSULTAS_PRENATALES"]),
    ColumnSpec::required("PESO_NAC", &["PESO_NACER"]),
    ColumnSpec::required("T_GES", &["TIEMPO_GESTACION", "SEMANAS_GESTACION"]),
    ColumnSpec::required("TIPO_PARTO", &["TIPO_PAR"]),
    ColumnSpec::required("MUL_PARTO", &["MULT_PARTO", "MULTIPLICIDAD"]),
    ColumnSpec::required("SEG_SOCIAL", &["REGIMEN", "SEGURIDAD_SOCIAL"]),
    ColumnSpec::optional("APGAR1", &["APGAR_1"]),
    ColumnSpec::optional("APGAR2", &["APGAR_2", "APGAR5"]),
    ColumnSpec::optional("N_HIJOSV", &["HIJOS_VIVOS", "N_HIJOS_V"]),
    ColumnSpec::optional("EST_CIVM", &["EST_CIVIL_MADRE", "ESTADO_CIVIL"]),
    ColumnSpec::optional("NIV_EDUM", &["NIVEL_EDU_MADRE", "EDUCACION_MADRE"]),
];

/// One live birth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BirthRecord {
    /// Municipality-year of residence
    pub key: MunicipalityYearKey,
    /// Coded certificate fields
    pub codes: BirthCodes,
}

/// Coded fields of a birth certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BirthCodes {
    /// Maternal age bracket (1 = 10-14 ... 9 = 50-54)
    pub maternal_age_bracket: Option<u8>,
    /// Prenatal visits, 99 = unknown
    pub prenatal_visits: Option<u8>,
    /// Birth weight bracket (1 = <500 g ... 9 = 4000 g+)
    pub birth_weight_bracket: Option<u8>,
    /// Gestational age bracket (1 = <22 weeks ... 6 = 42+)
    pub gestation_bracket: Option<u8>,
    /// 1 spontaneous, 2 assisted, 3 cesarean
    pub delivery_type: Option<u8>,
    /// 1 single, 2 twins, ...
    pub multiplicity: Option<u8>,
    /// 1 contributory, 2 subsidised, 3 uninsured, 4 special, 5 exception
    pub insurance_regime: Option<u8>,
    /// Apgar score at one minute
    pub apgar1: Option<u8>,
    /// Apgar score at five minutes
    pub apgar5: Option<u8>,
    /// Children born alive, including this one
    pub living_children: Option<u8>,
    /// Marital status (1 not married ... 5 union)
    pub marital_status: Option<u8>,
    /// Mother's education level (1 none ... 9 postgraduate)
    pub education_level: Option<u8>,
}

fn known(code: Option<u8>) -> Option<u8> {
    code.filter(|c| *c != UNKNOWN_CODE)
}

impl BirthCodes {
    /// Midpoint of the maternal age bracket in years
    #[must_use]
    pub fn maternal_age_years(&self) -> Option<f64> {
        match known(self.maternal_age_bracket)? {
            bracket @ 1..=9 => Some(7.0 + 5.0 * f64::from(bracket)),
            _ => None,
        }
    }

    /// Mother aged 10-19
    #[must_use]
    pub fn is_adolescent(&self) -> bool {
        matches!(self.maternal_age_bracket, Some(1 | 2))
    }

    /// Born before 37 weeks
    #[must_use]
    pub fn is_preterm(&self) -> bool {
        matches!(self.gestation_bracket, Some(1..=4))
    }

    /// Under 2500 g
    #[must_use]
    pub fn is_low_birth_weight(&self) -> bool {
        matches!(self.birth_weight_bracket, Some(1..=5))
    }

    /// Apgar at one minute of 6 or less
    #[must_use]
    pub fn has_low_apgar(&self) -> bool {
        matches!(self.apgar1, Some(0..=6))
    }

    /// Apgar at five minutes of 6 or less
    #[must_use]
    pub fn has_low_apgar_5min(&self) -> bool {
        matches!(self.apgar5, Some(0..=6))
    }

    /// Twins or more
    #[must_use]
    pub fn is_multiple(&self) -> bool {
        self.multiplicity.is_some_and(|m| m > 1 && m != UNKNOWN_CODE)
    }

    /// Delivered by cesarean section
    #[must_use]
    pub fn is_cesarean(&self) -> bool {
        self.delivery_type == Some(3)
    }

    /// Preterm, low weight or multiple
    #[must_use]
    pub fn is_high_risk_pregnancy(&self) -> bool {
        self.is_preterm() || self.is_low_birth_weight() || self.is_multiple()
    }

    /// No health insurance
    #[must_use]
    pub fn is_uninsured(&self) -> bool {
        self.insurance_regime == Some(3)
    }

    /// Subsidised insurance regime
    #[must_use]
    pub fn is_subsidized(&self) -> bool {
        self.insurance_regime == Some(2)
    }

    /// Four or more living children
    #[must_use]
    pub fn is_multiparous(&self) -> bool {
        known(self.living_children).is_some_and(|n| n >= 4)
    }

    /// Not married or separated
    #[must_use]
    pub fn is_single_mother(&self) -> bool {
        matches!(self.marital_status, Some(1 | 4))
    }

    /// Primary education or less
    #[must_use]
    pub fn has_low_education(&self) -> bool {
        matches!(self.education_level, Some(1..=3))
    }

    /// Fewer than four prenatal visits; the unknown code does not count
    #[must_use]
    pub fn has_insufficient_prenatal_care(&self) -> bool {
        self.prenatal_visits.is_some_and(|v| v < 4)
    }

    /// No prenatal visit recorded
    #[must_use]
    pub fn has_no_prenatal_care(&self) -> bool {
        matches!(self.prenatal_visits, Some(0 | UNKNOWN_CODE))
    }

    /// Prenatal visits when known
    #[must_use]
    pub fn known_prenatal_visits(&self) -> Option<u8> {
        known(self.prenatal_visits)
    }

    /// Gestational bracket when known
    #[must_use]
    pub fn known_gestation_bracket(&self) -> Option<u8> {
        known(self.gestation_bracket)
    }
}

/// Adapter for the live-birth extract
#[derive(Debug, Clone, Copy, Default)]
pub struct BirthsAdapter;

impl SourceAdapter for BirthsAdapter {
    type Record = BirthRecord;

    fn source(&self) -> Source {
        Source::Births
    }

    fn columns(&self) -> &'static [ColumnSpec] {
        COLUMNS
    }

    fn adapt(
        &self,
        row: &RawRow<'_>,
        keys: &KeyNormalizer,
    ) -> Result<KeyScope<BirthRecord>, RowRejection> {
        let key = match keys.municipality_year_key(
            row.get("COD_DPTO"),
            row.get("COD_MUNIC"),
            row.get("ANO"),
        )? {
            KeyScope::InScope(key) => key,
            KeyScope::OutOfScope => return Ok(KeyScope::OutOfScope),
        };
        let code = |column: &str| parse_small_code(row.get(column));

        Ok(KeyScope::InScope(BirthRecord {
            key,
            codes: BirthCodes {
                maternal_age_bracket: code("EDAD_MADRE"),
                prenatal_visits: code("NUMCONSUL"),
                birth_weight_bracket: code("PESO_NAC"),
                gestation_bracket: code("T_GES"),
                delivery_type: code("TIPO_PARTO"),
                multiplicity: code("MUL_PARTO"),
                insurance_regime: code("SEG_SOCIAL"),
                apgar1: code("APGAR1"),
                apgar5: code("APGAR2"),
                living_children: code("N_HIJOSV"),
                marital_status: code("EST_CIVM"),
                education_level: code("NIV_EDUM"),
            },
        }))
    }
}
