//! Declared source columns and how they are found in an extract.
//!
//! Each source adapter declares the columns it reads as [`ColumnSpec`]s: a
//! canonical name, the alternative spellings seen in older extracts, and
//! whether the column is required. [`ColumnResolver`] binds those specs to an
//! actual extract schema.

pub mod coerce;
pub mod lookup;

pub use lookup::{ColumnResolver, LookupStrategy, ResolvedColumn, ResolvedColumns};

/// A column a source adapter reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Name used in current extracts and in code
    pub canonical: &'static str,
    /// Alternative names, tried in order after the canonical one
    pub aliases: &'static [&'static str],
    /// Whether the extract is unusable without this column
    pub required: bool,
}

impl ColumnSpec {
    /// A column whose absence aborts the run
    #[must_use]
    pub const fn required(canonical: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            canonical,
            aliases,
            required: true,
        }
    }

    /// A column whose absence leaves its fields missing
    #[must_use]
    pub const fn optional(canonical: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            canonical,
            aliases,
            required: false,
        }
    }

    /// Canonical name followed by the aliases
    pub fn candidates(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.canonical).chain(self.aliases.iter().copied())
    }
}

/// Department code column shared by the dated sources
pub const REGION_COLUMN: ColumnSpec =
    ColumnSpec::required("COD_DPTO", &["COD_DEP", "CODDPTO", "COD_DEPARTAMENTO"]);

/// Municipality code column shared by the dated sources
pub const MUNICIPALITY_COLUMN: ColumnSpec =
    ColumnSpec::required("COD_MUNIC", &["COD_MUN", "CODMUNIC", "COD_MUNICIPIO"]);

/// Year column shared by the dated sources
pub const YEAR_COLUMN: ColumnSpec = ColumnSpec::required("ANO", &["AÑO", "ANIO", "YEAR"]);
