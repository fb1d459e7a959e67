//! Prioritized column lookup
//!
//! Columns are looked up in a fixed order: the canonical name, then each
//! alias, then a case-insensitive match on any of them. Every resolution that
//! did not hit the canonical name is logged and kept in [`ResolvedColumns`]
//! so it can be reported with the run's data-quality counts.

use arrow::datatypes::Schema;
use itertools::Itertools;
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::schema::ColumnSpec;

/// How a column was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStrategy {
    /// The canonical name matched exactly
    Exact,
    /// An alias matched exactly
    Alias,
    /// A candidate matched ignoring case and surrounding whitespace
    CaseInsensitive,
}

/// One spec bound to a column of the extract
#[derive(Debug, Clone)]
pub struct ResolvedColumn {
    /// The declared column
    pub spec: ColumnSpec,
    /// Index in the extract schema
    pub index: usize,
    /// Name as written in the extract
    pub found_as: String,
    /// Lookup step that matched
    pub strategy: LookupStrategy,
}

/// All specs of one source bound to an extract schema
#[derive(Debug, Clone, Default)]
pub struct ResolvedColumns {
    columns: Vec<ResolvedColumn>,
    missing_optional: Vec<&'static str>,
}

impl ResolvedColumns {
    /// Schema index of a canonical column, `None` for an absent optional column
    #[must_use]
    pub fn index_of(&self, canonical: &str) -> Option<usize> {
        self.columns
            .iter()
            .find(|column| column.spec.canonical == canonical)
            .map(|column| column.index)
    }

    /// Resolved columns in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedColumn> {
        self.columns.iter()
    }

    /// Columns found by a fallback step
    pub fn fallbacks(&self) -> impl Iterator<Item = &ResolvedColumn> {
        self.columns
            .iter()
            .filter(|column| column.strategy != LookupStrategy::Exact)
    }

    /// Optional columns absent from the extract
    #[must_use]
    pub fn missing_optional(&self) -> &[&'static str] {
        &self.missing_optional
    }
}

/// Binds declared columns to the schema of one source extract
#[derive(Debug, Clone, Copy)]
pub struct ColumnResolver<'a> {
    source_name: &'a str,
}

impl<'a> ColumnResolver<'a> {
    /// Create a resolver for a named source
    #[must_use]
    pub const fn new(source_name: &'a str) -> Self {
        Self { source_name }
    }

    /// Resolve every spec against `schema`
    ///
    /// A missing required column is a [`PipelineError::Schema`]; a missing
    /// optional column is logged and recorded.
    pub fn resolve(&self, schema: &Schema, specs: &[ColumnSpec]) -> Result<ResolvedColumns> {
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        let mut resolved = ResolvedColumns::default();

        for spec in specs {
            match Self::find(&names, spec) {
                Some((index, strategy)) => {
                    let found_as = names[index].to_string();
                    if strategy != LookupStrategy::Exact {
                        log::warn!(
                            "{}: column {} resolved via {:?} match on '{}'",
                            self.source_name,
                            spec.canonical,
                            strategy,
                            found_as
                        );
                    }
                    resolved.columns.push(ResolvedColumn {
                        spec: *spec,
                        index,
                        found_as,
                        strategy,
                    });
                }
                None if spec.required => {
                    return Err(PipelineError::Schema {
                        source_name: self.source_name.to_string(),
                        column: spec.canonical.to_string(),
                        tried: spec.candidates().join(", "),
                    });
                }
                None => {
                    log::warn!(
                        "{}: optional column {} not present, its fields will be missing",
                        self.source_name,
                        spec.canonical
                    );
                    resolved.missing_optional.push(spec.canonical);
                }
            }
        }

        Ok(resolved)
    }

    fn find(names: &[&str], spec: &ColumnSpec) -> Option<(usize, LookupStrategy)> {
        let exact = |candidate: &str| names.iter().position(|name| *name == candidate);

        if let Some(index) = exact(spec.canonical) {
            return Some((index, LookupStrategy::Exact));
        }
        if let Some(index) = spec.aliases.iter().find_map(|alias| exact(alias)) {
            return Some((index, LookupStrategy::Alias));
        }
        spec.candidates()
            .find_map(|candidate| {
                names
                    .iter()
                    .position(|name| normalize_header(name) == normalize_header(candidate))
            })
            .map(|index| (index, LookupStrategy::CaseInsensitive))
    }
}

/// Header text without byte-order mark, surrounding whitespace or case
fn normalize_header(name: &str) -> String {
    name.trim_start_matches('\u{feff}').trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MUNICIPALITY_COLUMN, REGION_COLUMN, YEAR_COLUMN};
    use arrow::datatypes::{DataType, Field};

    fn schema(names: &[&str]) -> Schema {
        Schema::new(
            names
                .iter()
                .map(|name| Field::new(*name, DataType::Utf8, true))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_exact_alias_and_case_fallbacks() {
        let schema = schema(&["\u{feff}cod_dpto", "COD_MUN", "ANO"]);
        let resolved = ColumnResolver::new("births")
            .resolve(&schema, &[REGION_COLUMN, MUNICIPALITY_COLUMN, YEAR_COLUMN])
            .unwrap();

        assert_eq!(resolved.index_of("COD_DPTO"), Some(0));
        assert_eq!(resolved.index_of("COD_MUNIC"), Some(1));
        assert_eq!(resolved.index_of("ANO"), Some(2));

        let fallbacks: Vec<_> = resolved
            .fallbacks()
            .map(|c| (c.spec.canonical, c.strategy.clone()))
            .collect();
        assert_eq!(
            fallbacks,
            vec![
                ("COD_DPTO", LookupStrategy::CaseInsensitive),
                ("COD_MUNIC", LookupStrategy::Alias),
            ]
        );
    }

    #[test]
    fn test_missing_required_column_is_schema_error() {
        let schema = schema(&["COD_DPTO", "ANO"]);
        let err = ColumnResolver::new("fetal_deaths")
            .resolve(&schema, &[REGION_COLUMN, MUNICIPALITY_COLUMN, YEAR_COLUMN])
            .unwrap_err();
        match err {
            PipelineError::Schema {
                source_name,
                column,
                ..
            } => {
                assert_eq!(source_name, "fetal_deaths");
                assert_eq!(column, "COD_MUNIC");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_optional_column_is_recorded() {
        let schema = schema(&["COD_DPTO"]);
        let optional = ColumnSpec::optional("APGAR2", &[]);
        let resolved = ColumnResolver::new("births")
            .resolve(&schema, &[REGION_COLUMN, optional])
            .unwrap();
        assert_eq!(resolved.index_of("APGAR2"), None);
        assert_eq!(resolved.missing_optional(), &["APGAR2"]);
    }
}
