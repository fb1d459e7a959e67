//! Department name to DANE code lookup
//!
//! Facility registry extracts identify departments by name rather than code,
//! and the spelling varies (accents, "D.C.", abbreviated forms). Names are
//! folded before lookup so "BOGOTÁ, D.C." and "bogota d.c" resolve alike.

use std::collections::BTreeMap;

use super::RegionCode;

/// Official department names with their two-digit DANE codes
const DEPARTMENTS: &[(u8, &str)] = &[
    (5, "Antioquia"),
    (8, "Atlántico"),
    (11, "Bogotá D.C."),
    (13, "Bolívar"),
    (15, "Boyacá"),
    (17, "Caldas"),
    (18, "Caquetá"),
    (19, "Cauca"),
    (20, "Cesar"),
    (23, "Córdoba"),
    (25, "Cundinamarca"),
    (27, "Chocó"),
    (41, "Huila"),
    (44, "La Guajira"),
    (47, "Magdalena"),
    (50, "Meta"),
    (52, "Nariño"),
    (54, "Norte de Santander"),
    (63, "Quindío"),
    (66, "Risaralda"),
    (68, "Santander"),
    (70, "Sucre"),
    (73, "Tolima"),
    (76, "Valle del Cauca"),
    (81, "Arauca"),
    (85, "Casanare"),
    (86, "Putumayo"),
    (88, "Archipiélago de San Andrés, Providencia y Santa Catalina"),
    (91, "Amazonas"),
    (94, "Guainía"),
    (95, "Guaviare"),
    (97, "Vaupés"),
    (99, "Vichada"),
];

/// Common alternative spellings seen in registry extracts
const ALIASES: &[(u8, &str)] = &[
    (11, "Bogotá"),
    (11, "Bogotá, D.C."),
    (11, "Bogota DC"),
    (44, "Guajira"),
    (76, "Valle"),
    (88, "San Andrés"),
    (88, "San Andrés y Providencia"),
    (88, "Archipiélago de San Andrés"),
];

/// Lookup table from folded department names to region codes
#[derive(Debug, Clone)]
pub struct DepartmentTable {
    by_name: BTreeMap<String, RegionCode>,
}

impl Default for DepartmentTable {
    fn default() -> Self {
        let mut table = Self {
            by_name: BTreeMap::new(),
        };
        for &(code, name) in DEPARTMENTS.iter().chain(ALIASES) {
            if let Some(region) = RegionCode::new(code) {
                table.insert(name, region);
            }
        }
        table
    }
}

impl DepartmentTable {
    /// Add (or override) a name for a region
    pub fn insert(&mut self, name: &str, region: RegionCode) {
        self.by_name.insert(fold_name(name), region);
    }

    /// Resolve a department name
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<RegionCode> {
        self.by_name.get(&fold_name(name)).copied()
    }

    /// Official name of a region, if it is a known department
    #[must_use]
    pub fn official_name(region: RegionCode) -> Option<&'static str> {
        DEPARTMENTS
            .iter()
            .find(|(code, _)| *code == region.value())
            .map(|(_, name)| *name)
    }

    /// Number of distinct names known to the table
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the table has no names
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Fold a department name: lowercase, strip accents, drop punctuation and
/// collapse whitespace
#[must_use]
pub fn fold_name(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        let base = match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            '.' | ',' | '-' | '_' => ' ',
            other => other,
        };
        if base.is_whitespace() {
            if !folded.is_empty() && !folded.ends_with(' ') {
                folded.push(' ');
            }
        } else {
            folded.push(base);
        }
    }
    folded.trim_end().to_string()
}
