use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use perinatal_risk::config::TrainingConfig;
use perinatal_risk::keys::{MunicipalityCode, RegionCode};
use perinatal_risk::{MunicipalityYearFeatures, MunicipalityYearKey, PipelineConfig};

pub const BIRTHS_HEADER: &str = "COD_DPTO,COD_MUNIC,ANO,EDAD_MADRE,NUMCONSUL,PESO_NAC,T_GES,\
TIPO_PARTO,MUL_PARTO,SEG_SOCIAL,APGAR1,APGAR2,N_HIJOSV,EST_CIVM,NIV_EDUM";
pub const FETAL_HEADER: &str = "COD_DPTO,COD_MUNIC,ANO,CAUSA_667";
pub const INFANT_HEADER: &str = "COD_DPTO,COD_MUNIC,ANO,GRU_ED1,CAUSA_667";
pub const FACILITIES_HEADER: &str = "DepartamentoSedeDesc,COD_MUN,NombreSede,NaturalezaJuridica";
pub const SERVICES_HEADER: &str = "COD_DPTO,COD_MUNIC,ANO,NumeroAtenciones,TipoAtencion";

/// Coded fields of an uncomplicated birth: age 25-29, 7 visits, 3000-3499 g,
/// 37-41 weeks, spontaneous, single, contributory
pub const HEALTHY_BIRTH: &str = "4,7,7,5,1,1,1,9,10,2,5,5";

/// Coded fields of a high-risk birth: adolescent, no visits, low weight,
/// preterm, uninsured, low Apgar
pub const RISKY_BIRTH: &str = "2,0,4,3,1,1,3,5,6,1,1,2";

/// Raw extract contents, one string per file
#[derive(Debug, Clone)]
pub struct Extracts {
    pub births: String,
    pub fetal_deaths: String,
    pub infant_deaths: String,
    pub facilities: String,
    pub services: String,
}

impl Default for Extracts {
    fn default() -> Self {
        Self {
            births: format!("{BIRTHS_HEADER}\n"),
            fetal_deaths: format!("{FETAL_HEADER}\n"),
            infant_deaths: format!("{INFANT_HEADER}\n"),
            facilities: format!("{FACILITIES_HEADER}\n"),
            services: format!("{SERVICES_HEADER}\n"),
        }
    }
}

impl Extracts {
    /// Add `count` births with the given coded fields
    pub fn births(&mut self, region: &str, municipality: &str, year: i32, count: usize, codes: &str) -> &mut Self {
        for _ in 0..count {
            let _ = writeln!(self.births, "{region},{municipality},{year},{codes}");
        }
        self
    }

    pub fn fetal_deaths(&mut self, region: &str, municipality: &str, year: i32, count: usize, cause: u16) -> &mut Self {
        for _ in 0..count {
            let _ = writeln!(self.fetal_deaths, "{region},{municipality},{year},{cause}");
        }
        self
    }

    pub fn infant_deaths(&mut self, region: &str, municipality: &str, year: i32, age_group: u8, count: usize) -> &mut Self {
        for _ in 0..count {
            let _ = writeln!(self.infant_deaths, "{region},{municipality},{year},{age_group},101");
        }
        self
    }

    pub fn facility(&mut self, department: &str, municipality: &str, name: &str, nature: &str) -> &mut Self {
        let _ = writeln!(self.facilities, "{department},{municipality},{name},{nature}");
        self
    }

    pub fn service(&mut self, region: &str, municipality: &str, year: i32, attentions: u32, kind: &str) -> &mut Self {
        let _ = writeln!(self.services, "{region},{municipality},{year},{attentions},{kind}");
        self
    }

    /// Write the five extracts under `dir` with the default file names
    pub fn write(&self, dir: &Path) {
        let paths = PipelineConfig::default().sources;
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(paths.births), &self.births).unwrap();
        fs::write(dir.join(paths.fetal_deaths), &self.fetal_deaths).unwrap();
        fs::write(dir.join(paths.infant_deaths), &self.infant_deaths).unwrap();
        fs::write(dir.join(paths.facilities), &self.facilities).unwrap();
        fs::write(dir.join(paths.services), &self.services).unwrap();
    }
}

/// Configuration reading extracts from `root/raw` and writing under `root`
#[must_use]
pub fn config_for(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.sources.data_dir = root.join("raw");
    config.output.directory = root.join("output");
    config.output.models_directory = root.join("models");
    config.training = TrainingConfig {
        epochs: 400,
        threads: Some(2),
        ..TrainingConfig::default()
    };
    config
}

/// Extracts path for a config built by [`config_for`]
#[must_use]
pub fn raw_dir(root: &Path) -> PathBuf {
    root.join("raw")
}

/// Twelve Meta municipalities with varied outcomes, one year
#[must_use]
pub fn regional_extracts() -> Extracts {
    let mut extracts = Extracts::default();
    for index in 1..=12u16 {
        let municipality = format!("{:03}", index * 10);
        let risky = usize::from(index % 4) * 5;
        extracts
            .births("50", &municipality, 2023, 60 - risky, HEALTHY_BIRTH)
            .births("50", &municipality, 2023, risky, RISKY_BIRTH)
            .infant_deaths("50", &municipality, 2023, 3, usize::from(index % 3))
            .infant_deaths("50", &municipality, 2023, 5, usize::from(index % 2))
            .fetal_deaths("50", &municipality, 2023, usize::from(index % 5), 402)
            .facility("Meta", &municipality, &format!("HOSPITAL {index}"), "Pública")
            .service("50", &municipality, 2023, 120 + u32::from(index), "Consulta externa");
    }
    extracts
}

/// Empty feature row for a Meta municipality in 2024
#[must_use]
pub fn feature_row(municipality: u16) -> MunicipalityYearFeatures {
    MunicipalityYearFeatures::empty(MunicipalityYearKey {
        region: RegionCode::new(50).unwrap(),
        municipality: MunicipalityCode::new(municipality).unwrap(),
        year: 2024,
    })
}
