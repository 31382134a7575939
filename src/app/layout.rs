//! Directory layout of a survey workspace
//!
//! Structure:
//! - Raw archives: {root}/{survey}/0_zips/{year}_mod_{code}.zip
//! - Staging tree: {root}/{survey}/1_unzipped/{year}_mod_{code}/...
//! - By module:    {root}/{survey}/2_ordenado/por_modulo/{code}_{slug}/{year}{ext}
//! - By year:      {root}/{survey}/2_ordenado/por_anio/{year}/{code}_{slug}{ext}
//! - Docs:         {root}/{survey}/2_ordenado/documentacion/{folder}_{name}
//! - Catalog:      {root}/{survey}/catalog.json

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::app::catalog::ModuleCode;
use crate::constants::{catalog, files, layout};

/// The (year, module) pair encoded in staging directory and archive names
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StagingKey {
    pub year: u16,
    pub module_code: ModuleCode,
}

impl StagingKey {
    pub fn new(year: u16, module_code: ModuleCode) -> Self {
        Self { year, module_code }
    }
}

impl fmt::Display for StagingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.year, layout::STAGING_KEY_INFIX, self.module_code)
    }
}

impl FromStr for StagingKey {
    type Err = ();

    /// Parse `{year}_mod_{code}`; anything else is an unexpected layout
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, code) = s.split_once(layout::STAGING_KEY_INFIX).ok_or(())?;
        if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(());
        }
        if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(());
        }
        let year = year.parse::<u16>().map_err(|_| ())?;
        let module_code = ModuleCode::parse(code).ok_or(())?;
        Ok(Self { year, module_code })
    }
}

/// Paths of one survey's workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyLayout {
    survey_root: PathBuf,
}

impl SurveyLayout {
    /// Layout for `survey` under `output_root`
    pub fn new(output_root: &Path, survey: &str) -> Self {
        Self {
            survey_root: output_root.join(survey),
        }
    }

    /// `{root}/{survey}`
    pub fn survey_root(&self) -> &Path {
        &self.survey_root
    }

    pub fn zips_dir(&self) -> PathBuf {
        self.survey_root.join(layout::ZIPS_DIR)
    }

    pub fn staging_root(&self) -> PathBuf {
        self.survey_root.join(layout::STAGING_DIR)
    }

    pub fn organized_root(&self) -> PathBuf {
        self.survey_root.join(layout::ORGANIZED_DIR)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.survey_root.join(catalog::CATALOG_FILE_NAME)
    }

    /// Downloaded archive of a (year, module)
    pub fn archive_path(&self, key: &StagingKey) -> PathBuf {
        self.zips_dir()
            .join(format!("{}.{}", key, files::ARCHIVE_EXTENSION))
    }

    /// Extraction directory of a (year, module)
    pub fn staging_dir(&self, key: &StagingKey) -> PathBuf {
        self.staging_root().join(key.to_string())
    }

    /// Directory an extraction is written to before it is complete
    pub fn partial_staging_dir(&self, key: &StagingKey) -> PathBuf {
        self.staging_root()
            .join(format!("{}{}", key, files::PARTIAL_DIR_SUFFIX))
    }
}
