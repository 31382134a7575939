//! Catalog data types
//!
//! Module codes, format tags, locators and the records of the module
//! catalog, plus the indexed `ModuleCatalog` collection itself.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::catalog;
use crate::errors::{CatalogError, CatalogResult, ConfigError};

/// Numeric module identifier, always rendered with three digits ("001")
///
/// Deserialization goes through [`ModuleCode::parse`], so hand-edited
/// catalogs holding "1" or "01" load as "001".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModuleCode(String);

impl ModuleCode {
    /// Parse a module code from listing text or a directory name
    ///
    /// Accepts any non-negative integer ("1", "01", "001") and normalizes
    /// it to the fixed width. Returns `None` for non-numeric input.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<u32>().ok().map(Self::from_number)
    }

    /// Build a module code from its numeric value
    pub fn from_number(value: u32) -> Self {
        Self(format!("{:0width$}", value, width = catalog::MODULE_CODE_WIDTH))
    }

    /// The zero-padded code
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ModuleCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid module code '{}', expected digits", raw))
        })
    }
}

impl fmt::Display for ModuleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ModuleCode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ConfigError::InvalidValue {
            field: "module".to_string(),
            value: s.to_string(),
            reason: "Module codes are numeric (e.g. 1, 01 or 001)".to_string(),
        })
    }
}

/// Download formats published for each module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatTag {
    /// Stata `.dta`
    Stata,
    /// SPSS `.sav`
    Spss,
    /// Comma-separated values
    Csv,
    /// dBase `.dbf`
    Dbf,
}

impl FormatTag {
    /// Every format, in the default preference order
    pub const DEFAULT_PREFERENCE: [FormatTag; 4] =
        [FormatTag::Stata, FormatTag::Csv, FormatTag::Spss, FormatTag::Dbf];

    /// Lowercase tag name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stata => "stata",
            Self::Spss => "spss",
            Self::Csv => "csv",
            Self::Dbf => "dbf",
        }
    }

    /// Detect the format of a listing download link
    ///
    /// The link title wins; the portal's per-format folder in the href
    /// (`/STATA/`, `/SPSS/`, ...) is the fallback.
    pub fn from_link(title: &str, href: &str) -> Option<Self> {
        let title = title.to_lowercase();
        let by_title = [Self::Spss, Self::Stata, Self::Csv, Self::Dbf]
            .into_iter()
            .find(|tag| title.contains(tag.as_str()));
        if by_title.is_some() {
            return by_title;
        }

        let href = href.to_uppercase();
        [Self::Spss, Self::Stata, Self::Csv, Self::Dbf]
            .into_iter()
            .find(|tag| href.contains(&format!("/{}/", tag.as_str().to_uppercase())))
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatTag {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stata" => Ok(Self::Stata),
            "spss" => Ok(Self::Spss),
            "csv" => Ok(Self::Csv),
            "dbf" => Ok(Self::Dbf),
            _ => Err(ConfigError::UnknownFormat {
                format: s.to_string(),
            }),
        }
    }
}

/// One optional download URL per format
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locators {
    pub stata: Option<Url>,
    pub spss: Option<Url>,
    pub csv: Option<Url>,
    pub dbf: Option<Url>,
}

impl Locators {
    /// URL published for a format, if any
    pub fn get(&self, format: FormatTag) -> Option<&Url> {
        match format {
            FormatTag::Stata => self.stata.as_ref(),
            FormatTag::Spss => self.spss.as_ref(),
            FormatTag::Csv => self.csv.as_ref(),
            FormatTag::Dbf => self.dbf.as_ref(),
        }
    }

    /// Record the URL of a format, replacing an earlier one
    pub fn set(&mut self, format: FormatTag, url: Url) {
        let slot = match format {
            FormatTag::Stata => &mut self.stata,
            FormatTag::Spss => &mut self.spss,
            FormatTag::Csv => &mut self.csv,
            FormatTag::Dbf => &mut self.dbf,
        };
        *slot = Some(url);
    }

    /// First format of `preference` that has a URL
    pub fn first_available(&self, preference: &[FormatTag]) -> Option<(FormatTag, &Url)> {
        preference
            .iter()
            .find_map(|&format| self.get(format).map(|url| (format, url)))
    }

    /// True when no format has a URL
    pub fn is_empty(&self) -> bool {
        self.stata.is_none() && self.spss.is_none() && self.csv.is_none() && self.dbf.is_none()
    }
}

/// One row of a year's module listing, as produced by a catalog provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    /// Row number shown by the listing
    pub sequence: String,
    pub year: u16,
    /// Period label ("Anual", "Trimestre 1", ...)
    pub period: String,
    pub survey_code: String,
    pub survey_name: String,
    pub module_code: ModuleCode,
    pub module_name: String,
    /// Metadata sheet ("ficha") link
    pub ficha: Option<Url>,
    /// Download links in listing order
    pub links: Vec<(FormatTag, Url)>,
}

/// A module available for one year, with its download locators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub year: u16,
    pub module_code: ModuleCode,
    pub module_name: String,
    pub period: String,
    pub survey_code: String,
    pub survey_name: String,
    pub ficha: Option<Url>,
    pub locators: Locators,
}

impl From<CatalogRow> for ModuleRecord {
    fn from(row: CatalogRow) -> Self {
        let mut locators = Locators::default();
        for (format, url) in row.links {
            locators.set(format, url);
        }

        Self {
            year: row.year,
            module_code: row.module_code,
            module_name: row.module_name,
            period: row.period,
            survey_code: row.survey_code,
            survey_name: row.survey_name,
            ficha: row.ficha,
            locators,
        }
    }
}

/// Years in which a (code, name) pair is published
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleAvailability {
    pub module_code: ModuleCode,
    pub module_name: String,
    /// Newest first
    pub years: Vec<u16>,
}

/// Years in which a module name is published, whatever its code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameAvailability {
    pub module_name: String,
    /// Newest first
    pub years: Vec<u16>,
}

/// Deduplicated, indexed collection of module records
///
/// At most one record exists per (year, module code). Inserting a second
/// record for an existing key keeps the first one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<ModuleRecord>", into = "Vec<ModuleRecord>")]
pub struct ModuleCatalog {
    records: Vec<ModuleRecord>,
    index: HashMap<(u16, ModuleCode), usize>,
}

impl ModuleCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record; returns false when the key was already present
    pub fn insert(&mut self, record: ModuleRecord) -> bool {
        let key = (record.year, record.module_code.clone());
        if let Some(&existing) = self.index.get(&key) {
            if self.records[existing].module_name != record.module_name {
                tracing::debug!(
                    "Module {} ({}) listed as both '{}' and '{}'; keeping the first",
                    record.module_code,
                    record.year,
                    self.records[existing].module_name,
                    record.module_name
                );
            }
            return false;
        }

        self.index.insert(key, self.records.len());
        self.records.push(record);
        true
    }

    /// Look up the record of a module in a year
    pub fn get(&self, year: u16, module_code: &ModuleCode) -> Option<&ModuleRecord> {
        self.index
            .get(&(year, module_code.clone()))
            .map(|&i| &self.records[i])
    }

    /// Human-readable name of a module in a year
    pub fn module_name(&self, year: u16, module_code: &ModuleCode) -> Option<&str> {
        self.get(year, module_code).map(|r| r.module_name.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.records.iter()
    }

    /// Distinct years, ascending
    pub fn years(&self) -> Vec<u16> {
        self.records
            .iter()
            .map(|r| r.year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Records whose module code is in `modules`; an empty filter selects all
    pub fn select(&self, modules: &[ModuleCode]) -> Vec<&ModuleRecord> {
        self.records
            .iter()
            .filter(|r| modules.is_empty() || modules.contains(&r.module_code))
            .collect()
    }

    /// Per (code, name) pair, the years it is available in, newest first
    pub fn availability(&self) -> Vec<ModuleAvailability> {
        let mut grouped: BTreeMap<(ModuleCode, String), BTreeSet<u16>> = BTreeMap::new();
        for record in &self.records {
            grouped
                .entry((record.module_code.clone(), record.module_name.clone()))
                .or_default()
                .insert(record.year);
        }

        grouped
            .into_iter()
            .map(|((module_code, module_name), years)| ModuleAvailability {
                module_code,
                module_name,
                years: years.into_iter().rev().collect(),
            })
            .collect()
    }

    /// Per module name, the years it is available in, newest first
    ///
    /// Codes are renumbered between survey years; grouping by name shows a
    /// module's full history across those changes.
    pub fn availability_by_name(&self) -> Vec<NameAvailability> {
        let mut grouped: BTreeMap<&str, BTreeSet<u16>> = BTreeMap::new();
        for record in &self.records {
            grouped
                .entry(record.module_name.as_str())
                .or_default()
                .insert(record.year);
        }

        grouped
            .into_iter()
            .map(|(module_name, years)| NameAvailability {
                module_name: module_name.to_string(),
                years: years.into_iter().rev().collect(),
            })
            .collect()
    }

    /// Write the catalog as JSON
    pub async fn save(&self, path: &Path) -> CatalogResult<()> {
        let storage_error = |reason: String| CatalogError::Storage {
            path: path.to_path_buf(),
            reason,
        };

        let json = serde_json::to_string_pretty(self).map_err(|e| storage_error(e.to_string()))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(e.to_string()))?;
        }
        tokio::fs::write(path, json)
            .await
            .map_err(|e| storage_error(e.to_string()))?;

        tracing::info!("Saved catalog with {} records to {}", self.len(), path.display());
        Ok(())
    }

    /// Read a catalog previously written by [`ModuleCatalog::save`]
    pub async fn load(path: &Path) -> CatalogResult<Self> {
        let storage_error = |reason: String| CatalogError::Storage {
            path: path.to_path_buf(),
            reason,
        };

        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| storage_error(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| storage_error(e.to_string()))
    }
}

impl From<Vec<ModuleRecord>> for ModuleCatalog {
    fn from(records: Vec<ModuleRecord>) -> Self {
        let mut catalog = Self::new();
        for record in records {
            catalog.insert(record);
        }
        catalog
    }
}

impl From<ModuleCatalog> for Vec<ModuleRecord> {
    fn from(catalog: ModuleCatalog) -> Self {
        catalog.records
    }
}
