//! Reorganization of the staging tree
//!
//! Data files land in a per-module or per-year layout under
//! `2_ordenado/`, named after the catalog's module names; documentation is
//! deduplicated into `2_ordenado/documentacion/`. Planning is pure and
//! deterministic for a given staging tree, transfers then run one by one
//! and fail per file.
//!
//! - [`discovery`] - walk and classify
//! - [`naming`] - slugs and the collision index
//! - [`documentation`] - dedup and naming of documents
//! - [`ledger`] - origins of files placed by earlier passes
//! - [`transfer`] - copy or move

pub mod discovery;
pub mod documentation;
pub mod ledger;
pub mod naming;
pub mod transfer;

#[cfg(test)]
mod tests;

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::app::catalog::{ModuleCatalog, ModuleCode};
use crate::app::layout::{StagingKey, SurveyLayout};
use crate::constants::{files, layout};
use crate::errors::{ConfigError, OrganizeError, OrganizeResult};

use discovery::{discover, normalize_extensions, FileKind, StagedFile};
use ledger::OriginLedger;
pub use naming::{slugify, CollisionIndex};
pub use transfer::TransferMode;

/// Layout of the organized data files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderBy {
    /// `por_modulo/{code}_{slug}/{year}{ext}`
    #[default]
    ByModule,
    /// `por_anio/{year}/{code}_{slug}{ext}`
    ByYear,
}

impl OrderBy {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::ByModule => layout::BY_MODULE_DIR,
            Self::ByYear => layout::BY_YEAR_DIR,
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByModule => write!(f, "by-module"),
            Self::ByYear => write!(f, "by-year"),
        }
    }
}

impl FromStr for OrderBy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "by-module" | "module" | "modules" => Ok(Self::ByModule),
            "by-year" | "year" | "years" => Ok(Self::ByYear),
            _ => Err(ConfigError::InvalidValue {
                field: "order_by".to_string(),
                value: s.to_string(),
                reason: "Expected 'by-module' or 'by-year'".to_string(),
            }),
        }
    }
}

/// Organizer settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizeOptions {
    pub order_by: OrderBy,
    /// Keep original file names (by-year) and use first-wins suffixes
    /// instead of size ranks
    pub keep_original_names: bool,
    pub transfer_mode: TransferMode,
    pub documentation_extensions: Vec<String>,
    pub organize_documentation: bool,
}

impl Default for OrganizeOptions {
    fn default() -> Self {
        Self {
            order_by: OrderBy::default(),
            keep_original_names: false,
            transfer_mode: TransferMode::default(),
            documentation_extensions: files::DEFAULT_DOCUMENTATION_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            organize_documentation: true,
        }
    }
}

/// A file placed in the organized tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizedFile {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    /// Absent for documents found outside a staging directory
    pub year: Option<u16>,
    pub module_code: Option<ModuleCode>,
    pub size_bytes: u64,
    pub is_documentation: bool,
}

/// A file that could not be placed
#[derive(Debug)]
pub struct FileFailure {
    pub source_path: PathBuf,
    pub error: OrganizeError,
}

/// Outcome of one organize pass
#[derive(Debug, Default)]
pub struct OrganizeReport {
    pub files: Vec<OrganizedFile>,
    pub failures: Vec<FileFailure>,
    /// Data files outside any `{year}_mod_{code}` directory
    pub unexpected_layout: usize,
    /// Documents dropped as duplicates of an earlier (name, size)
    pub duplicate_documents: usize,
}

impl OrganizeReport {
    pub fn data_count(&self) -> usize {
        self.files.iter().filter(|f| !f.is_documentation).count()
    }

    pub fn documentation_count(&self) -> usize {
        self.files.iter().filter(|f| f.is_documentation).count()
    }
}

/// Destinations computed for one pass, before anything is transferred
#[derive(Debug, Default)]
pub struct OrganizePlan {
    pub moves: Vec<OrganizedFile>,
    pub failures: Vec<FileFailure>,
    pub unexpected_layout: usize,
    pub duplicate_documents: usize,
    origins: OriginLedger,
}

struct Candidate<'a> {
    file: &'a StagedFile,
    key: &'a StagingKey,
    folder: PathBuf,
    stem: String,
    extension: String,
}

/// Moves or copies staged files into the organized layout
pub struct FileOrganizer {
    staging_root: PathBuf,
    organized_root: PathBuf,
    options: OrganizeOptions,
}

impl FileOrganizer {
    pub fn new(staging_root: PathBuf, organized_root: PathBuf, options: OrganizeOptions) -> Self {
        Self {
            staging_root,
            organized_root,
            options,
        }
    }

    /// Organizer over the staging and organized directories of a survey
    pub fn for_layout(layout: &SurveyLayout, options: OrganizeOptions) -> Self {
        Self::new(layout.staging_root(), layout.organized_root(), options)
    }

    pub fn options(&self) -> &OrganizeOptions {
        &self.options
    }

    pub fn documentation_dir(&self) -> PathBuf {
        self.organized_root.join(layout::DOCUMENTATION_DIR)
    }

    /// Compute every destination without touching the organized tree
    pub fn plan(&self, catalog: &ModuleCatalog) -> OrganizeResult<OrganizePlan> {
        let extensions = normalize_extensions(&self.options.documentation_extensions);
        let discovery = discover(&self.staging_root, &extensions)?;

        let mut plan = OrganizePlan {
            unexpected_layout: discovery.unexpected_layout,
            origins: OriginLedger::load(&self.organized_root),
            ..OrganizePlan::default()
        };
        let mut index = CollisionIndex::new();

        self.plan_data(&discovery.files, catalog, &mut index, &mut plan);

        if self.options.organize_documentation {
            self.plan_documentation(&discovery.files, &mut index, &mut plan);
        }

        Ok(plan)
    }

    fn plan_data(
        &self,
        staged: &[StagedFile],
        catalog: &ModuleCatalog,
        index: &mut CollisionIndex,
        plan: &mut OrganizePlan,
    ) {
        let data_root = self.organized_root.join(self.options.order_by.dir_name());
        let mut unnamed: HashSet<&StagingKey> = HashSet::new();

        // keyed by folder and unsuffixed name, sorted for a stable order
        let mut groups: BTreeMap<(PathBuf, String), Vec<Candidate<'_>>> = BTreeMap::new();

        for file in staged.iter().filter(|f| f.kind == FileKind::Data) {
            let Some(key) = file.key.as_ref() else {
                continue;
            };

            let module_name = match catalog.module_name(key.year, &key.module_code) {
                Some(name) => name,
                None => {
                    if unnamed.insert(key) {
                        warn!("{} is not in the catalog, using placeholder name", key);
                    }
                    files::UNKNOWN_MODULE_NAME
                }
            };
            let slug = slugify(module_name);
            let module_stem = format!("{}_{}", key.module_code, slug);

            let (folder, stem) = match self.options.order_by {
                OrderBy::ByModule => (data_root.join(&module_stem), key.year.to_string()),
                OrderBy::ByYear => {
                    let stem = if self.options.keep_original_names {
                        let (original, _) = naming::split_extension(&file.file_name);
                        format!("{}_{}", key.year, original.replace(' ', "_"))
                    } else {
                        module_stem
                    };
                    (data_root.join(key.year.to_string()), stem)
                }
            };

            let stem = stem.to_lowercase();
            let extension = format!(".{}", file.extension);
            groups
                .entry((folder.clone(), format!("{}{}", stem, extension)))
                .or_default()
                .push(Candidate {
                    file,
                    key,
                    folder,
                    stem,
                    extension,
                });
        }

        for (_, mut group) in groups {
            if !self.options.keep_original_names {
                group.sort_by(|a, b| {
                    (Reverse(a.file.size_bytes), &a.file.source_path)
                        .cmp(&(Reverse(b.file.size_bytes), &b.file.source_path))
                });
            }

            for (rank, candidate) in group.into_iter().enumerate() {
                // only a file this same source produced may be replaced
                let occupied = |destination: &Path| {
                    plan.origins.is_occupied(
                        &self.organized_root,
                        &self.staging_root,
                        destination,
                        &candidate.file.source_path,
                    )
                };
                let claimed = if self.options.keep_original_names {
                    index.claim_next(
                        &candidate.folder,
                        &candidate.stem,
                        &candidate.extension,
                        occupied,
                    )
                } else {
                    let ranked =
                        naming::suffixed(&candidate.stem, Some(rank + 1), &candidate.extension);
                    index.claim_exact(&candidate.folder, &ranked, occupied)
                };

                match claimed {
                    Ok(name) => plan.moves.push(OrganizedFile {
                        source_path: candidate.file.source_path.clone(),
                        destination_path: candidate.folder.join(name),
                        year: Some(candidate.key.year),
                        module_code: Some(candidate.key.module_code.clone()),
                        size_bytes: candidate.file.size_bytes,
                        is_documentation: false,
                    }),
                    Err(error) => plan.failures.push(FileFailure {
                        source_path: candidate.file.source_path.clone(),
                        error,
                    }),
                }
            }
        }
    }

    fn plan_documentation(
        &self,
        staged: &[StagedFile],
        index: &mut CollisionIndex,
        plan: &mut OrganizePlan,
    ) {
        let doc_dir = self.documentation_dir();
        let (kept, dropped) = documentation::deduplicate(
            staged.iter().filter(|f| f.kind == FileKind::Documentation),
        );
        plan.duplicate_documents = dropped;

        for file in kept {
            match documentation::claim_document_name(index, &doc_dir, file) {
                Ok(name) => plan.moves.push(OrganizedFile {
                    source_path: file.source_path.clone(),
                    destination_path: doc_dir.join(name),
                    year: file.key.as_ref().map(|k| k.year),
                    module_code: file.key.as_ref().map(|k| k.module_code.clone()),
                    size_bytes: file.size_bytes,
                    is_documentation: true,
                }),
                Err(error) => plan.failures.push(FileFailure {
                    source_path: file.source_path.clone(),
                    error,
                }),
            }
        }
    }

    /// Plan and transfer every staged file
    ///
    /// Fails only when the staging tree cannot be read; per-file problems
    /// are collected in the report.
    pub async fn organize(&self, catalog: &ModuleCatalog) -> OrganizeResult<OrganizeReport> {
        info!(
            "Organizing {} ({}, {})",
            self.staging_root.display(),
            self.options.order_by,
            self.options.transfer_mode
        );

        let plan = self.plan(catalog)?;
        for failure in &plan.failures {
            warn!(
                "Cannot place {}: {}",
                failure.source_path.display(),
                failure.error
            );
        }

        let mut origins = plan.origins;
        let mut report = OrganizeReport {
            failures: plan.failures,
            unexpected_layout: plan.unexpected_layout,
            duplicate_documents: plan.duplicate_documents,
            ..OrganizeReport::default()
        };

        for planned in plan.moves {
            if planned.destination_path.is_file() {
                info!(
                    "Replacing {} from an earlier pass",
                    planned.destination_path.display()
                );
            }

            match transfer::transfer(
                &planned.source_path,
                &planned.destination_path,
                self.options.transfer_mode,
            )
            .await
            {
                Ok(()) => {
                    origins.record(
                        &self.organized_root,
                        &self.staging_root,
                        &planned.destination_path,
                        &planned.source_path,
                    );
                    report.files.push(planned);
                }
                Err(error) => {
                    warn!("{}", error);
                    report.failures.push(FileFailure {
                        source_path: planned.source_path,
                        error,
                    });
                }
            }
        }

        if !report.files.is_empty() {
            if let Err(e) = origins.save(&self.organized_root).await {
                warn!(
                    "Cannot record origins in {}: {}",
                    OriginLedger::path_in(&self.organized_root).display(),
                    e
                );
            }
        }

        info!(
            "Organized {} data file(s) and {} document(s); {} duplicate document(s), {} failure(s)",
            report.data_count(),
            report.documentation_count(),
            report.duplicate_documents,
            report.failures.len()
        );
        Ok(report)
    }
}
