//! Slugs and collision-free names

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::constants::files;
use crate::errors::{OrganizeError, OrganizeResult};

/// Filesystem-safe rendering of a module name
///
/// Parenthesized annotations are dropped, diacritics folded, and anything
/// outside `[a-z0-9_-]` becomes `_`. Runs of `_` collapse and the result
/// is trimmed; an empty slug becomes the unknown-module placeholder.
///
/// ```
/// use inei_fetcher::app::organize::slugify;
/// assert_eq!(slugify("Educación (Personas de 3 años y más)"), "educacion");
/// assert_eq!(slugify("Características de la Vivienda y del Hogar"),
///            "caracteristicas_de_la_vivienda_y_del_hogar");
/// ```
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut depth = 0usize;

    for c in name.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            _ => {
                let folded = fold_diacritic(c).to_ascii_lowercase();
                let mapped = if folded.is_ascii_alphanumeric() || folded == '-' {
                    folded
                } else {
                    '_'
                };
                if mapped == '_' && slug.ends_with('_') {
                    continue;
                }
                slug.push(mapped);
            }
        }
    }

    let trimmed = slug.trim_matches('_');
    if trimmed.is_empty() {
        files::UNKNOWN_MODULE_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// ASCII base letter of the accented Latin letters used in Spanish and
/// Portuguese module names (acute, grave, diaeresis, circumflex and tilde
/// vowels, plus ñ and ç)
///
/// Anything else passes through unchanged, and [`slugify`] then maps any
/// non-ASCII result to `_`.
fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'Á' | 'À' | 'Ä' | 'Â' | 'Ã' => 'A',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'É' | 'È' | 'Ë' | 'Ê' => 'E',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'Ó' | 'Ò' | 'Ö' | 'Ô' | 'Õ' => 'O',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ç' => 'c',
        'Ç' => 'C',
        other => other,
    }
}

/// Join a stem, an optional numeric suffix and an extension
pub fn suffixed(stem: &str, suffix: Option<usize>, extension: &str) -> String {
    match suffix {
        Some(n) => format!("{}_{}{}", stem, n, extension),
        None => format!("{}{}", stem, extension),
    }
}

/// Split `name` into stem and extension (with its dot)
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

#[derive(Debug, Default)]
struct FolderNames {
    taken: HashSet<String>,
    counters: HashMap<String, usize>,
}

/// Names handed out per destination folder during one pass
#[derive(Debug, Default)]
pub struct CollisionIndex {
    folders: HashMap<PathBuf, FolderNames>,
}

impl CollisionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `name` was already handed out in `folder`
    pub fn is_taken(&self, folder: &Path, name: &str) -> bool {
        self.folders
            .get(folder)
            .is_some_and(|names| names.taken.contains(name))
    }

    /// Claim `{stem}{ext}`, or `{stem}_{n}{ext}` for the next free `n`
    ///
    /// The first claim of a name gets no suffix, later ones continue from
    /// the last counter used for that name. A candidate is free when it was
    /// not handed out before and `occupied` does not report it.
    pub fn claim_next(
        &mut self,
        folder: &Path,
        stem: &str,
        extension: &str,
        occupied: impl Fn(&Path) -> bool,
    ) -> OrganizeResult<String> {
        let names = self.folders.entry(folder.to_path_buf()).or_default();
        let base = format!("{}{}", stem, extension);
        let counter = names.counters.entry(base.clone()).or_insert(0);

        for _ in 0..files::MAX_COLLISION_ATTEMPTS {
            let suffix = (*counter > 0).then_some(*counter);
            *counter += 1;
            let candidate = suffixed(stem, suffix, extension);
            if !names.taken.contains(&candidate) && !occupied(&folder.join(&candidate)) {
                names.taken.insert(candidate.clone());
                return Ok(candidate);
            }
        }

        Err(OrganizeError::CollisionUnresolved {
            folder: folder.to_path_buf(),
            name: base,
            attempts: files::MAX_COLLISION_ATTEMPTS,
        })
    }

    /// Claim exactly `name`, falling back to [`Self::claim_next`] if it was
    /// handed out already or `occupied` reports it
    pub fn claim_exact(
        &mut self,
        folder: &Path,
        name: &str,
        occupied: impl Fn(&Path) -> bool,
    ) -> OrganizeResult<String> {
        if !self.is_taken(folder, name) && !occupied(&folder.join(name)) {
            self.folders
                .entry(folder.to_path_buf())
                .or_default()
                .taken
                .insert(name.to_string());
            return Ok(name.to_string());
        }
        let (stem, extension) = split_extension(name);
        self.claim_next(folder, stem, extension, occupied)
    }
}
