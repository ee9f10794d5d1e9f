#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::documents::PROJECTS_DIR;

/// Keywords shorter than this never fuzzy-match, to avoid false positives
const MIN_FUZZY_KEYWORD_LEN: usize = 4;
/// Query tokens shorter than this are skipped during fuzzy matching
const MIN_FUZZY_TOKEN_LEN: usize = 3;
/// Jaro similarity required for a fuzzy hit; tolerates roughly two
/// character edits in an 11-character keyword
const FUZZY_SIMILARITY_THRESHOLD: f64 = 0.82;

/// Project files with this stem suffix are language variants, excluded
/// from the catalog so a project is never detected twice.
const ALTERNATE_LANGUAGE_SUFFIX: &str = "-english";

#[derive(Debug, Clone, PartialEq, Eq)]
struct CatalogEntry {
    name: String,
    keywords: Vec<String>,
    path: PathBuf,
}

/// Detects when a query mentions a specific project, so its document can
/// be injected whole instead of retrieved in fragments.
///
/// The catalog is derived from the filenames under the reserved projects
/// subdirectory and rebuilt wholesale on every [`load`](Self::load); there
/// is no incremental update. Entries are kept in sorted path order so the
/// first-match tie-break is deterministic.
#[derive(Debug, Default)]
pub struct ProjectDetector {
    projects_dir: PathBuf,
    catalog: Vec<CatalogEntry>,
}

impl ProjectDetector {
    #[inline]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            projects_dir: data_dir.join(PROJECTS_DIR),
            catalog: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    /// Rebuild the catalog from the projects directory. Idempotent; a
    /// missing directory leaves the catalog empty.
    #[inline]
    pub fn load(&mut self) {
        self.catalog.clear();

        if !self.projects_dir.exists() {
            debug!(
                "Projects directory not found: {}",
                self.projects_dir.display()
            );
            return;
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.projects_dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.path())
                    .filter(|path| {
                        path.is_file()
                            && path
                                .extension()
                                .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
                    })
                    .collect()
            })
            .unwrap_or_default();
        paths.sort();

        for path in paths {
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_lowercase()) else {
                continue;
            };
            if stem.ends_with(ALTERNATE_LANGUAGE_SUFFIX) {
                continue;
            }

            let keywords = generate_keywords(&stem);
            self.catalog.push(CatalogEntry {
                name: stem,
                keywords,
                path,
            });
        }

        info!("Project catalog loaded: {} projects", self.catalog.len());
    }

    /// Return the full text of the first project mentioned in the query,
    /// prefixed with an identifying header, or `None`.
    ///
    /// Exact substring presence is tried first for every keyword of an
    /// entry, then fuzzy matching; the first entry with any hit wins and
    /// no ranking happens across entries. A read failure on the matched
    /// document is logged and treated as no match.
    #[inline]
    pub fn detect(&self, query: &str) -> Option<String> {
        let query_lower = query.to_lowercase();
        let query_words: Vec<&str> = query_lower.split_whitespace().collect();

        for entry in &self.catalog {
            let matched = entry.keywords.iter().find_map(|keyword| {
                if query_lower.contains(keyword.as_str()) {
                    Some("exact")
                } else if fuzzy_match(keyword, &query_words) {
                    Some("fuzzy")
                } else {
                    None
                }
            });

            if let Some(match_type) = matched {
                return match fs::read_to_string(&entry.path) {
                    Ok(content) => {
                        info!(
                            "Project '{}' detected ({}); injecting full document",
                            entry.name, match_type
                        );
                        Some(format!("--- Projeto: {} ---\n{}", entry.name, content))
                    }
                    Err(e) => {
                        error!("Failed to read project file {}: {}", entry.path.display(), e);
                        None
                    }
                };
            }
        }

        None
    }
}

/// Derive keyword variants from a project file stem.
///
/// `lol-matchmaking-fazenda` yields the stem itself, the space-joined and
/// concatenated forms, and each separator-delimited token longer than two
/// characters.
fn generate_keywords(name: &str) -> Vec<String> {
    let mut keywords = vec![name.to_string()];

    let spaced = name.replace(['-', '_'], " ");
    if !keywords.contains(&spaced) {
        keywords.push(spaced);
    }

    let joined = name.replace(['-', '_'], "");
    if !keywords.contains(&joined) {
        keywords.push(joined);
    }

    for part in name.split(['-', '_']) {
        if part.len() > 2 && !keywords.iter().any(|k| k == part) {
            keywords.push(part.to_string());
        }
    }

    keywords
}

/// Approximate match between one keyword and the query tokens, using Jaro
/// similarity as a stand-in for edit distance.
fn fuzzy_match(keyword: &str, query_words: &[&str]) -> bool {
    if keyword.len() < MIN_FUZZY_KEYWORD_LEN {
        return false;
    }

    query_words
        .iter()
        .filter(|word| word.len() >= MIN_FUZZY_TOKEN_LEN)
        .any(|word| strsim::jaro(keyword, word) >= FUZZY_SIMILARITY_THRESHOLD)
}
