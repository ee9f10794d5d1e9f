
use std::fs;

use itertools::Itertools;
use tracing::{info, warn};

use crate::config::Config;
use crate::documents::{FALLBACK_FILES, document_paths};
use crate::embeddings::{EmbedTask, Embedder};
use crate::index::IndexStore;
use crate::projects::ProjectDetector;
use crate::{RagError, Result};

/// Separator between chunk texts in an assembled context block
const CONTEXT_SEPARATOR: &str = "\n...\n";

/// Keyword groups for intent classification, checked in order; the first
/// matching group decides the retrieval breadth.
const PROJECT_LIST_INTENTS: [&str; 4] = [
    "quais projetos",
    "todos os projetos",
    "listar projetos",
    "list projects",
];
const WORK_INTENTS: [&str; 6] = [
    "trabalho",
    "emprego",
    "experiência",
    "experiencia",
    "carreira",
    "onde trabalh",
];
const STACK_INTENTS: [&str; 5] = [
    "stack",
    "tecnolog",
    "linguagem",
    "framework",
    "ferramenta",
];

/// Orchestrates query embedding, candidate search, threshold filtering,
/// and fallback substitution over the owned [`IndexStore`].
///
/// Build-vs-search access is not internally locked; callers complete
/// [`initialize_or_build`](Self::initialize_or_build) before serving
/// queries, after which `retrieve`, `retrieve_smart`, and
/// `detect_project` are read-only.
pub struct RagEngine {
    config: Config,
    embedder: Box<dyn Embedder>,
    store: IndexStore,
    fallback_context: String,
    detector: ProjectDetector,
}

impl RagEngine {
    #[inline]
    pub fn new(config: Config, embedder: Box<dyn Embedder>) -> Self {
        let store = IndexStore::new(&config);
        let detector = ProjectDetector::new(&config.data_dir);

        Self {
            config,
            embedder,
            store,
            fallback_context: String::new(),
            detector,
        }
    }

    /// Load the persisted index when it is present and fresh, otherwise
    /// rebuild it; then (re)load the fallback context and project catalog
    /// regardless of which path was taken. A corrupt artifact pair forces
    /// a rebuild rather than failing, since the source documents remain
    /// the source of truth.
    #[inline]
    pub fn initialize_or_build(&mut self) -> Result<()> {
        let mut needs_rebuild = !self.store.artifacts_exist();

        if !needs_rebuild && self.store.is_stale(&self.config.data_dir) {
            info!("Source documents newer than index; rebuilding");
            needs_rebuild = true;
        }

        if !needs_rebuild {
            match self.store.load() {
                Ok(()) => {}
                Err(RagError::IndexCorrupt(reason)) => {
                    warn!("Index artifacts corrupt ({}); rebuilding", reason);
                    needs_rebuild = true;
                }
                Err(e) => return Err(e),
            }
        }

        if needs_rebuild {
            self.store.build(
                &self.config.data_dir,
                &self.config.chunking,
                self.embedder.as_ref(),
            )?;
        }

        self.load_fallback_context();
        self.detector.load();
        Ok(())
    }

    /// Unconditionally rebuild the index and reload the fallback context
    /// and project catalog, ignoring any persisted artifacts.
    #[inline]
    pub fn rebuild(&mut self) -> Result<()> {
        self.store.build(
            &self.config.data_dir,
            &self.config.chunking,
            self.embedder.as_ref(),
        )?;
        self.load_fallback_context();
        self.detector.load();
        Ok(())
    }

    /// Assemble a context block for the query.
    ///
    /// An empty index short-circuits to the fallback context without an
    /// embedding call. Otherwise candidates are over-fetched, filtered by
    /// the maximum L2 distance, and truncated to `top_k`; zero survivors
    /// also yield the fallback context, so the result is non-empty
    /// whenever the fallback context is.
    #[inline]
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<String> {
        if self.store.is_empty() {
            warn!("Index is empty; returning fallback context");
            return Ok(self.fallback_context.clone());
        }

        let query_vector = self.embedder.embed(query, EmbedTask::Query)?;

        let candidates = (top_k * self.config.retrieval.candidate_factor).min(self.store.len());
        let hits = self.store.search(&query_vector, candidates);

        let max_distance = self.config.retrieval.max_l2_distance;
        let mut context_parts: Vec<&str> = Vec::with_capacity(top_k);
        let mut sources: Vec<&str> = Vec::with_capacity(top_k);

        for hit in &hits {
            if hit.distance > max_distance {
                continue;
            }
            if context_parts.len() >= top_k {
                break;
            }
            if let Some(record) = self.store.record(hit.chunk_id) {
                context_parts.push(&record.text);
                sources.push(&record.source);
            }
        }

        if context_parts.is_empty() {
            info!("No chunk passed the distance threshold; returning fallback context");
            return Ok(self.fallback_context.clone());
        }

        info!(
            "Retrieved {} chunks (sources: {})",
            context_parts.len(),
            sources.iter().unique().join(", ")
        );
        Ok(context_parts.join(CONTEXT_SEPARATOR))
    }

    /// [`retrieve`](Self::retrieve) with `top_k` chosen from the query's
    /// apparent intent.
    #[inline]
    pub fn retrieve_smart(&self, query: &str) -> Result<String> {
        let top_k = self.compute_top_k(query);
        let preview: String = query.chars().take(60).collect();
        info!("retrieve_smart: top_k={} for query '{}'", top_k, preview);
        self.retrieve(query, top_k)
    }

    /// Ordered-first-match intent classification; the first matching
    /// keyword group wins and groups are never combined.
    #[inline]
    pub fn compute_top_k(&self, query: &str) -> usize {
        let lower = query.to_lowercase();
        let retrieval = &self.config.retrieval;

        if PROJECT_LIST_INTENTS.iter().any(|k| lower.contains(k)) {
            retrieval.projects_top_k
        } else if WORK_INTENTS.iter().any(|k| lower.contains(k)) {
            retrieval.work_top_k
        } else if STACK_INTENTS.iter().any(|k| lower.contains(k)) {
            retrieval.stack_top_k
        } else {
            retrieval.default_top_k
        }
    }

    /// Full-document injection when the query names a project; bypasses
    /// the vector path entirely.
    #[inline]
    pub fn detect_project(&self, query: &str) -> Option<String> {
        self.detector.detect(query)
    }

    #[inline]
    pub fn index_size(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub fn index_dimension(&self) -> Option<usize> {
        self.store.dimension()
    }

    #[inline]
    pub fn catalog_size(&self) -> usize {
        self.detector.len()
    }

    #[inline]
    pub fn fallback_context(&self) -> &str {
        &self.fallback_context
    }

    #[inline]
    pub fn is_stale(&self) -> bool {
        self.store.is_stale(&self.config.data_dir)
    }

    /// Concatenate the reserved fallback documents, searched
    /// case-insensitively anywhere under the document root. Loaded once
    /// here and held for the process lifetime, independent of the index.
    fn load_fallback_context(&mut self) {
        let paths = document_paths(&self.config.data_dir);
        let mut parts = Vec::with_capacity(FALLBACK_FILES.len());

        for fname in FALLBACK_FILES {
            let found = paths.iter().find(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().eq_ignore_ascii_case(fname))
            });

            if let Some(path) = found {
                match fs::read_to_string(path) {
                    Ok(content) => {
                        parts.push(format!("--- {} ---\n{}", fname, content));
                        info!("Fallback document loaded: {}", path.display());
                    }
                    Err(e) => {
                        warn!("Failed to read fallback document {}: {}", path.display(), e);
                    }
                }
            }
        }

        self.fallback_context = parts.join("\n\n");
        if self.fallback_context.is_empty() {
            warn!("No fallback documents found (CURRICULO.md / STACKS.md)");
        }
    }
}
