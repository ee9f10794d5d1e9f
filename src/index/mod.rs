#[cfg(test)]
mod tests;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chunking::{ChunkingConfig, chunk_words};
use crate::config::Config;
use crate::documents::{document_paths, load_document};
use crate::embeddings::{EmbedTask, Embedder};
use crate::{RagError, Result};

/// Metadata for one indexed chunk. The `id` equals the chunk's row in the
/// flat index, which is what lets search hits map back to metadata by
/// direct array lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkRecord {
    pub id: usize,
    pub text: String,
    /// Originating document's path relative to the document root
    pub source: String,
    pub is_project: bool,
    pub is_fallback: bool,
}

/// One nearest-neighbor hit, ascending by L2 distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    pub distance: f32,
    pub chunk_id: usize,
}

/// Exact L2 nearest-neighbor index over a dense row-major matrix.
/// No approximation and no pruning; every query scans every row.
#[derive(Debug, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Assemble the index from per-chunk vectors, consuming the list so
    /// its backing storage is freed as rows move into the dense matrix.
    #[inline]
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Ok(Self {
                dimension: 0,
                data: Vec::new(),
            });
        };

        let dimension = first.len();
        let mut data = Vec::with_capacity(rows.len() * dimension);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != dimension {
                return Err(RagError::Embedding(format!(
                    "Embedding dimension mismatch at row {}: expected {}, got {}",
                    i,
                    dimension,
                    row.len()
                )));
            }
            data.extend(row);
        }

        Ok(Self { dimension, data })
    }

    #[inline]
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Exact search for the `k` nearest rows by Euclidean distance.
    /// Returns fewer than `k` results when the index is small, and an
    /// empty list for an empty index or a dimension mismatch.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchResult> {
        if self.is_empty() || k == 0 {
            return Vec::new();
        }
        if query.len() != self.dimension {
            warn!(
                "Query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            );
            return Vec::new();
        }

        let mut hits: Vec<SearchResult> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(row, vector)| {
                let squared: f32 = vector
                    .iter()
                    .zip(query)
                    .map(|(a, b)| {
                        let diff = a - b;
                        diff * diff
                    })
                    .sum();
                SearchResult {
                    distance: squared.sqrt(),
                    chunk_id: row,
                }
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        hits
    }
}

/// Owns the flat index and its parallel chunk metadata, plus their
/// build/persist/load/staleness lifecycle. The index and metadata are
/// persisted as two artifacts which must stay mutually consistent.
pub struct IndexStore {
    index_path: PathBuf,
    metadata_path: PathBuf,
    index: Option<FlatIndex>,
    records: Vec<ChunkRecord>,
}

struct PendingChunk {
    text: String,
    source: String,
    is_project: bool,
    is_fallback: bool,
}

impl IndexStore {
    #[inline]
    pub fn new(config: &Config) -> Self {
        Self {
            index_path: config.index_path(),
            metadata_path: config.metadata_path(),
            index: None,
            records: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.as_ref().map_or(0, FlatIndex::len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.index.as_ref().map(FlatIndex::dimension)
    }

    #[inline]
    pub fn record(&self, chunk_id: usize) -> Option<&ChunkRecord> {
        self.records.get(chunk_id)
    }

    /// Both on-disk artifacts exist
    #[inline]
    pub fn artifacts_exist(&self) -> bool {
        self.index_path.exists() && self.metadata_path.exists()
    }

    /// The index is stale when any source document was modified after the
    /// index artifact was written. Staleness forces an unconditional
    /// rebuild.
    #[inline]
    pub fn is_stale(&self, data_dir: &Path) -> bool {
        let Ok(index_meta) = fs::metadata(&self.index_path) else {
            return true;
        };
        let Ok(index_mtime) = index_meta.modified() else {
            return true;
        };

        let newest_doc = document_paths(data_dir)
            .iter()
            .filter_map(|path| fs::metadata(path).and_then(|m| m.modified()).ok())
            .max()
            .unwrap_or(SystemTime::UNIX_EPOCH);

        newest_doc > index_mtime
    }

    /// Rebuild the index from the document root and persist both artifacts.
    ///
    /// Per-document read failures and per-chunk embedding failures are
    /// logged and skipped so a partial corpus still produces a usable
    /// index. The build runs in three bounded memory phases: extraction,
    /// embedding, indexing; each phase's transient collection is consumed
    /// before the next allocates.
    #[inline]
    pub fn build(
        &mut self,
        data_dir: &Path,
        chunking: &ChunkingConfig,
        embedder: &dyn Embedder,
    ) -> Result<()> {
        let paths = document_paths(data_dir);
        info!("Indexing {} markdown files from {}", paths.len(), data_dir.display());

        // Phase 1: extraction. Each document is read, chunked, and dropped
        // before the next one is read; only chunk texts survive the phase.
        let mut pending: Vec<PendingChunk> = Vec::new();
        for path in &paths {
            let document = match load_document(data_dir, path) {
                Ok(Some(document)) => document,
                Ok(None) => {
                    debug!("Skipping empty document {}", path.display());
                    continue;
                }
                Err(e) => {
                    warn!("Skipping unreadable document {}: {}", path.display(), e);
                    continue;
                }
            };

            let text = document.chunkable_text();
            for chunk in chunk_words(&text, chunking.chunk_size, chunking.overlap) {
                pending.push(PendingChunk {
                    text: chunk,
                    source: document.relative_path.clone(),
                    is_project: document.is_project,
                    is_fallback: document.is_fallback,
                });
            }
        }

        if pending.is_empty() {
            warn!("No text extracted from document root; index left empty");
            self.index = None;
            self.records.clear();
            return Ok(());
        }

        let total_chunks = pending.len();

        // Phase 2: embedding. Chunk texts move into their metadata records
        // as each chunk is embedded; `pending` is consumed here and freed
        // before the dense matrix is assembled.
        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(total_chunks);
        let mut records: Vec<ChunkRecord> = Vec::with_capacity(total_chunks);
        let progress = ProgressBar::new(total_chunks as u64);
        for chunk in pending {
            match embedder.embed(&chunk.text, EmbedTask::Document) {
                Ok(vector) => {
                    records.push(ChunkRecord {
                        id: records.len(),
                        text: chunk.text,
                        source: chunk.source,
                        is_project: chunk.is_project,
                        is_fallback: chunk.is_fallback,
                    });
                    embeddings.push(vector);
                }
                Err(e) => {
                    warn!("Skipping chunk from {}: {}", chunk.source, e);
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        if records.is_empty() {
            warn!("All chunk embeddings failed; index left empty");
            self.index = None;
            self.records.clear();
            return Ok(());
        }

        // Phase 3: indexing. The list-of-vectors form is flattened into
        // the dense matrix, freeing the per-row allocations.
        let index = FlatIndex::from_rows(embeddings)?;

        self.persist(&index, &records)?;
        self.index = Some(index);
        self.records = records;

        info!(
            "Index built with {} chunks ({} skipped)",
            self.records.len(),
            total_chunks - self.records.len()
        );
        Ok(())
    }

    /// Load both artifacts from disk.
    ///
    /// A missing artifact, an unreadable blob, or a size mismatch between
    /// the index and the metadata list is [`RagError::IndexCorrupt`];
    /// callers treat that as a forced rebuild since the source documents
    /// remain the source of truth.
    #[inline]
    pub fn load(&mut self) -> Result<()> {
        if !self.index_path.exists() {
            return Err(RagError::IndexCorrupt(format!(
                "Index artifact missing: {}",
                self.index_path.display()
            )));
        }
        if !self.metadata_path.exists() {
            return Err(RagError::IndexCorrupt(format!(
                "Metadata artifact missing: {}",
                self.metadata_path.display()
            )));
        }

        let index_file = BufReader::new(File::open(&self.index_path)?);
        let index: FlatIndex = bincode::deserialize_from(index_file)
            .map_err(|e| RagError::IndexCorrupt(format!("Failed to decode index blob: {}", e)))?;

        let metadata_file = BufReader::new(File::open(&self.metadata_path)?);
        let records: Vec<ChunkRecord> = serde_json::from_reader(metadata_file).map_err(|e| {
            RagError::IndexCorrupt(format!("Failed to decode metadata blob: {}", e))
        })?;

        if index.len() != records.len() {
            return Err(RagError::IndexCorrupt(format!(
                "Index holds {} vectors but metadata lists {} chunks",
                index.len(),
                records.len()
            )));
        }
        if let Some(record) = records.iter().enumerate().find(|(i, r)| r.id != *i) {
            return Err(RagError::IndexCorrupt(format!(
                "Metadata id {} does not match its row position {}",
                record.1.id, record.0
            )));
        }

        info!("Loaded index with {} chunks", records.len());
        self.index = Some(index);
        self.records = records;
        Ok(())
    }

    /// Search the index for the `k` nearest chunks. An empty or
    /// uninitialized index returns an empty list, never an error.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchResult> {
        self.index
            .as_ref()
            .map_or_else(Vec::new, |index| index.search(query, k))
    }

    fn persist(&self, index: &FlatIndex, records: &[ChunkRecord]) -> Result<()> {
        if let Some(parent) = self.index_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut index_file = BufWriter::new(File::create(&self.index_path)?);
        bincode::serialize_into(&mut index_file, index)
            .map_err(|e| RagError::IndexCorrupt(format!("Failed to encode index blob: {}", e)))?;
        index_file.flush()?;

        let mut metadata_file = BufWriter::new(File::create(&self.metadata_path)?);
        serde_json::to_writer(&mut metadata_file, records).map_err(|e| {
            RagError::IndexCorrupt(format!("Failed to encode metadata blob: {}", e))
        })?;
        metadata_file.flush()?;

        debug!(
            "Persisted index to {} and metadata to {}",
            self.index_path.display(),
            self.metadata_path.display()
        );
        Ok(())
    }
}
