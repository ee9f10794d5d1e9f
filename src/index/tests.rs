use super::*;
use crate::RagError;
use crate::config::Config;
use crate::embeddings::{EmbedTask, Embedder};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Deterministic embedder: the vector depends only on marker words in the
/// text, so index geometry is fully controlled by the fixture documents.
struct StubEmbedder {
    calls: AtomicUsize,
    fail_on: Option<&'static str>,
}

impl StubEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: None,
        }
    }

    fn failing_on(marker: &'static str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: Some(marker),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for StubEmbedder {
    fn embed(&self, text: &str, _task: EmbedTask) -> crate::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(marker) = self.fail_on {
            if text.contains(marker) {
                return Err(crate::RagError::Embedding("stubbed outage".to_string()));
            }
        }

        let mut vector = vec![0.0_f32; 4];
        for (i, marker) in ["alpha", "beta", "gamma", "delta"].iter().enumerate() {
            if text.contains(marker) {
                vector[i] = 1.0;
            }
        }
        Ok(vector)
    }
}

fn test_setup() -> (Config, TempDir, TempDir) {
    let base = TempDir::new().expect("can create base dir");
    let data = TempDir::new().expect("can create data dir");

    let mut config = Config::load(base.path()).expect("config loads");
    config.data_dir = data.path().to_path_buf();
    (config, base, data)
}

fn write_doc(dir: &std::path::Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("can create dirs");
    }
    std::fs::write(path, content).expect("can write doc");
}

mod flat_index {
    use super::*;

    #[test]
    fn from_rows_and_search_ascending() {
        let index = FlatIndex::from_rows(vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.9, 0.1],
        ])
        .expect("rows share dimension");

        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), 2);

        let hits = index.search(&[1.0, 0.0], 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk_id, 0);
        assert_eq!(hits[1].chunk_id, 2);
        assert_eq!(hits[2].chunk_id, 1);
        assert!(hits[0].distance <= hits[1].distance);
        assert!(hits[1].distance <= hits[2].distance);
    }

    #[test]
    fn search_returns_fewer_when_index_is_small() {
        let index = FlatIndex::from_rows(vec![vec![0.0, 0.0]]).expect("valid rows");
        assert_eq!(index.search(&[0.0, 0.0], 10).len(), 1);
    }

    #[test]
    fn empty_index_returns_empty_results() {
        let index = FlatIndex::from_rows(Vec::new()).expect("empty rows are fine");
        assert!(index.is_empty());
        assert!(index.search(&[1.0, 2.0], 5).is_empty());
    }

    #[test]
    fn dimension_mismatch_in_rows_is_rejected() {
        let result = FlatIndex::from_rows(vec![vec![1.0, 0.0], vec![1.0]]);
        assert!(matches!(result, Err(RagError::Embedding(_))));
    }

    #[test]
    fn mismatched_query_dimension_returns_empty() {
        let index = FlatIndex::from_rows(vec![vec![1.0, 0.0]]).expect("valid rows");
        assert!(index.search(&[1.0, 0.0, 0.0], 1).is_empty());
    }
}

#[test]
fn build_persists_both_artifacts() {
    let (config, _base, data) = test_setup();
    write_doc(data.path(), "a.md", "alpha content here");
    write_doc(data.path(), "b.md", "beta content here");

    let mut store = IndexStore::new(&config);
    let embedder = StubEmbedder::new();
    store
        .build(data.path(), &config.chunking, &embedder)
        .expect("build succeeds");

    assert_eq!(store.len(), 2);
    assert!(config.index_path().exists());
    assert!(config.metadata_path().exists());
}

#[test]
fn chunk_ids_match_row_positions() {
    let (config, _base, data) = test_setup();
    write_doc(data.path(), "a.md", "alpha doc");
    write_doc(data.path(), "b.md", "beta doc");
    write_doc(data.path(), "projects/c.md", "gamma doc");

    let mut store = IndexStore::new(&config);
    store
        .build(data.path(), &config.chunking, &StubEmbedder::new())
        .expect("build succeeds");

    for i in 0..store.len() {
        let record = store.record(i).expect("record exists");
        assert_eq!(record.id, i);
    }

    let mut reloaded = IndexStore::new(&config);
    reloaded.load().expect("load succeeds");
    assert_eq!(reloaded.len(), store.len());
    for i in 0..reloaded.len() {
        assert_eq!(reloaded.record(i).expect("record exists").id, i);
    }
}

#[test]
fn metadata_carries_source_and_flags() {
    let (config, _base, data) = test_setup();
    write_doc(data.path(), "curriculo.md", "alpha curriculum");
    write_doc(data.path(), "projects/app.md", "beta project");

    let mut store = IndexStore::new(&config);
    store
        .build(data.path(), &config.chunking, &StubEmbedder::new())
        .expect("build succeeds");

    let fallback = store
        .record(0)
        .expect("curriculo chunk is row 0, lexicographic order");
    assert_eq!(fallback.source, "curriculo.md");
    assert!(fallback.is_fallback);
    assert!(!fallback.is_project);

    let project = store.record(1).expect("project chunk is row 1");
    assert_eq!(project.source, "projects/app.md");
    assert!(project.is_project);
    assert!(!project.is_fallback);
}

#[test]
fn embedding_failures_skip_chunks_without_aborting() {
    let (config, _base, data) = test_setup();
    write_doc(data.path(), "good.md", "alpha survives");
    write_doc(data.path(), "poison.md", "beta poisoned text");

    let mut store = IndexStore::new(&config);
    let embedder = StubEmbedder::failing_on("poisoned");
    store
        .build(data.path(), &config.chunking, &embedder)
        .expect("build succeeds despite one failure");

    assert_eq!(store.len(), 1);
    assert_eq!(store.record(0).expect("record exists").source, "good.md");
    // Ids stay gapless after the skip
    assert_eq!(store.record(0).expect("record exists").id, 0);
}

#[test]
fn empty_document_root_leaves_index_empty() {
    let (config, _base, data) = test_setup();

    let mut store = IndexStore::new(&config);
    store
        .build(data.path(), &config.chunking, &StubEmbedder::new())
        .expect("build succeeds on empty root");

    assert!(store.is_empty());
    assert!(store.search(&[1.0, 0.0, 0.0, 0.0], 5).is_empty());
}

#[test]
fn load_without_artifacts_is_corrupt() {
    let (config, _base, _data) = test_setup();

    let mut store = IndexStore::new(&config);
    assert!(matches!(store.load(), Err(RagError::IndexCorrupt(_))));
}

#[test]
fn load_with_one_artifact_missing_is_corrupt() {
    let (config, _base, data) = test_setup();
    write_doc(data.path(), "a.md", "alpha");

    let mut store = IndexStore::new(&config);
    store
        .build(data.path(), &config.chunking, &StubEmbedder::new())
        .expect("build succeeds");

    std::fs::remove_file(config.metadata_path()).expect("can remove metadata");

    let mut reloaded = IndexStore::new(&config);
    assert!(matches!(reloaded.load(), Err(RagError::IndexCorrupt(_))));
}

#[test]
fn load_with_mismatched_sizes_is_corrupt() {
    let (config, _base, data) = test_setup();
    write_doc(data.path(), "a.md", "alpha");
    write_doc(data.path(), "b.md", "beta");

    let mut store = IndexStore::new(&config);
    store
        .build(data.path(), &config.chunking, &StubEmbedder::new())
        .expect("build succeeds");

    // Truncate the metadata list to break parity with the index
    let records: Vec<ChunkRecord> = serde_json::from_reader(
        std::fs::File::open(config.metadata_path()).expect("can open metadata"),
    )
    .expect("metadata parses");
    serde_json::to_writer(
        std::fs::File::create(config.metadata_path()).expect("can rewrite metadata"),
        &records[..1],
    )
    .expect("can write truncated metadata");

    let mut reloaded = IndexStore::new(&config);
    assert!(matches!(reloaded.load(), Err(RagError::IndexCorrupt(_))));
}

#[test]
fn staleness_tracks_document_mtimes() {
    let (config, _base, data) = test_setup();
    write_doc(data.path(), "a.md", "alpha");

    let mut store = IndexStore::new(&config);
    store
        .build(data.path(), &config.chunking, &StubEmbedder::new())
        .expect("build succeeds");

    assert!(!store.is_stale(data.path()));

    // Push the document mtime past the artifact mtime
    let future = std::time::SystemTime::now() + std::time::Duration::from_secs(60);
    let file = std::fs::File::options()
        .write(true)
        .open(data.path().join("a.md"))
        .expect("can open doc");
    file.set_modified(future).expect("can set mtime");

    assert!(store.is_stale(data.path()));
}

#[test]
fn missing_artifact_counts_as_stale() {
    let (config, _base, data) = test_setup();
    write_doc(data.path(), "a.md", "alpha");

    let store = IndexStore::new(&config);
    assert!(store.is_stale(data.path()));
}

#[test]
fn search_maps_hits_back_to_records() {
    let (config, _base, data) = test_setup();
    write_doc(data.path(), "a.md", "alpha text");
    write_doc(data.path(), "b.md", "beta text");

    let mut store = IndexStore::new(&config);
    let embedder = StubEmbedder::new();
    store
        .build(data.path(), &config.chunking, &embedder)
        .expect("build succeeds");

    let query = embedder
        .embed("beta text", EmbedTask::Query)
        .expect("stub embeds");
    let hits = store.search(&query, 2);

    assert_eq!(hits.len(), 2);
    let best = store.record(hits[0].chunk_id).expect("record exists");
    assert_eq!(best.source, "b.md");
    assert!(embedder.call_count() >= 3);
}
