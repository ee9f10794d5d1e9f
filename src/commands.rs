use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::embeddings::GeminiClient;
use crate::index::IndexStore;
use crate::projects::ProjectDetector;
use crate::retrieval::RagEngine;

fn load_engine(base_dir: &Path) -> Result<RagEngine> {
    let config = Config::load(base_dir).context("Failed to load configuration")?;
    let client =
        GeminiClient::new(&config.gemini).context("Failed to initialize embedding client")?;
    Ok(RagEngine::new(config, Box::new(client)))
}

/// Force a full index rebuild from the document root
#[inline]
pub fn build_index(base_dir: &Path) -> Result<()> {
    let mut engine = load_engine(base_dir)?;

    info!("Rebuilding index");
    engine.rebuild().context("Index rebuild failed")?;

    println!(
        "Index rebuilt: {} chunks ({} projects in catalog)",
        engine.index_size(),
        engine.catalog_size()
    );
    Ok(())
}

/// Retrieve context for a query and print it
#[inline]
pub fn run_query(base_dir: &Path, query: &str, top_k: Option<usize>) -> Result<()> {
    let mut engine = load_engine(base_dir)?;
    engine
        .initialize_or_build()
        .context("Failed to initialize retrieval engine")?;

    let context = match top_k {
        Some(top_k) => engine.retrieve(query, top_k)?,
        None => engine.retrieve_smart(query)?,
    };

    println!("{}", context);
    Ok(())
}

/// Check whether the query mentions a project and print its document
#[inline]
pub fn detect_project(base_dir: &Path, query: &str) -> Result<()> {
    let config = Config::load(base_dir).context("Failed to load configuration")?;

    let mut detector = ProjectDetector::new(&config.data_dir);
    detector.load();

    match detector.detect(query) {
        Some(content) => println!("{}", content),
        None => println!("No project detected in query"),
    }
    Ok(())
}

/// Print index, staleness, and catalog status
#[inline]
pub fn show_status(base_dir: &Path) -> Result<()> {
    let config = Config::load(base_dir).context("Failed to load configuration")?;

    let mut store = IndexStore::new(&config);
    println!("Document root: {}", config.data_dir.display());

    if !store.artifacts_exist() {
        println!("Index: not built");
    } else {
        match store.load() {
            Ok(()) => {
                println!(
                    "Index: {} chunks, dimension {}",
                    store.len(),
                    store.dimension().unwrap_or(0)
                );
                let stale = store.is_stale(&config.data_dir);
                println!("Stale: {}", if stale { "yes" } else { "no" });
            }
            Err(e) => println!("Index: corrupt ({})", e),
        }
    }

    let mut detector = ProjectDetector::new(&config.data_dir);
    detector.load();
    println!("Project catalog: {} projects", detector.len());

    Ok(())
}

/// Print the resolved configuration as TOML
#[inline]
pub fn show_config(base_dir: &Path) -> Result<()> {
    let config = Config::load(base_dir).context("Failed to load configuration")?;
    let content =
        toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
    println!("{}", content);
    Ok(())
}
