
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Filenames whose full content doubles as guaranteed fallback context,
/// matched case-insensitively anywhere under the document root.
pub const FALLBACK_FILES: [&str; 2] = ["CURRICULO.md", "STACKS.md"];

/// Subdirectory under the document root holding one markdown file per project
pub const PROJECTS_DIR: &str = "projects";

/// A portfolio document read from the document root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path relative to the document root, with forward slashes
    pub relative_path: String,
    /// Raw file content, without the synthetic header
    pub content: String,
    /// Tags declared in the front-matter block, if any
    pub tags: Vec<String>,
    pub is_project: bool,
    pub is_fallback: bool,
}

impl Document {
    /// Header-prefixed text handed to the chunker, so document identity
    /// stays retrievable once the text is cut into windows.
    #[inline]
    pub fn chunkable_text(&self) -> String {
        let mut header = format!("--- Documento: {} ---\n", self.relative_path);
        if !self.tags.is_empty() {
            header.push_str(&format!("Tags: {}\n", self.tags.join(", ")));
        }
        header + &self.content
    }
}

/// Whether a filename belongs to the reserved fallback set
#[inline]
pub fn is_fallback_name(file_name: &str) -> bool {
    FALLBACK_FILES
        .iter()
        .any(|f| f.eq_ignore_ascii_case(file_name))
}

/// Enumerate every markdown file under `root` in lexicographic path order.
/// A missing root yields an empty list; the document set is best-effort
/// input to the index build, never a hard failure.
#[inline]
pub fn document_paths(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        warn!("Document root not found: {}", root.display());
        return Vec::new();
    }

    let mut paths: Vec<_> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            !entry.file_type().is_dir()
                && entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
        })
        .map(|entry| entry.into_path())
        .collect();
    paths.sort();
    paths
}

/// Read a single document. Returns `Ok(None)` for files with no readable
/// content, which callers log and skip.
#[inline]
pub fn load_document(root: &Path, path: &Path) -> Result<Option<Document>> {
    let content = fs::read_to_string(path)?;

    if content.trim().is_empty() {
        return Ok(None);
    }

    let relative_path = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/");

    let is_project = relative_path.starts_with(&format!("{}/", PROJECTS_DIR));
    let is_fallback = path
        .file_name()
        .is_some_and(|name| is_fallback_name(&name.to_string_lossy()));

    let tags = parse_front_matter_tags(&content);

    Ok(Some(Document {
        relative_path,
        content,
        tags,
        is_project,
        is_fallback,
    }))
}

/// Load every markdown document under `root`, skipping unreadable and
/// empty files. Convenience for callers that can afford the whole set in
/// memory at once; the index build reads one document at a time instead.
#[inline]
pub fn load_documents(root: &Path) -> Vec<Document> {
    let paths = document_paths(root);
    let mut documents = Vec::with_capacity(paths.len());

    for path in &paths {
        match load_document(root, path) {
            Ok(Some(document)) => documents.push(document),
            Ok(None) => debug!("Skipping empty document {}", path.display()),
            Err(e) => warn!("Skipping unreadable document {}: {}", path.display(), e),
        }
    }

    debug!(
        "Loaded {} documents from {}",
        documents.len(),
        root.display()
    );
    documents
}

/// Extract the `tags: [a, b, c]` field from a leading front-matter block.
///
/// The block is three dashes on the first line, arbitrary lines, then three
/// dashes again. Anything malformed yields an empty tag set, never an error.
fn parse_front_matter_tags(content: &str) -> Vec<String> {
    let mut lines = content.lines();
    if lines.next().map(str::trim) != Some("---") {
        return Vec::new();
    }

    for line in lines {
        let trimmed = line.trim();
        if trimmed == "---" {
            break;
        }
        if let Some(rest) = trimmed.strip_prefix("tags:") {
            let rest = rest.trim();
            if let Some(list) = rest
                .strip_prefix('[')
                .and_then(|inner| inner.strip_suffix(']'))
            {
                return list
                    .split(',')
                    .map(|tag| tag.trim().to_string())
                    .filter(|tag| !tag.is_empty())
                    .collect();
            }
            break;
        }
    }

    Vec::new()
}
