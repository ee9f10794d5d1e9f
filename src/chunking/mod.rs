
use serde::{Deserialize, Serialize};

/// Configuration for word-window chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Number of whitespace-delimited tokens per chunk
    pub chunk_size: usize,
    /// Tokens shared between consecutive chunks of the same document
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 100,
        }
    }
}

/// Split text into overlapping word windows.
///
/// Each chunk holds `size` tokens and consecutive chunks start
/// `size - overlap` tokens apart; the final chunk may be shorter. Any
/// non-empty input produces at least one chunk. An `overlap >= size` is
/// rejected by config validation upstream and clamped here so the window
/// always advances.
#[inline]
pub fn chunk_words(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || size == 0 {
        return Vec::new();
    }

    let stride = size.saturating_sub(overlap).max(1);

    let mut chunks = Vec::with_capacity(words.len().div_ceil(stride));
    let mut start = 0;
    while start < words.len() {
        let end = (start + size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += stride;
    }

    chunks
}
