// Embeddings module
// Gateway to the external embedding provider, with a trait seam so the
// retrieval engine can be exercised without network access

pub mod gemini;

pub use gemini::GeminiClient;

use crate::Result;

/// Which side of the retrieval pipeline a text is embedded for. Both tasks
/// must return vectors in the same embedding space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedTask {
    /// Index-time embedding of document chunks
    Document,
    /// Query-time embedding of user questions
    Query,
}

impl EmbedTask {
    /// Provider-side task type parameter
    #[inline]
    pub fn task_type(self) -> &'static str {
        match self {
            EmbedTask::Document => "RETRIEVAL_DOCUMENT",
            EmbedTask::Query => "RETRIEVAL_QUERY",
        }
    }
}

/// Boundary to the embedding provider. Implementations perform no retries;
/// callers own retry and backoff policy.
pub trait Embedder {
    fn embed(&self, text: &str, task: EmbedTask) -> Result<Vec<f32>>;
}
