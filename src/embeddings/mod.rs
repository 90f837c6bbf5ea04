//! Embedding collaborator: the seam between the retriever and whatever turns text
//! into fixed-dimension vectors.

pub mod openai;

pub use openai::OpenAIEmbedder;

use crate::error::{GraphRagError, Result};
use async_trait::async_trait;

/// Turns text into fixed-dimension vectors.
///
/// Implementations must return exactly one vector per input text, in input order,
/// all of the same dimension. Retries (if any) belong to the implementation; the
/// retriever treats every error as final.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts. Empty strings still produce a vector.
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GraphRagError::Embedding("Empty response for query embedding".to_string()))
    }
}
