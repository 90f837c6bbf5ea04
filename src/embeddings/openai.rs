use crate::cache::QueryEmbeddingCache;
use crate::embeddings::Embedder;
use crate::error::{GraphRagError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// OpenAI's hard limit on inputs per embeddings request.
const MAX_BATCH_SIZE: usize = 2048;

/// Retry budget for single-query embedding calls.
const QUERY_MAX_RETRIES: usize = 3;

/// Request structure for OpenAI embeddings API
#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

/// Response structure from OpenAI embeddings API
#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Individual embedding data in API response
#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI embeddings client
///
/// Handles batch embedding generation for the chunk store and cached, retried
/// single-query embedding for retrieval.
pub struct OpenAIEmbedder {
    client: Client,
    api_key: String,
    model: String,
    batch_size: usize,
    dimensions: usize,
    cache: Option<Arc<QueryEmbeddingCache>>,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder
    ///
    /// # Arguments
    ///
    /// * `api_key` - OpenAI API key
    /// * `model` - Model name (e.g., "text-embedding-3-small")
    /// * `batch_size` - Maximum number of texts per API request (capped at 2048)
    /// * `dimensions` - Expected vector dimension; responses of any other size are rejected
    pub fn new(api_key: String, model: String, batch_size: usize, dimensions: usize) -> Result<Self> {
        Self::new_with_cache(api_key, model, batch_size, dimensions, None)
    }

    /// Create a new OpenAI embedder with an optional query-embedding cache
    pub fn new_with_cache(
        api_key: String,
        model: String,
        batch_size: usize,
        dimensions: usize,
        cache: Option<Arc<QueryEmbeddingCache>>,
    ) -> Result<Self> {
        let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GraphRagError::Embedding(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model,
            batch_size,
            dimensions,
            cache,
        })
    }

    /// Internal method to make a single API request
    async fn request(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = texts.len();
        // The API rejects empty strings; a lone space still yields a vector.
        let input = texts
            .into_iter()
            .map(|t| if t.is_empty() { " ".to_string() } else { t })
            .collect();

        let request = EmbeddingRequest {
            model: self.model.clone(),
            input,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| GraphRagError::Embedding(format!("Network error: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(GraphRagError::Embedding(format!(
                "OpenAI API error {}: {}",
                status, body
            )));
        }

        let mut result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| GraphRagError::Embedding(format!("Failed to parse response: {}", e)))?;

        if result.data.len() != expected {
            return Err(GraphRagError::Embedding(format!(
                "Expected {} embeddings, got {}",
                expected,
                result.data.len()
            )));
        }

        result.data.sort_by_key(|d| d.index);

        result
            .data
            .into_iter()
            .map(|d| self.check_dimension(d.embedding))
            .collect()
    }

    fn check_dimension(&self, embedding: Vec<f32>) -> Result<Vec<f32>> {
        if embedding.len() != self.dimensions {
            return Err(GraphRagError::Embedding(format!(
                "Unexpected embedding dimension: expected {}, got {}",
                self.dimensions,
                embedding.len()
            )));
        }
        Ok(embedding)
    }

    /// Embed a single text with retry on 429 / 5xx responses
    async fn embed_with_retry(&self, text: &str, max_retries: usize) -> Result<Vec<f32>> {
        let start = std::time::Instant::now();
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.request(vec![text.to_string()]).await {
                Ok(mut embeddings) => {
                    log::debug!("Embedding API call took {:?} (attempt {})", start.elapsed(), attempt + 1);
                    return Ok(embeddings.remove(0));
                }
                Err(e) if attempt < max_retries && is_retryable(&e) => {
                    log::warn!("Retry {}/{} after error: {}", attempt + 1, max_retries, e);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Rate limits and server errors are worth another attempt; everything else is final.
fn is_retryable(err: &GraphRagError) -> bool {
    let msg = err.to_string();
    ["429", "500", "502", "503", "504"]
        .iter()
        .any(|code| msg.contains(code))
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let embeddings = self.request(batch.to_vec()).await?;
            all_embeddings.extend(embeddings);

            // Small delay between full batches to stay under rate limits
            if batch.len() == self.batch_size {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }

        Ok(all_embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(text) {
                log::debug!("Cache hit for query: {}", text);
                return Ok(cached);
            }
        }

        let embedding = self.embed_with_retry(text, QUERY_MAX_RETRIES).await?;

        if let Some(cache) = &self.cache {
            cache.put(text, embedding.clone());
        }

        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder(batch_size: usize) -> OpenAIEmbedder {
        OpenAIEmbedder::new(
            "test-key".to_string(),
            "text-embedding-3-small".to_string(),
            batch_size,
            1536,
        )
        .unwrap()
    }

    #[test]
    fn test_embedder_new() {
        let embedder = embedder(100);
        assert_eq!(embedder.model, "text-embedding-3-small");
        assert_eq!(embedder.batch_size, 100);
        assert_eq!(embedder.dimensions, 1536);
    }

    #[test]
    fn test_embedder_batch_size_limit() {
        assert_eq!(embedder(5000).batch_size, 2048);
        assert_eq!(embedder(2048).batch_size, 2048);
    }

    #[test]
    fn test_embedder_batch_size_zero_becomes_one() {
        assert_eq!(embedder(0).batch_size, 1);
    }

    #[test]
    fn test_check_dimension() {
        let embedder = embedder(10);
        assert!(embedder.check_dimension(vec![0.0; 1536]).is_ok());
        let err = embedder.check_dimension(vec![0.0; 3]).unwrap_err();
        assert!(err.to_string().contains("expected 1536, got 3"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&GraphRagError::Embedding("OpenAI API error 429 Too Many Requests: slow down".into())));
        assert!(is_retryable(&GraphRagError::Embedding("OpenAI API error 503 Service Unavailable: ".into())));
        assert!(!is_retryable(&GraphRagError::Embedding("OpenAI API error 401 Unauthorized: bad key".into())));
    }

    #[tokio::test]
    async fn test_embed_batch_empty_input_skips_network() {
        let embedder = embedder(10);
        let out = embedder.embed_batch(Vec::new()).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_embed_query_served_from_cache() {
        let cache = Arc::new(QueryEmbeddingCache::new(4));
        cache.put("what is AuthService", vec![0.25; 1536]);
        let embedder = OpenAIEmbedder::new_with_cache(
            "test-key".to_string(),
            "text-embedding-3-small".to_string(),
            10,
            1536,
            Some(cache.clone()),
        )
        .unwrap();

        let v = embedder.embed_query("what is AuthService").await.unwrap();
        assert_eq!(v.len(), 1536);
        assert_eq!(cache.stats(), (1, 0));
    }
}
