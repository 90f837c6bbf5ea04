//! Retrieval: semantic ranking, graph expansion and score fusion.

pub mod hybrid;
pub mod retriever;
pub mod vector;

pub use hybrid::{combine_and_rerank, hop_penalty};
pub use retriever::{GraphAwareRetriever, MultiHopResult, RetrieverOptions};
pub use vector::cosine_similarity;

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::ingest::Chunk;

/// How a result was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMethod {
    Semantic,
    Graph,
    Hybrid,
    EntityLookup,
}

impl RetrievalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMethod::Semantic => "semantic",
            RetrievalMethod::Graph => "graph",
            RetrievalMethod::Hybrid => "hybrid",
            RetrievalMethod::EntityLookup => "entity_lookup",
        }
    }
}

impl fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A scored chunk. `score` is only comparable among results of one call.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub chunk: Arc<Chunk>,
    pub score: f32,
    pub method: RetrievalMethod,
    /// Graph distance from the nearest query entity; 0 for non-graph results.
    pub hop_count: usize,
    pub related_entities: Vec<String>,
}

impl RetrievalResult {
    pub fn chunk_id(&self) -> &str {
        &self.chunk.id
    }
}

/// Sort by descending score, ties by ascending chunk id.
pub(crate) fn sort_results(results: &mut [RetrievalResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
}
