//! Graph-aware retriever: semantic ranking over embedded chunks, expanded through
//! the knowledge graph around entities named in the query.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use super::hybrid::{combine_and_rerank, hop_penalty};
use super::vector::{chunk_similarity, rank_by_similarity};
use super::{sort_results, RetrievalMethod, RetrievalResult};
use crate::config::RetrievalConfig;
use crate::embeddings::Embedder;
use crate::error::{GraphRagError, Result};
use crate::graph::{Entity, KnowledgeGraph};
use crate::ingest::Chunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrieverOptions {
    /// Results returned when a call does not ask for a specific count.
    pub top_k: usize,
    /// Graph expansion depth around query entities.
    pub max_hops: usize,
}

impl Default for RetrieverOptions {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for RetrieverOptions {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            max_hops: config.max_hops,
        }
    }
}

/// Chunks connecting two entities through the graph.
#[derive(Debug, Clone)]
pub struct MultiHopResult {
    /// Entity names from start to end, inclusive.
    pub path: Vec<String>,
    /// Number of edges on the path.
    pub path_length: usize,
    /// Chunks mentioning any entity on the path, in chunk id order.
    pub chunks: Vec<Arc<Chunk>>,
    pub entities: Vec<Entity>,
}

/// Owns the embedded chunk store and answers queries against it and the graph.
///
/// Immutable after construction; share it behind an `Arc`.
pub struct GraphAwareRetriever {
    chunks: Vec<Arc<Chunk>>,
    by_id: HashMap<String, Arc<Chunk>>,
    graph: Arc<KnowledgeGraph>,
    embedder: Arc<dyn Embedder>,
    options: RetrieverOptions,
}

impl GraphAwareRetriever {
    /// Embed every chunk in one batch pass and index the store by chunk id.
    ///
    /// The store holds one chunk per id: a repeated id keeps its first chunk.
    /// Fails if the embedder fails or returns a vector count or dimension that
    /// does not line up with the chunks.
    pub async fn new(
        chunks: Vec<Chunk>,
        graph: Arc<KnowledgeGraph>,
        embedder: Arc<dyn Embedder>,
        options: RetrieverOptions,
    ) -> Result<Self> {
        let start = Instant::now();

        let mut seen = HashSet::with_capacity(chunks.len());
        let mut chunks: Vec<Chunk> = chunks
            .into_iter()
            .filter(|chunk| {
                let first = seen.insert(chunk.id.clone());
                if !first {
                    log::warn!("Duplicate chunk id {}, keeping the first chunk", chunk.id);
                }
                first
            })
            .collect();

        if !chunks.is_empty() {
            let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
            let vectors = embedder.embed_batch(texts).await?;

            if vectors.len() != chunks.len() {
                return Err(GraphRagError::Embedding(format!(
                    "Embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    chunks.len()
                )));
            }
            let dimension = vectors[0].len();
            if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
                return Err(GraphRagError::Embedding(format!(
                    "Inconsistent embedding dimension: expected {}, got {}",
                    dimension,
                    bad.len()
                )));
            }

            for (chunk, vector) in chunks.iter_mut().zip(vectors) {
                chunk.embedding = Some(vector);
            }
        }

        let chunks: Vec<Arc<Chunk>> = chunks.into_iter().map(Arc::new).collect();
        let by_id: HashMap<String, Arc<Chunk>> = chunks
            .iter()
            .map(|chunk| (chunk.id.clone(), Arc::clone(chunk)))
            .collect();

        log::info!("Embedded {} chunks in {:?}", chunks.len(), start.elapsed());

        Ok(Self {
            chunks,
            by_id,
            graph,
            embedder,
            options,
        })
    }

    pub fn chunks(&self) -> &[Arc<Chunk>] {
        &self.chunks
    }

    pub fn chunk(&self, id: &str) -> Option<&Arc<Chunk>> {
        self.by_id.get(id)
    }

    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    pub fn options(&self) -> RetrieverOptions {
        self.options
    }

    /// Top `k` chunks by cosine similarity to the query.
    pub async fn semantic_search(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        let query_vec = self.embedder.embed_query(query).await?;
        Ok(rank_by_similarity(&query_vec, &self.chunks, k))
    }

    /// Graph entities whose name occurs in `query`, case-insensitively, in name order.
    pub fn extract_query_entities(&self, query: &str) -> Vec<String> {
        let query = query.to_lowercase();
        self.graph
            .entities()
            .keys()
            .filter(|name| query.contains(&name.to_lowercase()))
            .cloned()
            .collect()
    }

    /// Chunks reachable from `entities` within `max_hops`, scored by similarity to
    /// the query damped by hop distance.
    pub async fn graph_based_retrieval(
        &self,
        entities: &[String],
        query: &str,
    ) -> Result<Vec<RetrievalResult>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed_query(query).await?;
        Ok(self.graph_results(entities, &query_vec))
    }

    /// Minimum hop at which each chunk is reached from any of `entities`.
    fn chunk_hops(&self, entities: &[String]) -> BTreeMap<String, usize> {
        let mut hops: BTreeMap<String, usize> = BTreeMap::new();
        let mut reach = |chunk_ids: &BTreeSet<String>, hop: usize| {
            for chunk_id in chunk_ids {
                hops.entry(chunk_id.clone())
                    .and_modify(|h| *h = (*h).min(hop))
                    .or_insert(hop);
            }
        };

        for name in entities {
            let Some(entity) = self.graph.entity(name) else {
                continue;
            };
            reach(&entity.chunks, 0);
            for (neighbor, hop) in self.graph.neighbors_by_hop(name, self.options.max_hops) {
                if let Some(neighbor) = self.graph.entity(&neighbor) {
                    reach(&neighbor.chunks, hop);
                }
            }
        }
        hops
    }

    fn graph_results(&self, entities: &[String], query_vec: &[f32]) -> Vec<RetrievalResult> {
        let mut results: Vec<RetrievalResult> = self
            .chunk_hops(entities)
            .into_iter()
            .filter_map(|(chunk_id, hop)| {
                let chunk = self.by_id.get(&chunk_id)?;
                Some(RetrievalResult {
                    chunk: Arc::clone(chunk),
                    score: chunk_similarity(query_vec, chunk) * hop_penalty(hop),
                    method: RetrievalMethod::Graph,
                    hop_count: hop,
                    related_entities: self.graph.chunk_entities(&chunk_id).to_vec(),
                })
            })
            .collect();
        sort_results(&mut results);
        results
    }

    /// Answer a query, fusing semantic and graph results unless `use_graph` is off.
    ///
    /// The query is embedded once. With `use_graph == false` the result equals
    /// `semantic_search(query, top_k)`.
    pub async fn retrieve(
        &self,
        query: &str,
        use_graph: bool,
        top_k: Option<usize>,
    ) -> Result<Vec<RetrievalResult>> {
        let start = Instant::now();
        let k = top_k.unwrap_or(self.options.top_k);
        let query_vec = self.embedder.embed_query(query).await?;

        let mut semantic = rank_by_similarity(&query_vec, &self.chunks, k.saturating_mul(2));
        if !use_graph {
            semantic.truncate(k);
            return Ok(semantic);
        }

        let entities = self.extract_query_entities(query);
        log::debug!("Query entities: {:?}", entities);
        let graph = if entities.is_empty() {
            Vec::new()
        } else {
            self.graph_results(&entities, &query_vec)
        };

        let mut fused = combine_and_rerank(semantic, graph);
        fused.truncate(k);
        log::debug!("Retrieved {} results in {:?}", fused.len(), start.elapsed());
        Ok(fused)
    }

    /// Chunks related to one entity, without embeddings: 1.0 for chunks that
    /// mention it, 0.5 for chunks of its neighbors. Unknown entity yields nothing.
    pub fn retrieve_by_entity(&self, entity_name: &str, top_k: Option<usize>) -> Vec<RetrievalResult> {
        if self.graph.entity(entity_name).is_none() {
            return Vec::new();
        }
        let k = top_k.unwrap_or(self.options.top_k);
        let hops = self.chunk_hops(&[entity_name.to_string()]);

        let mut results: Vec<RetrievalResult> = self
            .graph
            .get_related_chunks(entity_name, self.options.max_hops)
            .into_iter()
            .filter_map(|chunk_id| {
                let chunk = self.by_id.get(&chunk_id)?;
                let related = self.graph.chunk_entities(&chunk_id);
                let mentions = related.iter().any(|e| e == entity_name);
                Some(RetrievalResult {
                    chunk: Arc::clone(chunk),
                    score: if mentions { 1.0 } else { 0.5 },
                    method: RetrievalMethod::EntityLookup,
                    hop_count: hops.get(&chunk_id).copied().unwrap_or(0),
                    related_entities: related.to_vec(),
                })
            })
            .collect();

        sort_results(&mut results);
        results.truncate(k);
        results
    }

    /// Chunks along the shortest graph path between two entities.
    pub fn multi_hop_query(&self, start_entity: &str, end_entity: &str) -> Option<MultiHopResult> {
        let path = self.graph.get_path_between_entities(start_entity, end_entity)?;

        let entities: Vec<Entity> = path
            .iter()
            .filter_map(|name| self.graph.entity(name).cloned())
            .collect();
        let chunk_ids: BTreeSet<&String> = entities.iter().flat_map(|e| e.chunks.iter()).collect();
        let chunks = chunk_ids
            .into_iter()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect();

        Some(MultiHopResult {
            path_length: path.len().saturating_sub(1),
            path,
            chunks,
            entities,
        })
    }
}
