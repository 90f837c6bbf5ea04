use std::sync::Arc;

use super::{sort_results, RetrievalMethod, RetrievalResult};
use crate::ingest::Chunk;

/// Rank every chunk by cosine similarity to `query_vec` and keep the top `k`.
///
/// Chunks without an embedding score 0.0 and still compete for a slot. Ties
/// resolve by ascending chunk id so the ranking is reproducible.
pub fn rank_by_similarity(query_vec: &[f32], chunks: &[Arc<Chunk>], k: usize) -> Vec<RetrievalResult> {
    let mut results: Vec<RetrievalResult> = chunks
        .iter()
        .map(|chunk| RetrievalResult {
            chunk: Arc::clone(chunk),
            score: chunk_similarity(query_vec, chunk),
            method: RetrievalMethod::Semantic,
            hop_count: 0,
            related_entities: Vec::new(),
        })
        .collect();

    sort_results(&mut results);
    results.truncate(k);
    results
}

/// Cosine similarity between the query and a chunk's embedding; 0.0 without one.
pub fn chunk_similarity(query_vec: &[f32], chunk: &Chunk) -> f32 {
    chunk
        .embedding
        .as_deref()
        .map(|embedding| cosine_similarity(query_vec, embedding))
        .unwrap_or(0.0)
}

/// Compute cosine similarity between two vectors
///
/// Returns a value between -1.0 and 1.0. Vectors of different lengths and zero
/// magnitude vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();

    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, embedding: Option<Vec<f32>>) -> Arc<Chunk> {
        let mut chunk = Chunk::with_id(id, "text");
        chunk.embedding = embedding;
        Arc::new(chunk)
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let similarity = cosine_similarity(&a, &b);
        assert!((similarity - 1.0).abs() < 1e-6, "Identical vectors should have similarity 1.0");
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let similarity = cosine_similarity(&a, &b);
        assert!(similarity.abs() < 1e-6, "Orthogonal vectors should have similarity 0.0");
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        let similarity = cosine_similarity(&a, &b);
        assert!((similarity + 1.0).abs() < 1e-6, "Opposite vectors should have similarity -1.0");
    }

    #[test]
    fn test_cosine_similarity_zero_magnitude() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0, "Zero magnitude vector should return 0.0");
    }

    #[test]
    fn test_cosine_similarity_length_mismatch() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_similarity_different_magnitudes() {
        let a = vec![1.0, 1.0];
        let b = vec![10.0, 10.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rank_scores_missing_embeddings_as_zero() {
        let chunks = vec![
            chunk("b", Some(vec![1.0, 0.0])),
            chunk("a", None),
            chunk("c", Some(vec![0.0, 1.0])),
        ];
        let ranked = rank_by_similarity(&[1.0, 0.0], &chunks, 10);

        let order: Vec<_> = ranked.iter().map(|r| (r.chunk_id(), r.score)).collect();
        assert_eq!(order, vec![("b", 1.0), ("a", 0.0), ("c", 0.0)]);
        assert!(ranked.iter().all(|r| r.method == RetrievalMethod::Semantic && r.hop_count == 0));
    }

    #[test]
    fn test_rank_truncates_to_k() {
        let chunks: Vec<_> = (0..5).map(|i| chunk(&format!("c{}", i), Some(vec![1.0, i as f32]))).collect();
        let ranked = rank_by_similarity(&[1.0, 0.0], &chunks, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].chunk_id(), "c0");
        assert!(rank_by_similarity(&[1.0, 0.0], &chunks, 0).is_empty());
    }
}
