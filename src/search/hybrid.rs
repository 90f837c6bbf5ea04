use std::collections::BTreeMap;

use super::{sort_results, RetrievalMethod, RetrievalResult};

/// Per-hop decay of graph scores.
pub const HOP_DECAY: f32 = 0.3;
/// Weight of the semantic score in a fused result.
pub const SEMANTIC_WEIGHT: f32 = 0.5;
/// Weight of the graph score in a fused result.
pub const GRAPH_WEIGHT: f32 = 0.5;

/// Multiplier applied to a chunk reached `hops` steps from a query entity:
/// `1 / (1 + 0.3 * hops)`.
pub fn hop_penalty(hops: usize) -> f32 {
    1.0 / (1.0 + HOP_DECAY * hops as f32)
}

/// Fuse semantic and graph results by chunk id.
///
/// A chunk present in both lists scores `0.5 * semantic + 0.5 * graph` and is
/// tagged [`RetrievalMethod::Hybrid`]; the result object kept is the one with the
/// higher individual score (semantic on ties). Chunks found by one method keep
/// their own score and tag. Output is sorted by descending score, ties by chunk id.
pub fn combine_and_rerank(
    semantic: Vec<RetrievalResult>,
    graph: Vec<RetrievalResult>,
) -> Vec<RetrievalResult> {
    let mut merged: BTreeMap<String, (Option<RetrievalResult>, Option<RetrievalResult>)> =
        BTreeMap::new();

    for result in semantic {
        let slot = &mut merged.entry(result.chunk.id.clone()).or_default().0;
        if slot.is_none() {
            *slot = Some(result);
        }
    }
    for result in graph {
        let slot = &mut merged.entry(result.chunk.id.clone()).or_default().1;
        if slot.is_none() {
            *slot = Some(result);
        }
    }

    let mut fused: Vec<RetrievalResult> = merged
        .into_values()
        .filter_map(|pair| match pair {
            (Some(sem), Some(gr)) => {
                let score = SEMANTIC_WEIGHT * sem.score + GRAPH_WEIGHT * gr.score;
                let mut kept = if gr.score > sem.score { gr } else { sem };
                kept.score = score;
                kept.method = RetrievalMethod::Hybrid;
                Some(kept)
            }
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        })
        .collect();

    sort_results(&mut fused);
    fused
}
