//! Directed multigraph index over entities, derived from entities + relations.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, HashMap};

use super::{Entity, Relation, RelationType};

/// Identity of an aggregated edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
    pub relation_type: RelationType,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct EdgeData {
    pub relation_type: RelationType,
    pub weight: f64,
}

/// One node per entity; one edge per distinct `(source, target, relation_type)`
/// whose weight is the sum of the matching relation observations.
#[derive(Debug, Default)]
pub struct GraphIndex {
    pub(super) graph: DiGraph<String, EdgeData>,
    pub(super) nodes: HashMap<String, NodeIndex>,
}

impl GraphIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from scratch. Relations touching unknown entities are skipped.
    pub fn build(entities: &BTreeMap<String, Entity>, relations: &[Relation]) -> Self {
        let mut graph = DiGraph::with_capacity(entities.len(), relations.len());
        let mut nodes = HashMap::with_capacity(entities.len());

        for name in entities.keys() {
            nodes.insert(name.clone(), graph.add_node(name.clone()));
        }

        let mut aggregated: BTreeMap<EdgeKey, f64> = BTreeMap::new();
        for relation in relations {
            if !nodes.contains_key(&relation.source) || !nodes.contains_key(&relation.target) {
                log::debug!(
                    "Skipping relation {} -{}-> {}: endpoint is not an entity",
                    relation.source,
                    relation.relation_type,
                    relation.target
                );
                continue;
            }
            let key = EdgeKey {
                source: relation.source.clone(),
                target: relation.target.clone(),
                relation_type: relation.relation_type,
            };
            *aggregated.entry(key).or_insert(0.0) += relation.weight;
        }

        for (key, weight) in aggregated {
            let (source, target) = (nodes[&key.source], nodes[&key.target]);
            graph.add_edge(
                source,
                target,
                EdgeData {
                    relation_type: key.relation_type,
                    weight,
                },
            );
        }

        Self { graph, nodes }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Aggregated weight of every edge.
    pub fn edge_weights(&self) -> BTreeMap<EdgeKey, f64> {
        self.graph
            .edge_references()
            .map(|edge| {
                let key = EdgeKey {
                    source: self.graph[edge.source()].clone(),
                    target: self.graph[edge.target()].clone(),
                    relation_type: edge.weight().relation_type,
                };
                (key, edge.weight().weight)
            })
            .collect()
    }
}
