use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Instant;

use super::extraction::{extract_relations, EntityExtractor, PatternExtractor};
use super::index::{EdgeKey, GraphIndex};
use super::{Entity, EntityType, Relation, RelationType};
use crate::ingest::Chunk;

/// Per-name tally collected during the first build pass.
#[derive(Default)]
struct Tally {
    mentions: usize,
    chunks: BTreeSet<String>,
    strongest: Option<EntityType>,
}

/// Dependency neighborhood of one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyReport {
    pub entity: String,
    /// Entities this one depends on, uses or calls.
    pub depends_on: BTreeSet<String>,
    /// Entities that depend on, use or call this one.
    pub dependents: BTreeSet<String>,
}

/// Entity/relation store with a derived directed graph index.
///
/// Entities and relations are authoritative; `chunk_to_entities` and the index are
/// recomputed from them by [`KnowledgeGraph::build_from_chunks`] and
/// [`KnowledgeGraph::load`].
pub struct KnowledgeGraph {
    min_entity_freq: usize,
    extractor: Box<dyn EntityExtractor>,
    pub(super) entities: BTreeMap<String, Entity>,
    pub(super) relations: Vec<Relation>,
    pub(super) chunk_to_entities: BTreeMap<String, Vec<String>>,
    pub(super) index: GraphIndex,
}

impl std::fmt::Debug for KnowledgeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeGraph")
            .field("min_entity_freq", &self.min_entity_freq)
            .field("entities", &self.entities.len())
            .field("relations", &self.relations.len())
            .field("edges", &self.index.edge_count())
            .finish()
    }
}

impl KnowledgeGraph {
    /// Empty graph using the pattern extractor.
    pub fn new(min_entity_freq: usize) -> Self {
        Self::with_extractor(min_entity_freq, Box::new(PatternExtractor))
    }

    pub fn with_extractor(min_entity_freq: usize, extractor: Box<dyn EntityExtractor>) -> Self {
        Self {
            min_entity_freq: min_entity_freq.max(1),
            extractor,
            entities: BTreeMap::new(),
            relations: Vec::new(),
            chunk_to_entities: BTreeMap::new(),
            index: GraphIndex::new(),
        }
    }

    pub fn min_entity_freq(&self) -> usize {
        self.min_entity_freq
    }

    /// Rebuild the whole graph from `chunks`, replacing any previous state.
    ///
    /// 1. Tally mentions and mentioning chunks per raw entity name.
    /// 2. Keep names mentioned at least `min_entity_freq` times.
    /// 3. Re-scan each chunk for relations among its surviving entities.
    pub fn build_from_chunks(&mut self, chunks: &[Chunk]) {
        let start = Instant::now();

        let mentions: Vec<Vec<(String, EntityType)>> = chunks
            .iter()
            .map(|chunk| self.extractor.extract_entities(&chunk.content))
            .collect();

        let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();
        for (chunk, found) in chunks.iter().zip(&mentions) {
            for (name, entity_type) in found {
                let tally = tallies.entry(name.as_str()).or_default();
                tally.mentions += 1;
                tally.chunks.insert(chunk.id.clone());
                tally.strongest = tally.strongest.max(Some(*entity_type));
            }
        }
        log::info!(
            "Pass 1: {} candidate entities from {} chunks",
            tallies.len(),
            chunks.len()
        );

        let candidates = tallies.len();
        self.entities = tallies
            .into_iter()
            .filter(|(_, tally)| tally.mentions >= self.min_entity_freq)
            .map(|(name, tally)| {
                let entity = Entity {
                    name: name.to_string(),
                    entity_type: EntityType::classify(name, tally.strongest),
                    mentions: tally.mentions,
                    chunks: tally.chunks,
                };
                (name.to_string(), entity)
            })
            .collect();
        log::info!(
            "Pass 2: kept {} of {} entities (min frequency {})",
            self.entities.len(),
            candidates,
            self.min_entity_freq
        );

        self.relations.clear();
        self.chunk_to_entities.clear();
        for (chunk, found) in chunks.iter().zip(&mentions) {
            let mut seen = HashSet::new();
            let known: Vec<String> = found
                .iter()
                .map(|(name, _)| name)
                .filter(|name| self.entities.contains_key(*name) && seen.insert(name.as_str()))
                .cloned()
                .collect();
            if known.is_empty() {
                continue;
            }

            self.relations.extend(extract_relations(&chunk.content, &known));

            let mut sorted = known;
            sorted.sort();
            self.chunk_to_entities.insert(chunk.id.clone(), sorted);
        }

        self.index = GraphIndex::build(&self.entities, &self.relations);
        log::info!(
            "Pass 3: {} relations, {} nodes, {} edges",
            self.relations.len(),
            self.index.node_count(),
            self.index.edge_count()
        );
        log::debug!("Graph build took {:?}", start.elapsed());
    }

    /// Replace state with already-validated entities and relations, re-deriving
    /// the chunk map and the index.
    pub(super) fn restore(&mut self, entities: BTreeMap<String, Entity>, relations: Vec<Relation>) {
        let mut chunk_to_entities: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entity in entities.values() {
            for chunk_id in &entity.chunks {
                chunk_to_entities
                    .entry(chunk_id.clone())
                    .or_default()
                    .push(entity.name.clone());
            }
        }
        // Entities iterate in name order, so each list is already sorted.

        self.index = GraphIndex::build(&entities, &relations);
        self.entities = entities;
        self.relations = relations;
        self.chunk_to_entities = chunk_to_entities;
    }

    pub fn entities(&self) -> &BTreeMap<String, Entity> {
        &self.entities
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Surviving entities mentioned by `chunk_id`, sorted. Empty for unknown chunks.
    pub fn chunk_entities(&self, chunk_id: &str) -> &[String] {
        self.chunk_to_entities
            .get(chunk_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn edge_weights(&self) -> BTreeMap<EdgeKey, f64> {
        self.index.edge_weights()
    }

    pub fn node_count(&self) -> usize {
        self.index.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.index.edge_count()
    }

    /// Whether `entity` is a node of the graph.
    pub fn contains(&self, entity: &str) -> bool {
        self.index.contains(entity)
    }

    /// Direct outgoing neighbors of `entity`, sorted. Empty for an unknown entity.
    pub fn successors(&self, entity: &str) -> Vec<&str> {
        self.index.successors(entity)
    }

    /// Entities within `max_hops` outgoing steps, with their minimum hop.
    pub fn neighbors_by_hop(&self, entity: &str, max_hops: usize) -> BTreeMap<String, usize> {
        self.index.neighbors_by_hop(entity, max_hops)
    }

    /// Entities within `max_hops` outgoing steps. Unknown entity yields an empty set.
    pub fn get_neighbors(&self, entity: &str, max_hops: usize) -> BTreeSet<String> {
        self.neighbors_by_hop(entity, max_hops).into_keys().collect()
    }

    /// Chunks of `entity` and of every neighbor within `max_hops`.
    pub fn get_related_chunks(&self, entity: &str, max_hops: usize) -> BTreeSet<String> {
        let Some(own) = self.entities.get(entity) else {
            return BTreeSet::new();
        };

        let mut chunks = own.chunks.clone();
        for neighbor in self.get_neighbors(entity, max_hops) {
            if let Some(e) = self.entities.get(&neighbor) {
                chunks.extend(e.chunks.iter().cloned());
            }
        }
        chunks
    }

    /// Shortest entity sequence linking `from` and `to`, ignoring edge direction.
    pub fn get_path_between_entities(&self, from: &str, to: &str) -> Option<Vec<String>> {
        self.index.shortest_path_undirected(from, to)
    }

    /// Dependency neighborhood derived from explicit relations. `None` for an
    /// unknown entity.
    pub fn dependencies(&self, entity: &str) -> Option<DependencyReport> {
        if !self.entities.contains_key(entity) {
            return None;
        }

        let mut report = DependencyReport {
            entity: entity.to_string(),
            ..Default::default()
        };

        for relation in &self.relations {
            let (dependent, dependency) = match relation.relation_type {
                RelationType::DependsOn
                | RelationType::Uses
                | RelationType::Calls
                | RelationType::DependsOnList => (&relation.source, &relation.target),
                RelationType::UsedByList => (&relation.target, &relation.source),
                _ => continue,
            };
            if dependent == entity {
                report.depends_on.insert(dependency.clone());
            } else if dependency == entity {
                report.dependents.insert(dependent.clone());
            }
        }

        Some(report)
    }
}
