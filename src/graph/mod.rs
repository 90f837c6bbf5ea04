//! Knowledge graph module: entity/relation extraction, three-pass graph build,
//! multi-hop traversal and JSON persistence.
//!
//! Entities and relations are the source of truth. The directed graph index is
//! derived from them and rebuilt whenever they change (build or load).

mod command;
mod extraction;
mod index;
mod knowledge_graph;
mod persistence;
mod traversal;

pub use command::{CommandOutcome, GraphCommand};
pub use extraction::{
    extract_relations, EntityExtractor, NerEngine, NerExtractor, PatternExtractor,
};
pub use index::{EdgeKey, GraphIndex};
pub use knowledge_graph::{DependencyReport, KnowledgeGraph};
pub use persistence::{ENTITIES_FILE, GRAPHML_FILE, RELATIONS_FILE};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::GraphRagError;

/// Name suffixes that mark an entity as a service-like component.
pub const SERVICE_SUFFIXES: [&str; 6] = [
    "Service",
    "Router",
    "Module",
    "Manager",
    "Controller",
    "Handler",
];

/// Entity classification. Ordered by precedence: when one name is seen with several
/// types, the greatest wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Unknown,
    Entity,
    Identifier,
    Service,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Unknown => "UNKNOWN",
            EntityType::Entity => "ENTITY",
            EntityType::Identifier => "IDENTIFIER",
            EntityType::Service => "SERVICE",
        }
    }

    /// Final type for a surviving entity: a service suffix always wins, then the
    /// strongest type any mention carried, then capitalization.
    pub fn classify(name: &str, observed: Option<EntityType>) -> EntityType {
        if SERVICE_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            return EntityType::Service;
        }
        match observed {
            Some(t) if t != EntityType::Unknown => t,
            _ if name.chars().next().is_some_and(char::is_uppercase) => EntityType::Entity,
            _ => EntityType::Unknown,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = GraphRagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SERVICE" => Ok(EntityType::Service),
            "ENTITY" => Ok(EntityType::Entity),
            "IDENTIFIER" => Ok(EntityType::Identifier),
            "UNKNOWN" => Ok(EntityType::Unknown),
            other => Err(GraphRagError::InvalidInput(format!("Unknown entity type: {}", other))),
        }
    }
}

/// Relation kinds. Explicit kinds come from verb/list patterns; `CoOccurs` from
/// sharing a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    CoOccurs,
    DependsOn,
    Uses,
    Calls,
    Extends,
    Implements,
    DependsOnList,
    UsedByList,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::CoOccurs => "CO_OCCURS",
            RelationType::DependsOn => "DEPENDS_ON",
            RelationType::Uses => "USES",
            RelationType::Calls => "CALLS",
            RelationType::Extends => "EXTENDS",
            RelationType::Implements => "IMPLEMENTS",
            RelationType::DependsOnList => "DEPENDS_ON_LIST",
            RelationType::UsedByList => "USED_BY_LIST",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A named concept recognized by the graph, deduplicated by exact name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub entity_type: EntityType,
    /// Corpus-wide mention count.
    pub mentions: usize,
    /// Ids of the chunks that mention this entity.
    pub chunks: BTreeSet<String>,
}

/// A directed, typed observation `source --relation_type--> target`.
///
/// Relations are stored per observation; the graph index sums the weights of
/// observations sharing `(source, target, relation_type)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub source: String,
    pub target: String,
    pub relation_type: RelationType,
    pub weight: f64,
    /// Leading snippet of the chunk the relation was observed in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_serde_names() {
        assert_eq!(serde_json::to_string(&EntityType::Service).unwrap(), "\"SERVICE\"");
        assert_eq!(serde_json::to_string(&EntityType::Identifier).unwrap(), "\"IDENTIFIER\"");
        let parsed: EntityType = serde_json::from_str("\"UNKNOWN\"").unwrap();
        assert_eq!(parsed, EntityType::Unknown);
    }

    #[test]
    fn test_relation_type_serde_names() {
        assert_eq!(serde_json::to_string(&RelationType::CoOccurs).unwrap(), "\"CO_OCCURS\"");
        assert_eq!(serde_json::to_string(&RelationType::DependsOnList).unwrap(), "\"DEPENDS_ON_LIST\"");
        assert_eq!(serde_json::to_string(&RelationType::UsedByList).unwrap(), "\"USED_BY_LIST\"");
        assert_eq!(RelationType::Implements.to_string(), "IMPLEMENTS");
    }

    #[test]
    fn test_classify_suffix_overrides() {
        assert_eq!(EntityType::classify("PaymentRouter", Some(EntityType::Identifier)), EntityType::Service);
        assert_eq!(EntityType::classify("UserProfile", Some(EntityType::Identifier)), EntityType::Identifier);
        assert_eq!(EntityType::classify("Berlin", None), EntityType::Entity);
        assert_eq!(EntityType::classify("berlin", None), EntityType::Unknown);
    }

    #[test]
    fn test_entity_type_from_str() {
        assert_eq!("service".parse::<EntityType>().unwrap(), EntityType::Service);
        assert!("widget".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_relation_context_omitted_when_empty() {
        let relation = Relation {
            source: "AuthService".into(),
            target: "TokenService".into(),
            relation_type: RelationType::Uses,
            weight: 2.0,
            context: Vec::new(),
        };
        let json = serde_json::to_value(&relation).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "source": "AuthService",
                "target": "TokenService",
                "relation_type": "USES",
                "weight": 2.0
            })
        );
    }
}
