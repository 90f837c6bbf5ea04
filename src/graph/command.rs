//! Calculation commands over a knowledge graph, e.g. `count entities of type service`.

use regex::{Captures, Regex};
use serde::Serialize;
use std::str::FromStr;
use std::sync::OnceLock;

use super::knowledge_graph::KnowledgeGraph;
use super::EntityType;
use crate::error::{GraphRagError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphCommand {
    CountEntities,
    CountEntitiesOfType(EntityType),
    CountRelations,
    CountRelationsOf(String),
    AverageMentions,
}

/// Result of evaluating a [`GraphCommand`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutcome {
    pub calculation: &'static str,
    pub value: f64,
    pub description: String,
}

type CommandParser = fn(&Captures<'_>) -> Result<GraphCommand>;

/// Patterns in priority order; the first match decides the command. "count
/// relations of X" must be tried before bare "count relations", and any "count
/// ... type T" before "count entities".
fn grammar() -> &'static [(Regex, CommandParser)] {
    static GRAMMAR: OnceLock<Vec<(Regex, CommandParser)>> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        let table: [(&str, CommandParser); 5] = [
            (r"(?i)^\s*count\b.*\btype\s+(\w+)", |cap| {
                cap[1].parse().map(GraphCommand::CountEntitiesOfType)
            }),
            (
                r"(?i)^\s*count\s+(?:relations|dependencies)\s+(?:of|for)\s+(\w+)",
                |cap| Ok(GraphCommand::CountRelationsOf(cap[1].to_string())),
            ),
            (r"(?i)^\s*count\s+(?:relations|dependencies)\b", |_| {
                Ok(GraphCommand::CountRelations)
            }),
            (r"(?i)^\s*count\s+entities\b", |_| Ok(GraphCommand::CountEntities)),
            (r"(?i)\b(?:avg|average)\b.*\bmentions\b", |_| {
                Ok(GraphCommand::AverageMentions)
            }),
        ];
        table
            .into_iter()
            .map(|(pattern, parser)| (Regex::new(pattern).expect("Invalid regex pattern"), parser))
            .collect()
    })
}

impl FromStr for GraphCommand {
    type Err = GraphRagError;

    fn from_str(input: &str) -> Result<Self> {
        for (pattern, parser) in grammar() {
            if let Some(cap) = pattern.captures(input) {
                return parser(&cap);
            }
        }
        Err(GraphRagError::InvalidInput(format!(
            "Unknown calculation: '{}'",
            input.trim()
        )))
    }
}

impl GraphCommand {
    /// Evaluate against `graph`. `None` when a named entity does not exist.
    pub fn evaluate(&self, graph: &KnowledgeGraph) -> Option<CommandOutcome> {
        let outcome = match self {
            GraphCommand::CountEntities => {
                let count = graph.entities().len();
                CommandOutcome {
                    calculation: "count_entities",
                    value: count as f64,
                    description: format!("Total number of entities: {}", count),
                }
            }
            GraphCommand::CountEntitiesOfType(entity_type) => {
                let count = graph
                    .entities()
                    .values()
                    .filter(|e| e.entity_type == *entity_type)
                    .count();
                CommandOutcome {
                    calculation: "count_entities_by_type",
                    value: count as f64,
                    description: format!("Number of {} entities: {}", entity_type, count),
                }
            }
            GraphCommand::CountRelations => {
                let count = graph.relations().len();
                CommandOutcome {
                    calculation: "count_relations",
                    value: count as f64,
                    description: format!("Total number of relations: {}", count),
                }
            }
            GraphCommand::CountRelationsOf(requested) => {
                let name = graph
                    .entities()
                    .keys()
                    .find(|name| name.eq_ignore_ascii_case(requested))?;
                let count = graph
                    .relations()
                    .iter()
                    .filter(|r| &r.source == name || &r.target == name)
                    .count();
                CommandOutcome {
                    calculation: "count_entity_relations",
                    value: count as f64,
                    description: format!("Number of relations for {}: {}", name, count),
                }
            }
            GraphCommand::AverageMentions => {
                let entities = graph.entities();
                let average = if entities.is_empty() {
                    0.0
                } else {
                    let total: usize = entities.values().map(|e| e.mentions).sum();
                    total as f64 / entities.len() as f64
                };
                let rounded = (average * 100.0).round() / 100.0;
                CommandOutcome {
                    calculation: "average_mentions",
                    value: rounded,
                    description: format!("Average mentions per entity: {}", rounded),
                }
            }
        };
        Some(outcome)
    }
}
