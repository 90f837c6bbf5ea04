//! JSON save/load of entities and relations, plus a GraphML export for external
//! inspection tools.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::knowledge_graph::KnowledgeGraph;
use super::{Entity, Relation};
use crate::error::{GraphRagError, Result};

pub const ENTITIES_FILE: &str = "entities.json";
pub const RELATIONS_FILE: &str = "relations.json";
/// Written on save, never read back.
pub const GRAPHML_FILE: &str = "knowledge_graph.graphml";

const GRAPHML_NS: &str = "http://graphml.graphdrawing.org/xmlns";

fn export_err(e: impl std::fmt::Display) -> GraphRagError {
    GraphRagError::Export(e.to_string())
}

impl KnowledgeGraph {
    /// Write `entities.json`, `relations.json` and the GraphML export into `dir`,
    /// creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        fs::write(
            dir.join(ENTITIES_FILE),
            serde_json::to_string_pretty(&self.entities)?,
        )?;
        fs::write(
            dir.join(RELATIONS_FILE),
            serde_json::to_string_pretty(&self.relations)?,
        )?;
        fs::write(dir.join(GRAPHML_FILE), self.to_graphml()?)?;

        log::info!(
            "Saved {} entities and {} relations to {}",
            self.entities.len(),
            self.relations.len(),
            dir.display()
        );
        Ok(())
    }

    /// Replace this graph's state with the documents in `dir` and rebuild the index.
    ///
    /// Fails without touching the current state if either document is missing or
    /// malformed, if an entity is keyed under a name other than its own, or if a
    /// relation refers to an entity that was not persisted.
    pub fn load(&mut self, dir: &Path) -> Result<()> {
        let entities: BTreeMap<String, Entity> =
            serde_json::from_str(&fs::read_to_string(dir.join(ENTITIES_FILE))?)?;
        let relations: Vec<Relation> =
            serde_json::from_str(&fs::read_to_string(dir.join(RELATIONS_FILE))?)?;

        if let Some((key, entity)) = entities.iter().find(|(key, e)| **key != e.name) {
            return Err(GraphRagError::Parse(format!(
                "Entity keyed as '{}' is named '{}'",
                key, entity.name
            )));
        }
        if let Some(relation) = relations
            .iter()
            .find(|r| !entities.contains_key(&r.source) || !entities.contains_key(&r.target))
        {
            return Err(GraphRagError::Parse(format!(
                "Relation {} -{}-> {} refers to an unknown entity",
                relation.source, relation.relation_type, relation.target
            )));
        }

        self.restore(entities, relations);
        log::info!(
            "Loaded {} entities, {} relations ({} edges) from {}",
            self.entities.len(),
            self.relations.len(),
            self.index.edge_count(),
            dir.display()
        );
        Ok(())
    }

    /// Render the aggregated graph as GraphML.
    pub fn to_graphml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(export_err)?;

        let mut root = BytesStart::new("graphml");
        root.push_attribute(("xmlns", GRAPHML_NS));
        writer.write_event(Event::Start(root)).map_err(export_err)?;

        for (id, domain, name, kind) in [
            ("d0", "node", "entity_type", "string"),
            ("d1", "node", "mentions", "int"),
            ("d2", "edge", "relation_type", "string"),
            ("d3", "edge", "weight", "double"),
        ] {
            let mut key = BytesStart::new("key");
            key.push_attribute(("id", id));
            key.push_attribute(("for", domain));
            key.push_attribute(("attr.name", name));
            key.push_attribute(("attr.type", kind));
            writer.write_event(Event::Empty(key)).map_err(export_err)?;
        }

        let mut graph = BytesStart::new("graph");
        graph.push_attribute(("id", "G"));
        graph.push_attribute(("edgedefault", "directed"));
        writer.write_event(Event::Start(graph)).map_err(export_err)?;

        for entity in self.entities.values() {
            let mut node = BytesStart::new("node");
            node.push_attribute(("id", entity.name.as_str()));
            writer.write_event(Event::Start(node)).map_err(export_err)?;
            write_data(&mut writer, "d0", entity.entity_type.as_str())?;
            write_data(&mut writer, "d1", &entity.mentions.to_string())?;
            writer
                .write_event(Event::End(BytesEnd::new("node")))
                .map_err(export_err)?;
        }

        for (key, weight) in self.index.edge_weights() {
            let mut edge = BytesStart::new("edge");
            edge.push_attribute(("source", key.source.as_str()));
            edge.push_attribute(("target", key.target.as_str()));
            writer.write_event(Event::Start(edge)).map_err(export_err)?;
            write_data(&mut writer, "d2", key.relation_type.as_str())?;
            write_data(&mut writer, "d3", &weight.to_string())?;
            writer
                .write_event(Event::End(BytesEnd::new("edge")))
                .map_err(export_err)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("graph")))
            .map_err(export_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("graphml")))
            .map_err(export_err)?;

        String::from_utf8(writer.into_inner()).map_err(export_err)
    }
}

fn write_data(writer: &mut Writer<Vec<u8>>, key: &str, value: &str) -> Result<()> {
    let mut data = BytesStart::new("data");
    data.push_attribute(("key", key));
    writer.write_event(Event::Start(data)).map_err(export_err)?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(export_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("data")))
        .map_err(export_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EntityExtractor, EntityType};
    use crate::ingest::Chunk;
    use tempfile::TempDir;

    fn sample_graph() -> KnowledgeGraph {
        let chunks = vec![
            Chunk::with_id("c1", "AuthService depends on TokenService for sessions."),
            Chunk::with_id("c2", "TokenService issues tokens. TokenService rotates keys."),
            Chunk::with_id("c3", "PaymentRouter calls AuthService before charging."),
            Chunk::with_id("c4", "AuthService uses TokenService & friends."),
        ];
        let mut graph = KnowledgeGraph::new(2);
        graph.build_from_chunks(&chunks);
        graph
    }

    #[test]
    fn test_round_trip_preserves_graph() {
        let temp_dir = TempDir::new().unwrap();
        let graph = sample_graph();
        graph.save(temp_dir.path()).unwrap();

        let mut loaded = KnowledgeGraph::new(2);
        loaded.load(temp_dir.path()).unwrap();

        assert_eq!(loaded.entities(), graph.entities());
        assert_eq!(loaded.relations(), graph.relations());
        assert_eq!(loaded.edge_weights(), graph.edge_weights());
        assert_eq!(loaded.node_count(), graph.node_count());
        for chunk_id in ["c1", "c2", "c3", "c4"] {
            assert_eq!(loaded.chunk_entities(chunk_id), graph.chunk_entities(chunk_id));
        }
        assert_eq!(
            loaded.get_path_between_entities("TokenService", "AuthService"),
            graph.get_path_between_entities("TokenService", "AuthService")
        );
    }

    #[test]
    fn test_saved_layout() {
        let temp_dir = TempDir::new().unwrap();
        sample_graph().save(temp_dir.path()).unwrap();

        let entities: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(temp_dir.path().join(ENTITIES_FILE)).unwrap())
                .unwrap();
        assert_eq!(entities["AuthService"]["entity_type"], "SERVICE");
        assert_eq!(entities["AuthService"]["mentions"], 3);
        assert_eq!(entities["AuthService"]["chunks"], serde_json::json!(["c1", "c3", "c4"]));

        let relations: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(temp_dir.path().join(RELATIONS_FILE)).unwrap())
                .unwrap();
        assert!(relations.as_array().is_some_and(|r| !r.is_empty()));
        assert_eq!(relations[0]["relation_type"], "CO_OCCURS");

        let graphml = fs::read_to_string(temp_dir.path().join(GRAPHML_FILE)).unwrap();
        assert!(graphml.contains("<node id=\"AuthService\">"));
        assert!(graphml.contains("DEPENDS_ON"));
    }

    struct AmpersandExtractor;

    impl EntityExtractor for AmpersandExtractor {
        fn extract_entities(&self, _text: &str) -> Vec<(String, EntityType)> {
            vec![
                ("R&D".to_string(), EntityType::Entity),
                ("AuthService".to_string(), EntityType::Service),
            ]
        }
    }

    #[test]
    fn test_graphml_escapes_names() {
        let mut graph = KnowledgeGraph::with_extractor(1, Box::new(AmpersandExtractor));
        graph.build_from_chunks(&[Chunk::with_id("c1", "R&D hosts AuthService")]);

        let graphml = graph.to_graphml().unwrap();
        assert!(graphml.starts_with("<?xml"));
        assert!(graphml.contains("edgedefault=\"directed\""));
        assert!(graphml.contains("<node id=\"R&amp;D\">"));
        assert!(graphml.contains("source=\"R&amp;D\" target=\"AuthService\""));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(ENTITIES_FILE), "{ not json").unwrap();
        fs::write(temp_dir.path().join(RELATIONS_FILE), "[]").unwrap();

        let mut graph = KnowledgeGraph::new(2);
        assert!(matches!(graph.load(temp_dir.path()), Err(GraphRagError::Json(_))));
    }

    #[test]
    fn test_load_rejects_dangling_relation() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(ENTITIES_FILE),
            r#"{"AuthService": {"name": "AuthService", "entity_type": "SERVICE", "mentions": 2, "chunks": ["c1"]}}"#,
        )
        .unwrap();
        fs::write(
            temp_dir.path().join(RELATIONS_FILE),
            r#"[{"source": "AuthService", "target": "GhostService", "relation_type": "USES", "weight": 2.0}]"#,
        )
        .unwrap();

        let mut graph = sample_graph();
        let before = graph.entities().clone();
        assert!(matches!(graph.load(temp_dir.path()), Err(GraphRagError::Parse(_))));
        assert_eq!(graph.entities(), &before);
    }

    #[test]
    fn test_load_rejects_mismatched_key() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(ENTITIES_FILE),
            r#"{"Auth": {"name": "AuthService", "entity_type": "SERVICE", "mentions": 2, "chunks": []}}"#,
        )
        .unwrap();
        fs::write(temp_dir.path().join(RELATIONS_FILE), "[]").unwrap();

        let mut graph = KnowledgeGraph::new(2);
        assert!(matches!(graph.load(temp_dir.path()), Err(GraphRagError::Parse(_))));
    }

    #[test]
    fn test_load_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mut graph = KnowledgeGraph::new(2);
        assert!(matches!(
            graph.load(&temp_dir.path().join("absent")),
            Err(GraphRagError::Io(_))
        ));
    }
}
