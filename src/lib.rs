pub mod cache;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod search;

pub use config::Config;
pub use error::{GraphRagError, Result};
pub use graph::{Entity, EntityType, KnowledgeGraph, Relation, RelationType};
pub use ingest::Chunk;
pub use search::{GraphAwareRetriever, RetrievalMethod, RetrievalResult};
