use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use graphrag::cache::QueryEmbeddingCache;
use graphrag::embeddings::{Embedder, OpenAIEmbedder};
use graphrag::ingest::load_chunks;
use graphrag::search::{GraphAwareRetriever, RetrievalResult, RetrieverOptions};
use graphrag::{Config, KnowledgeGraph};
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "graphrag")]
#[command(about = "Build a knowledge graph over your docs and query it with graph-aware retrieval")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract entities and relations from the corpus and save the graph
    Build {
        /// Override graph.min_entity_freq
        #[arg(long)]
        min_freq: Option<usize>,
    },
    /// Answer a query with semantic search fused with graph expansion
    Query {
        text: String,
        /// Semantic search only
        #[arg(long)]
        no_graph: bool,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Chunks related to one entity
    Entity {
        name: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Shortest path between two entities and the chunks along it
    Path { from: String, to: String },
    /// Entities reachable from an entity, with hop distance
    Neighbors {
        entity: String,
        #[arg(long)]
        hops: Option<usize>,
    },
}

/// Build a configured embedder with an optional LRU query-embedding cache.
fn build_embedder(config: &Config) -> Result<OpenAIEmbedder> {
    let api_key = std::env::var(&config.embeddings.api_key_env).map_err(|_| {
        anyhow::anyhow!(
            "Environment variable {} not set. Set it in your .env file or as an environment variable.",
            config.embeddings.api_key_env
        )
    })?;

    let cache = if config.embeddings.cache_capacity > 0 {
        Some(Arc::new(QueryEmbeddingCache::new(config.embeddings.cache_capacity)))
    } else {
        None
    };

    Ok(OpenAIEmbedder::new_with_cache(
        api_key,
        config.embeddings.model.clone(),
        config.embeddings.batch_size,
        config.embeddings.dimensions,
        cache,
    )?)
}

fn load_graph(config: &Config) -> Result<KnowledgeGraph> {
    let mut graph = KnowledgeGraph::new(config.graph.min_entity_freq);
    graph.load(config.graph_dir()).with_context(|| {
        format!(
            "Failed to load graph from {}. Run `graphrag build` first.",
            config.graph_dir().display()
        )
    })?;
    Ok(graph)
}

async fn build_retriever(config: &Config) -> Result<GraphAwareRetriever> {
    let graph = Arc::new(load_graph(config)?);
    let chunks = load_chunks(config.data_dir(), &config.chunking)?;
    let embedder: Arc<dyn Embedder> = Arc::new(build_embedder(config)?);

    let retriever = GraphAwareRetriever::new(
        chunks,
        graph,
        embedder,
        RetrieverOptions::from(&config.retrieval),
    )
    .await
    .context("Failed to embed corpus")?;
    Ok(retriever)
}

fn print_results(results: &[RetrievalResult]) {
    if results.is_empty() {
        println!("No results found.");
        return;
    }

    for (rank, result) in results.iter().enumerate() {
        println!("─────────────────────────────────────────────────────────────────────────────");
        println!(
            "#{} {} (score: {:.3}, method: {}, hops: {})",
            rank + 1,
            result.chunk_id(),
            result.score,
            result.method,
            result.hop_count
        );
        if !result.related_entities.is_empty() {
            println!("Entities: {}", result.related_entities.join(", "));
        }

        let content = &result.chunk.content;
        let preview: String = content.chars().take(200).collect();
        let ellipsis = if content.chars().count() > 200 { "..." } else { "" };
        println!("\n{}{}\n", preview, ellipsis);
    }
    println!("─────────────────────────────────────────────────────────────────────────────");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.graphrag.log_level.as_str()),
    )
    .init();

    match cli.command {
        Command::Build { min_freq } => {
            let start = Instant::now();
            let chunks = load_chunks(config.data_dir(), &config.chunking)?;
            let mut graph = KnowledgeGraph::new(min_freq.unwrap_or(config.graph.min_entity_freq));
            graph.build_from_chunks(&chunks);
            graph
                .save(config.graph_dir())
                .with_context(|| format!("Failed to save graph to {}", config.graph_dir().display()))?;

            println!("Chunks:    {}", chunks.len());
            println!("Entities:  {} (min {} mentions)", graph.entities().len(), graph.min_entity_freq());
            println!("Relations: {}", graph.relations().len());
            println!("Edges:     {}", graph.edge_count());
            println!("Saved to {} in {:?}", config.graph_dir().display(), start.elapsed());
        }
        Command::Query { text, no_graph, top_k } => {
            if text.trim().is_empty() {
                anyhow::bail!("Query cannot be empty");
            }
            let retriever = build_retriever(&config).await?;
            let start = Instant::now();
            let results = retriever.retrieve(&text, !no_graph, top_k).await?;

            println!("\nQuery: \"{}\"\n", text);
            print_results(&results);
            println!("Latency: {:?}", start.elapsed());
        }
        Command::Entity { name, top_k } => {
            let retriever = build_retriever(&config).await?;
            match retriever.graph().entity(&name) {
                Some(entity) => println!(
                    "{} [{}] mentioned {} times in {} chunks\n",
                    entity.name,
                    entity.entity_type,
                    entity.mentions,
                    entity.chunks.len()
                ),
                None => {
                    println!("Entity '{}' not found in the knowledge graph.", name);
                    return Ok(());
                }
            }
            print_results(&retriever.retrieve_by_entity(&name, top_k));
        }
        Command::Path { from, to } => {
            let retriever = build_retriever(&config).await?;
            match retriever.multi_hop_query(&from, &to) {
                Some(result) => {
                    println!("Path ({} hops): {}", result.path_length, result.path.join(" -> "));
                    println!("Chunks along the path:");
                    for chunk in &result.chunks {
                        println!("  {}", chunk.id);
                    }
                }
                None => println!("No path between '{}' and '{}'.", from, to),
            }
        }
        Command::Neighbors { entity, hops } => {
            let graph = load_graph(&config)?;
            if !graph.contains(&entity) {
                println!("Entity '{}' not found in the knowledge graph.", entity);
                return Ok(());
            }
            let hops = hops.unwrap_or(config.retrieval.max_hops);
            let neighbors = graph.neighbors_by_hop(&entity, hops);

            println!("Direct: {}", graph.successors(&entity).join(", "));
            if neighbors.is_empty() {
                println!("No neighbors of '{}' within {} hops.", entity, hops);
            }
            for (name, hop) in neighbors {
                println!("{:>3}  {}", hop, name);
            }
        }
    }

    Ok(())
}
