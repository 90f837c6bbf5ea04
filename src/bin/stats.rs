use clap::Parser;
use graphrag::graph::GraphCommand;
use graphrag::{Config, EntityType, KnowledgeGraph, RelationType};
use std::collections::BTreeMap;

#[derive(Parser, Debug)]
#[command(name = "stats")]
#[command(about = "Knowledge graph statistics")]
struct Args {
    /// Calculation to evaluate, e.g. "count entities of type service"
    command: Option<String>,

    /// Number of most-mentioned entities to list
    #[arg(long, default_value_t = 10)]
    top: usize,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load()?;
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.graphrag.log_level.as_str()),
    )
    .init();

    let mut graph = KnowledgeGraph::new(config.graph.min_entity_freq);
    graph.load(config.graph_dir())?;

    if let Some(input) = args.command {
        let command: GraphCommand = input.parse()?;
        match command.evaluate(&graph) {
            Some(outcome) => println!("{}", serde_json::to_string_pretty(&outcome)?),
            None => println!("No matching entity for '{}'", input),
        }
        return Ok(());
    }

    println!("\n=== Knowledge Graph Statistics ===\n");
    println!("Entities:  {}", graph.entities().len());
    println!("Relations: {}", graph.relations().len());
    println!("Edges:     {}", graph.edge_count());

    let mut by_type: BTreeMap<EntityType, usize> = BTreeMap::new();
    for entity in graph.entities().values() {
        *by_type.entry(entity.entity_type).or_default() += 1;
    }
    println!("\nEntity types:");
    println!("{:-<40}", "");
    for (entity_type, count) in by_type.iter().rev() {
        println!("{:<20} {:>8}", entity_type, count);
    }

    let mut by_relation: BTreeMap<RelationType, (usize, f64)> = BTreeMap::new();
    for relation in graph.relations() {
        let entry = by_relation.entry(relation.relation_type).or_default();
        entry.0 += 1;
        entry.1 += relation.weight;
    }
    println!("\nRelation types:");
    println!("{:-<40}", "");
    println!("{:<20} {:>8} {:>10}", "Type", "Count", "Weight");
    for (relation_type, (count, weight)) in &by_relation {
        println!("{:<20} {:>8} {:>10.1}", relation_type, count, weight);
    }

    let mut ranked: Vec<_> = graph.entities().values().collect();
    ranked.sort_by(|a, b| b.mentions.cmp(&a.mentions).then_with(|| a.name.cmp(&b.name)));
    println!("\nMost mentioned entities:");
    println!("{:-<40}", "");
    for entity in ranked.into_iter().take(args.top) {
        println!(
            "{:<28} {:>5} mentions  {:>3} chunks",
            entity.name,
            entity.mentions,
            entity.chunks.len()
        );
    }

    Ok(())
}
