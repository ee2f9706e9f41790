use clap::Parser;
use claimgraph::Config;
use claimgraph::graph::{GraphSearcher, GraphStore};
use claimgraph::llm::{GeminiClient, LanguageModel};
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;

#[derive(Parser, Debug)]
#[command(name = "graph")]
#[command(about = "Show graph store statistics and a preview of stored relations")]
struct Args {
    /// Number of relations to print
    #[arg(short, long, default_value_t = 50)]
    limit: usize,

    /// Run a graph evidence search for this text instead of the preview
    #[arg(short, long)]
    search: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "warn")
    ).init();

    let store = Arc::new(GraphStore::connect(config.db_path()).await);
    if !store.is_connected() {
        anyhow::bail!("graph store at {} is unavailable", config.db_path().display());
    }

    if let Some(query) = args.search {
        let llm: Arc<dyn LanguageModel> = Arc::new(GeminiClient::new(
            config.api_key()?,
            config.llm.base_url.clone(),
            Duration::from_secs(config.llm.timeout_secs),
        )?);
        let searcher = GraphSearcher::new(
            llm,
            store.clone(),
            &config.llm.entity_model,
            config.search.graph_evidence_limit,
        );
        println!("{}", searcher.search(&query).await);
        return Ok(());
    }

    let stats = store.stats().await?;
    println!("\n=== Graph Store: {} ===\n", config.db_path().display());
    println!("Entities:      {}", stats.entities);
    println!("Relationships: {}", stats.relationships);
    println!("Documents:     {}", stats.documents);

    if stats.relationships == 0 {
        println!("\nNo relations stored yet. Run `ingest` or `claimgraph once` first.");
        return Ok(());
    }

    let relations = store.preview(args.limit).await?;
    println!("\nFirst {} relations:\n", relations.len());
    println!("{:-<80}", "");
    for relation in &relations {
        println!("{}", relation);
    }
    println!("{:-<80}", "");

    Ok(())
}
