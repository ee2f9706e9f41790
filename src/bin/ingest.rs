use clap::Parser;
use claimgraph::Config;
use claimgraph::graph::{load_schema_prompt, GraphIngestor, GraphStore, STATUS_SUCCESS};
use claimgraph::ingest::{discover_documents, read_document, SourceDocument};
use claimgraph::llm::{GeminiClient, LanguageModel};
use claimgraph::pipeline::{IngestionStatusRow, OutputTable};
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use anyhow::Result;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Extract entities and relations from the docs folder into the graph store (incremental by default)")]
struct Args {
    /// Re-extract every document, ignoring the documents ledger
    #[arg(short, long)]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", &config.pipeline.log_level)
    ).init();

    log::info!("Starting claimgraph graph ingestion");
    log::info!("Docs folder: {}", config.docs_folder().display());
    log::info!("Graph store: {}", config.db_path().display());

    let store = Arc::new(GraphStore::connect(config.db_path()).await);
    if !store.is_connected() {
        anyhow::bail!("graph store at {} is unavailable", config.db_path().display());
    }

    let llm: Arc<dyn LanguageModel> = Arc::new(GeminiClient::new(
        config.api_key()?,
        config.llm.base_url.clone(),
        Duration::from_secs(config.llm.timeout_secs),
    )?);
    let ingestor = GraphIngestor::new(
        llm,
        store.clone(),
        &config.llm.extraction_model,
        load_schema_prompt(&config.pipeline.schema_prompt_path),
    );

    let files = discover_documents(config.docs_folder())?;
    if files.is_empty() {
        log::warn!("No documents found to ingest. Check docs_folder in config.toml.");
        return Ok(());
    }

    let mut documents: Vec<SourceDocument> = Vec::new();
    for path in &files {
        match read_document(config.docs_folder(), path) {
            Ok(Some(doc)) => documents.push(doc),
            Ok(None) => {}
            Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
        }
    }

    // Incremental: only documents whose last successful extraction had a different hash
    let to_process: Vec<SourceDocument> = if args.force {
        log::info!("Mode: full re-extraction ({} documents)", documents.len());
        documents
    } else {
        let known = store.successful_document_hashes().await?;
        let total = documents.len();
        let changed: Vec<_> = documents
            .into_iter()
            .filter(|doc| known.get(&doc.path) != Some(&doc.content_hash))
            .collect();
        log::info!("Classification: changed={}, unchanged (skip)={}", changed.len(), total - changed.len());
        changed
    };

    if to_process.is_empty() {
        log::info!("No new or modified documents. Ingestion complete.");
        return Ok(());
    }

    let start = Instant::now();
    let total = to_process.len();
    let ingestion_log = OutputTable::new(&config.pipeline.ingestion_log);
    let ingestor = &ingestor;
    let store_ref = &store;

    let rows: Vec<IngestionStatusRow> = stream::iter(to_process.iter())
        .map(|doc| async move {
            let status = ingestor.process(&doc.text).await;
            if let Err(e) = store_ref.record_document(&doc.path, &doc.content_hash, &status).await {
                log::warn!("Failed to record {}: {}", doc.path, e);
            }
            log::info!("{}: {}", doc.path, status);
            IngestionStatusRow {
                path: doc.path.clone(),
                ingestion_status: status,
            }
        })
        .buffer_unordered(config.performance.max_concurrency.max(1))
        .collect()
        .await;

    ingestion_log.append(&rows).await?;

    let succeeded = rows.iter().filter(|r| r.ingestion_status == STATUS_SUCCESS).count();
    let stats = store.stats().await?;
    log::info!(
        "Ingestion complete in {:?}: {}/{} succeeded; graph holds {} entities, {} relationships",
        start.elapsed(),
        succeeded,
        total,
        stats.entities,
        stats.relationships
    );

    Ok(())
}
