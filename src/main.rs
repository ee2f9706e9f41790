use claimgraph::db::{migrate, Db};
use claimgraph::error::ClaimgraphError;
use claimgraph::{Config, Pipeline};
use anyhow::Result;

const USAGE: &str = "usage: claimgraph [run|once|verify]";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    if matches!(command, "-h" | "--help" | "help") {
        println!("{}", USAGE);
        println!("  run     ingest the docs folder, verify claims, then keep watching for changes");
        println!("  once    single pass over the docs folder and query table, then exit");
        println!("  verify  check configuration and the graph store schema (default)");
        return Ok(());
    }

    let config = Config::load()?;
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", &config.pipeline.log_level)
    ).init();

    match command {
        "run" => run_continuous(&config).await?,
        "once" => run_single_pass(&config).await?,
        "verify" => run_schema_verification(&config).await?,
        other => {
            anyhow::bail!("unknown command '{}'\n{}", other, USAGE);
        }
    }

    Ok(())
}

/// Run the pipeline until the process is terminated
async fn run_continuous(config: &Config) -> Result<()> {
    log::info!("Starting claimgraph v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Docs folder: {}", config.docs_folder().display());
    log::info!("Query table: {}", config.pipeline.queries_csv.display());

    let pipeline = Pipeline::from_config(config).await?;
    pipeline.run().await?;
    Ok(())
}

async fn run_single_pass(config: &Config) -> Result<()> {
    log::info!("Starting claimgraph v{} (single pass)", env!("CARGO_PKG_VERSION"));

    let pipeline = Pipeline::from_config(config).await?;
    let summary = pipeline.run_once().await?;

    println!(
        "Processed {} documents ({} chunks), {} claims, {} verdicts",
        summary.documents, summary.chunks, summary.claims, summary.verdicts
    );
    println!("Ingestion log: {}", config.pipeline.ingestion_log.display());
    println!("Results:       {}", config.pipeline.results_csv.display());
    Ok(())
}

/// Apply migrations and check the graph store schema
async fn run_schema_verification(config: &Config) -> Result<()> {
    log::info!("Starting claimgraph v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Configuration loaded successfully");
    log::info!("Docs folder: {}", config.docs_folder().display());
    log::info!("Graph store: {}", config.db_path().display());
    log::info!("Embedding model: {} ({} dims)", config.embeddings.model, config.embeddings.dimensions);

    let db = Db::new(config.db_path());
    db.with_connection(|conn| migrate::run_migrations(conn)).await?;
    log::info!("Graph store initialized");

    verify_database_schema(&db).await?;
    log::info!("Schema verified; ready to run");
    Ok(())
}

/// Verify that all expected database objects exist
async fn verify_database_schema(db: &Db) -> Result<()> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt.query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        let expected_tables = ["documents", "entities", "relationships", "schema_migrations"];
        let mut all_tables_exist = true;
        for table in &expected_tables {
            if !tables.iter().any(|t| t == table) {
                log::error!("Missing table: {}", table);
                all_tables_exist = false;
            } else {
                log::debug!("✓ Table exists: {}", table);
            }
        }
        if !all_tables_exist {
            return Err(ClaimgraphError::Config("Not all required tables exist".to_string()));
        }

        let applied = migrate::get_applied_migrations(conn)?;
        if applied.len() < migrate::known_migration_count() {
            return Err(ClaimgraphError::Config(format!(
                "Only {} of {} migrations applied",
                applied.len(),
                migrate::known_migration_count()
            )));
        }
        log::info!("✓ {} migrations applied", applied.len());

        let (entities, relationships): (i64, i64) = conn.query_row(
            "SELECT (SELECT COUNT(*) FROM entities), (SELECT COUNT(*) FROM relationships)",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        log::info!("Graph holds {} entities and {} relationships", entities, relationships);
        Ok(())
    })
    .await?;
    Ok(())
}
