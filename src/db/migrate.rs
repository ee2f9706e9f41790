use rusqlite::{Connection, params};
use crate::error::{Result, ClaimgraphError};

/// Migration metadata
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

/// Graph store schema, compiled into the binary so every entry point
/// (pipeline, ingest, graph) opens the same schema regardless of cwd.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "001_graph_store",
        sql: include_str!("../../migrations/001_graph_store.sql"),
    },
    Migration {
        version: 2,
        name: "002_documents",
        sql: include_str!("../../migrations/002_documents.sql"),
    },
];

/// Create schema_migrations table if it doesn't exist
fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get list of applied migrations
pub fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY version")?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
        .map_err(ClaimgraphError::Database)?;
    Ok(names)
}

/// Number of migrations compiled into this build
pub fn known_migration_count() -> usize {
    MIGRATIONS.len()
}

/// Run all pending migrations
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    ensure_migrations_table(conn)?;

    let applied = get_applied_migrations(conn)?;

    for migration in MIGRATIONS {
        if applied.iter().any(|name| name == migration.name) {
            log::debug!("Migration {} already applied, skipping", migration.name);
            continue;
        }

        log::info!("Applying migration: {} (version {})", migration.name, migration.version);

        let tx = conn.transaction()?;

        tx.execute_batch(migration.sql)
            .map_err(|e| {
                ClaimgraphError::GraphStore(format!(
                    "Failed to execute migration {}: {}",
                    migration.name, e
                ))
            })?;

        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;

        tx.commit()?;

        log::info!("Migration {} applied successfully", migration.name);
    }

    log::debug!("All migrations completed");
    Ok(())
}
