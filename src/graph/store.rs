//! SQLite-backed graph store.
//!
//! Opened once at startup and shared as `Arc<GraphStore>`. If the database
//! cannot be opened the store runs disconnected: writes and lookups report
//! an error and callers fall back to their sentinel strings.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rusqlite::{params, OptionalExtension, TransactionBehavior};

use super::{Entity, GraphFragment, Relationship};
use crate::db::{migrate, Db};
use crate::error::{ClaimgraphError, Result};

/// Outcome of one upsert batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub entities: usize,
    pub edges_inserted: usize,
    pub edges_existing: usize,
    /// Edges whose source or target is neither in the batch nor in the store
    pub edges_dropped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub entities: usize,
    pub relationships: usize,
    pub documents: usize,
}

pub struct GraphStore {
    db: Option<Db>,
}

fn fold(id: &str) -> String {
    id.to_lowercase()
}

impl GraphStore {
    /// Open the store, apply migrations and verify the connection.
    /// Never fails: on error the store is returned disconnected.
    pub async fn connect<P: AsRef<Path>>(db_path: P) -> Self {
        let db = Db::new(db_path);
        let verified = db
            .with_connection(|conn| {
                migrate::run_migrations(conn)?;
                let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
                Ok(one == 1)
            })
            .await;

        match verified {
            Ok(true) => {
                log::info!("Graph store connected: {}", db.path().display());
                Self { db: Some(db) }
            }
            Ok(false) => {
                log::error!("Graph store connection failed: connectivity check returned no row");
                Self::disconnected()
            }
            Err(e) => {
                log::error!("Graph store connection failed: {}", e);
                Self::disconnected()
            }
        }
    }

    /// A store with no backing database; every operation reports unavailability
    pub fn disconnected() -> Self {
        Self { db: None }
    }

    pub fn is_connected(&self) -> bool {
        self.db.is_some()
    }

    fn db(&self) -> Result<&Db> {
        self.db
            .as_ref()
            .ok_or_else(|| ClaimgraphError::GraphStore("graph store is not connected".to_string()))
    }

    /// Merge nodes, then edges, in one transaction.
    ///
    /// Nodes are written first so edges may reference entities created in the
    /// same batch. Re-upserting an entity overwrites its label; re-upserting
    /// an edge is a no-op.
    pub async fn upsert(&self, fragment: &GraphFragment) -> Result<UpsertSummary> {
        let db = self.db()?;
        let nodes = fragment.nodes.clone();
        let edges = fragment.edges.clone();

        db.with_connection(move |conn| {
            // Take the write lock up front; a deferred read cannot be upgraded
            // once another connection has committed.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut summary = UpsertSummary::default();

            {
                let mut upsert_entity = tx.prepare(
                    "INSERT INTO entities (id, folded_id, label) VALUES (?1, ?2, ?3)
                     ON CONFLICT(id) DO UPDATE SET
                        label = excluded.label,
                        updated_at = CURRENT_TIMESTAMP",
                )?;
                for node in &nodes {
                    if node.id.trim().is_empty() {
                        continue;
                    }
                    upsert_entity.execute(params![node.id, fold(&node.id), node.label])?;
                    summary.entities += 1;
                }

                let mut entity_exists = tx.prepare("SELECT 1 FROM entities WHERE id = ?1")?;
                let mut insert_edge = tx.prepare(
                    "INSERT OR IGNORE INTO relationships (source_id, target_id, relation_type)
                     VALUES (?1, ?2, ?3)",
                )?;
                for edge in &edges {
                    if edge.relation.trim().is_empty() {
                        summary.edges_dropped += 1;
                        continue;
                    }
                    let source_known = entity_exists.exists([&edge.source])?;
                    let target_known = entity_exists.exists([&edge.target])?;
                    if !(source_known && target_known) {
                        log::debug!("Dropping edge with unknown endpoint: {}", edge);
                        summary.edges_dropped += 1;
                        continue;
                    }
                    let changed = insert_edge.execute(params![edge.source, edge.target, edge.relation])?;
                    if changed == 1 {
                        summary.edges_inserted += 1;
                    } else {
                        summary.edges_existing += 1;
                    }
                }
            }

            tx.commit()?;
            Ok(summary)
        })
        .await
    }

    /// Edges where either endpoint's id case-insensitively matches one of
    /// `names`, in insertion order, at most `limit` of them.
    pub async fn find_connections(&self, names: &[String], limit: usize) -> Result<Vec<Relationship>> {
        let db = self.db()?;

        let mut seen = HashSet::new();
        let folded: Vec<String> = names
            .iter()
            .map(|n| fold(n.trim()))
            .filter(|n| !n.is_empty() && seen.insert(n.clone()))
            .collect();
        if folded.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        db.with_connection(move |conn| {
            let placeholders = folded.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let sql = format!(
                "SELECT r.source_id, r.relation_type, r.target_id
                 FROM relationships r
                 JOIN entities s ON s.id = r.source_id
                 JOIN entities t ON t.id = r.target_id
                 WHERE s.folded_id IN ({0}) OR t.folded_id IN ({0})
                 ORDER BY r.rowid
                 LIMIT ?",
                placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
            for _ in 0..2 {
                for name in &folded {
                    params.push(Box::new(name.clone()));
                }
            }
            params.push(Box::new(limit as i64));

            let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
                Ok(Relationship {
                    source: row.get(0)?,
                    relation: row.get(1)?,
                    target: row.get(2)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
    }

    pub async fn entity(&self, id: &str) -> Result<Option<Entity>> {
        let db = self.db()?;
        let id = id.to_string();
        db.with_connection(move |conn| {
            let entity = conn
                .query_row(
                    "SELECT id, label FROM entities WHERE id = ?1",
                    [&id],
                    |row| {
                        Ok(Entity {
                            id: row.get(0)?,
                            label: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(entity)
        })
        .await
    }

    /// Counts of entities with `id` (exact match); used to check merge semantics
    pub async fn entity_count(&self, id: &str) -> Result<usize> {
        let db = self.db()?;
        let id = id.to_string();
        db.with_connection(move |conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM entities WHERE id = ?1", [&id], |row| row.get(0))?;
            Ok(n as usize)
        })
        .await
    }

    pub async fn stats(&self) -> Result<GraphStats> {
        let db = self.db()?;
        db.with_connection(|conn| {
            let count = |sql: &str| -> Result<usize> {
                let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
                Ok(n as usize)
            };
            Ok(GraphStats {
                entities: count("SELECT COUNT(*) FROM entities")?,
                relationships: count("SELECT COUNT(*) FROM relationships")?,
                documents: count("SELECT COUNT(*) FROM documents")?,
            })
        })
        .await
    }

    /// First `limit` relationships in insertion order
    pub async fn preview(&self, limit: usize) -> Result<Vec<Relationship>> {
        let db = self.db()?;
        db.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT source_id, relation_type, target_id FROM relationships ORDER BY rowid LIMIT ?1",
            )?;
            let rows = stmt.query_map([limit as i64], |row| {
                Ok(Relationship {
                    source: row.get(0)?,
                    relation: row.get(1)?,
                    target: row.get(2)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
    }

    /// Remember that `doc_path` with `content_hash` went through extraction
    pub async fn record_document(&self, doc_path: &str, content_hash: &str, status: &str) -> Result<()> {
        let db = self.db()?;
        let doc_path = doc_path.to_string();
        let content_hash = content_hash.to_string();
        let status = status.to_string();
        let ingested_at = chrono::Utc::now().to_rfc3339();
        db.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO documents (doc_path, content_hash, ingestion_status, ingested_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(doc_path) DO UPDATE SET
                    content_hash = excluded.content_hash,
                    ingestion_status = excluded.ingestion_status,
                    ingested_at = excluded.ingested_at",
                params![doc_path, content_hash, status, ingested_at],
            )?;
            Ok(())
        })
        .await
    }

    /// `doc_path` -> content hash of documents whose last extraction succeeded
    pub async fn successful_document_hashes(&self) -> Result<HashMap<String, String>> {
        let db = self.db()?;
        db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT doc_path, content_hash FROM documents WHERE ingestion_status = 'Success'",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let mut map = HashMap::new();
            for row in rows {
                let (path, hash) = row?;
                map.insert(path, hash);
            }
            Ok(map)
        })
        .await
    }
}
