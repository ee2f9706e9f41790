//! Append-only CSV output tables.

use std::fs::OpenOptions;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{ClaimgraphError, Result};
use crate::reasoner::Verdict;

/// One row of the ingestion-status log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionStatusRow {
    pub path: String,
    pub ingestion_status: String,
}

/// One row of the results table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerdictRecord {
    pub query_id: String,
    pub character: String,
    pub claim: String,
    pub verdict: Verdict,
    pub rationale: String,
    pub evidence_text: String,
    pub evidence_graph: String,
    pub source_path: String,
}

/// A CSV file that only ever grows. The header row is written when the file
/// is new or empty; existing rows are never rewritten.
pub struct OutputTable<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _rows: PhantomData<fn(T)>,
}

impl<T: Serialize> OutputTable<T> {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
            _rows: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `rows` and flush. Concurrent appends are serialized.
    pub async fn append(&self, rows: &[T]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let _guard = self.lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(ClaimgraphError::Io)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(ClaimgraphError::Io)?;
        let write_header = file.metadata().map_err(ClaimgraphError::Io)?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(ClaimgraphError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(claim: &str, verdict: Verdict) -> VerdictRecord {
        VerdictRecord {
            query_id: "1".to_string(),
            character: "Tom Ayrton".to_string(),
            claim: claim.to_string(),
            verdict,
            rationale: "Stated, in the text.".to_string(),
            evidence_text: "Tom Ayrton was a pirate.".to_string(),
            evidence_graph: "No graph connections found.".to_string(),
            source_path: "grant.txt".to_string(),
        }
    }

    #[tokio::test]
    async fn test_header_written_once() {
        let temp_dir = TempDir::new().unwrap();
        let table = OutputTable::new(temp_dir.path().join("out/results.csv"));

        table.append(&[record("Tom Ayrton was a pirate.", Verdict::Supported)]).await.unwrap();
        table
            .append(&[record("Tom Ayrton was a sailor.", Verdict::NotEnoughInfo)])
            .await
            .unwrap();

        let content = std::fs::read_to_string(table.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "query_id,character,claim,verdict,rationale,evidence_text,evidence_graph,source_path"
        );
        assert!(lines[1].contains(",Supported,\"Stated, in the text.\","));
        assert!(lines[2].contains(",Not Enough Info,"));
    }

    #[tokio::test]
    async fn test_appends_to_existing_file_without_header() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ingestion.csv");
        std::fs::write(&path, "path,ingestion_status\nold.txt,Success\n").unwrap();

        let table = OutputTable::new(&path);
        table
            .append(&[IngestionStatusRow {
                path: "new.txt".to_string(),
                ingestion_status: "(no driver or empty data)".to_string(),
            }])
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "path,ingestion_status\nold.txt,Success\nnew.txt,(no driver or empty data)\n"
        );
    }

    #[tokio::test]
    async fn test_empty_append_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let table: OutputTable<IngestionStatusRow> = OutputTable::new(temp_dir.path().join("x.csv"));
        table.append(&[]).await.unwrap();
        assert!(!table.path().exists());
    }
}
