//! Query (backstory) table reader.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ClaimgraphError, Result};

/// One backstory row. The narrative to verify is `content`, attributed to `character`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryRow {
    #[serde(rename = "query_number", alias = "id", alias = "query_id")]
    pub query_id: String,
    #[serde(default)]
    pub book_name: String,
    #[serde(rename = "char", alias = "character", default)]
    pub character: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub content: String,
}

/// Read the whole query table. Columns are matched by header name so their
/// order does not matter; unknown columns are ignored.
pub fn read_queries(path: &Path) -> Result<Vec<QueryRow>> {
    let file = std::fs::File::open(path).map_err(|e| {
        ClaimgraphError::InvalidInput(format!("query table {}: {}", path.display(), e))
    })?;
    parse_queries(file)
}

pub(crate) fn parse_queries<R: std::io::Read>(reader: R) -> Result<Vec<QueryRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for result in rdr.deserialize::<QueryRow>() {
        let mut row = result?;
        row.caption = row.caption.filter(|c| !c.trim().is_empty());
        rows.push(row);
    }
    log::info!("Loaded {} query rows", rows.len());
    Ok(rows)
}
