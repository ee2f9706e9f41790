//! Knowledge graph: LLM extraction into the graph store and evidence lookup.
//!
//! Entities are merged by id and relationships by (source, target, relation),
//! so every write is an idempotent upsert and concurrent ingestion is safe.

mod extraction;
mod search;
mod store;

pub use extraction::{load_schema_prompt, GraphIngestor, DEFAULT_SCHEMA_PROMPT, STATUS_EMPTY, STATUS_SUCCESS};
pub use search::{GraphSearcher, GRAPH_UNAVAILABLE, NO_CONNECTIONS_FOUND, NO_ENTITIES_FOUND};
pub use store::{GraphStats, GraphStore, UpsertSummary};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A node in the graph store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    /// Entity type label, e.g. `Person`, `Place`
    #[serde(rename = "type", default)]
    pub label: Option<String>,
}

/// A directed, typed edge (source --relation--> target)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    pub relation: String,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --[{}]--> {}", self.source, self.relation, self.target)
    }
}

/// Extraction payload: `{nodes: [{id, type}], edges: [{source, target, relation}]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphFragment {
    #[serde(default)]
    pub nodes: Vec<Entity>,
    #[serde(default)]
    pub edges: Vec<Relationship>,
}

impl GraphFragment {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}
