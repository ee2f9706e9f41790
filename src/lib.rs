pub mod config;
pub mod error;
pub mod db;
pub mod llm;
pub mod embeddings;
pub mod graph;
pub mod claims;
pub mod reasoner;
pub mod ingest;
pub mod search;
pub mod pipeline;
pub mod watch;

pub use config::Config;
pub use error::{ClaimgraphError, Result};
pub use pipeline::{Pipeline, RunSummary};
pub use reasoner::Verdict;
