use thiserror::Error;

/// Main error type for Claimgraph
#[derive(Error, Debug)]
pub enum ClaimgraphError {
    /// Graph store (SQLite) errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Query table / output table CSV errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Language model request errors
    #[error("Language model error: {0}")]
    Llm(String),

    /// Embedding API errors
    #[error("Embedding API error: {0}")]
    Embedding(String),

    /// Malformed model output
    #[error("Parse error: {0}")]
    Parse(String),

    /// Graph store is unavailable or rejected an operation
    #[error("Graph store error: {0}")]
    GraphStore(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using ClaimgraphError
pub type Result<T> = std::result::Result<T, ClaimgraphError>;
