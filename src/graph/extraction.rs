//! Prompted entity/relation extraction into the graph store.

use std::path::Path;
use std::sync::Arc;

use super::{GraphFragment, GraphStore};
use crate::llm::{strip_code_fences, GenerateRequest, LanguageModel};

/// Used when the schema prompt file cannot be read
pub const DEFAULT_SCHEMA_PROMPT: &str =
    "Extract the entities and relations in this text in JSON format";

pub const STATUS_SUCCESS: &str = "Success";
pub const STATUS_EMPTY: &str = "(no driver or empty data)";
// Status prefixes are part of the ingestion log format; keep them stable.
const STORE_ERROR_PREFIX: &str = "Neo4j Error:";
const PIPELINE_ERROR_PREFIX: &str = "Pipeline Error:";

/// Read the extraction system instruction, falling back to the built-in one
pub fn load_schema_prompt(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(prompt) if !prompt.trim().is_empty() => prompt,
        Ok(_) => {
            log::warn!("Schema prompt {} is empty. Using default prompt", path.display());
            DEFAULT_SCHEMA_PROMPT.to_string()
        }
        Err(e) => {
            log::warn!(
                "Prompt file not found ({}: {}). Using default prompt",
                path.display(),
                e
            );
            DEFAULT_SCHEMA_PROMPT.to_string()
        }
    }
}

/// Sends text to the model with the schema instruction and merges the
/// returned nodes/edges into the graph store.
pub struct GraphIngestor {
    llm: Arc<dyn LanguageModel>,
    store: Arc<GraphStore>,
    model: String,
    system_instruction: String,
}

impl GraphIngestor {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        store: Arc<GraphStore>,
        model: impl Into<String>,
        system_instruction: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            store,
            model: model.into(),
            system_instruction: system_instruction.into(),
        }
    }

    /// Extract a graph fragment from `text` and upsert it.
    ///
    /// Returns a status string for the ingestion log; failures are reported
    /// in the string, never raised.
    pub async fn process(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return STATUS_EMPTY.to_string();
        }

        let request = GenerateRequest::new(&self.model, text)
            .with_system_instruction(&self.system_instruction)
            .json();

        let response = match self.llm.generate(request).await {
            Ok(response) => response,
            Err(e) => return format!("{} {}", PIPELINE_ERROR_PREFIX, e),
        };

        // A bare `null` payload is an empty extraction, not a parse failure
        let fragment = match serde_json::from_str::<Option<GraphFragment>>(&strip_code_fences(&response)) {
            Ok(Some(fragment)) => fragment,
            Ok(None) => return STATUS_EMPTY.to_string(),
            Err(e) => return format!("{} {}", PIPELINE_ERROR_PREFIX, e),
        };

        self.push_to_store(&fragment).await
    }

    async fn push_to_store(&self, fragment: &GraphFragment) -> String {
        if !self.store.is_connected() || fragment.is_empty() {
            return STATUS_EMPTY.to_string();
        }

        match self.store.upsert(fragment).await {
            Ok(summary) => {
                log::debug!(
                    "Graph upsert: {} entities, {} new edges, {} existing, {} dropped",
                    summary.entities,
                    summary.edges_inserted,
                    summary.edges_existing,
                    summary.edges_dropped
                );
                STATUS_SUCCESS.to_string()
            }
            Err(e) => format!("{} {}", STORE_ERROR_PREFIX, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use tempfile::TempDir;

    const AYRTON_JSON: &str = r#"{"nodes":[{"id":"Tom Ayrton","type":"Person"},{"id":"Captain Grant","type":"Person"}],
        "edges":[{"source":"Tom Ayrton","target":"Captain Grant","relation":"BETRAYED"}]}"#;

    async fn connected_store() -> (Arc<GraphStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = GraphStore::connect(temp_dir.path().join("graph.db")).await;
        (Arc::new(store), temp_dir)
    }

    #[tokio::test]
    async fn test_process_success_writes_graph() {
        let (store, _temp) = connected_store().await;
        let llm = Arc::new(ScriptedModel::replying(AYRTON_JSON));
        let ingestor = GraphIngestor::new(llm.clone(), store.clone(), "m", "schema");

        let status = ingestor
            .process("Tom Ayrton was a pirate who betrayed Captain Grant.")
            .await;

        assert_eq!(status, "Success");
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.entities, 2);
        assert_eq!(stats.relationships, 1);

        let request = &llm.requests()[0];
        assert!(request.json_response);
        assert_eq!(request.system_instruction.as_deref(), Some("schema"));
    }

    #[tokio::test]
    async fn test_process_accepts_fenced_json() {
        let (store, _temp) = connected_store().await;
        let fenced = format!("```json\n{}\n```", AYRTON_JSON);
        let ingestor = GraphIngestor::new(Arc::new(ScriptedModel::replying(&fenced)), store, "m", "s");
        assert_eq!(ingestor.process("some text").await, "Success");
    }

    #[tokio::test]
    async fn test_process_empty_payload() {
        let (store, _temp) = connected_store().await;
        let ingestor = GraphIngestor::new(Arc::new(ScriptedModel::replying("{}")), store, "m", "s");
        assert_eq!(ingestor.process("some text").await, "(no driver or empty data)");
    }

    #[tokio::test]
    async fn test_process_null_payload_is_empty() {
        let (store, _temp) = connected_store().await;
        let ingestor = GraphIngestor::new(Arc::new(ScriptedModel::replying("null")), store.clone(), "m", "s");
        assert_eq!(ingestor.process("some text").await, "(no driver or empty data)");
        assert_eq!(store.stats().await.unwrap().entities, 0);
    }

    #[tokio::test]
    async fn test_process_without_store() {
        let store = Arc::new(GraphStore::disconnected());
        let ingestor = GraphIngestor::new(Arc::new(ScriptedModel::replying(AYRTON_JSON)), store, "m", "s");
        assert_eq!(ingestor.process("some text").await, "(no driver or empty data)");
    }

    #[tokio::test]
    async fn test_process_malformed_json_is_pipeline_error() {
        let (store, _temp) = connected_store().await;
        let ingestor = GraphIngestor::new(Arc::new(ScriptedModel::replying("not json")), store, "m", "s");
        assert!(ingestor.process("some text").await.starts_with("Pipeline Error:"));
    }

    #[tokio::test]
    async fn test_process_model_failure_is_pipeline_error() {
        let (store, _temp) = connected_store().await;
        let ingestor = GraphIngestor::new(Arc::new(ScriptedModel::failing("quota")), store, "m", "s");
        let status = ingestor.process("some text").await;
        assert!(status.starts_with("Pipeline Error:"));
        assert!(status.contains("quota"));
    }

    #[tokio::test]
    async fn test_blank_text_skips_model() {
        let (store, _temp) = connected_store().await;
        let llm = Arc::new(ScriptedModel::replying(AYRTON_JSON));
        let ingestor = GraphIngestor::new(llm.clone(), store, "m", "s");
        assert_eq!(ingestor.process("   ").await, "(no driver or empty data)");
        assert_eq!(llm.calls(), 0);
    }

    #[test]
    fn test_load_schema_prompt_fallback() {
        let prompt = load_schema_prompt(Path::new("/nonexistent/schema_prompt.txt"));
        assert_eq!(prompt, DEFAULT_SCHEMA_PROMPT);
    }

    #[test]
    fn test_load_schema_prompt_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("schema_prompt.txt");
        std::fs::write(&path, "Return nodes and edges").unwrap();
        assert_eq!(load_schema_prompt(&path), "Return nodes and edges");
    }

    #[test]
    fn test_bundled_schema_prompt_is_readable() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/schema_prompt.txt");
        let prompt = load_schema_prompt(&path);
        assert!(prompt.contains("\"nodes\""));
    }
}
