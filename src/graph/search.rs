//! Claim -> entity names -> connected facts in the graph store.

use std::sync::Arc;

use serde_json::Value;

use super::GraphStore;
use crate::error::{ClaimgraphError, Result};
use crate::llm::{strip_code_fences, GenerateRequest, LanguageModel};

pub const NO_ENTITIES_FOUND: &str = "No entities found.";
pub const NO_CONNECTIONS_FOUND: &str = "No graph connections found.";
pub const GRAPH_UNAVAILABLE: &str = "Graph store unavailable.";

pub struct GraphSearcher {
    llm: Arc<dyn LanguageModel>,
    store: Arc<GraphStore>,
    model: String,
    limit: usize,
}

impl GraphSearcher {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        store: Arc<GraphStore>,
        model: impl Into<String>,
        limit: usize,
    ) -> Self {
        Self {
            llm,
            store,
            model: model.into(),
            limit,
        }
    }

    /// Graph evidence for `query` as `"a --[REL]--> b; ..."` or a sentinel
    pub async fn search(&self, query: &str) -> String {
        if query.trim().is_empty() {
            return NO_ENTITIES_FOUND.to_string();
        }
        if !self.store.is_connected() {
            return GRAPH_UNAVAILABLE.to_string();
        }

        let entities = match self.extract_entities(query).await {
            Ok(entities) => entities,
            Err(e) => return format!("Entity Extraction Error: {}", e),
        };
        if entities.is_empty() {
            return NO_ENTITIES_FOUND.to_string();
        }
        log::debug!("Graph search entities: {:?}", entities);

        match self.store.find_connections(&entities, self.limit).await {
            Ok(facts) if facts.is_empty() => NO_CONNECTIONS_FOUND.to_string(),
            Ok(facts) => facts
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
            Err(e) => format!("Graph Search Error: {}", e),
        }
    }

    async fn extract_entities(&self, query: &str) -> Result<Vec<String>> {
        let prompt = format!(
            r#"Identify the main entities (People, Places, Objects) in this text.
Text: "{}"
Return ONLY a JSON list of strings. Example: ["Tom Ayrton", "Britannia"]"#,
            query
        );
        let response = self
            .llm
            .generate(GenerateRequest::new(&self.model, prompt).json())
            .await?;
        parse_entity_list(&response)
    }
}

/// Accepts a JSON list of strings or a single bare string
pub(crate) fn parse_entity_list(response: &str) -> Result<Vec<String>> {
    let value: Value = serde_json::from_str(&strip_code_fences(response))
        .map_err(|e| ClaimgraphError::Parse(e.to_string()))?;

    let names = match value {
        Value::String(name) => vec![name],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(name) => Some(name),
                _ => None,
            })
            .collect(),
        other => {
            return Err(ClaimgraphError::Parse(format!(
                "expected a JSON list of strings, got {}",
                other
            )))
        }
    };

    Ok(names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Entity, GraphFragment, Relationship};
    use crate::llm::testing::ScriptedModel;
    use tempfile::TempDir;

    async fn store_with_ayrton() -> (Arc<GraphStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = GraphStore::connect(temp_dir.path().join("graph.db")).await;
        store
            .upsert(&GraphFragment {
                nodes: vec![
                    Entity { id: "Tom Ayrton".to_string(), label: Some("Person".to_string()) },
                    Entity { id: "Mutineers".to_string(), label: Some("Group".to_string()) },
                ],
                edges: vec![Relationship {
                    source: "Tom Ayrton".to_string(),
                    target: "Mutineers".to_string(),
                    relation: "LEADER".to_string(),
                }],
            })
            .await
            .unwrap();
        (Arc::new(store), temp_dir)
    }

    #[tokio::test]
    async fn test_search_finds_edge() {
        let (store, _temp) = store_with_ayrton().await;
        let llm = Arc::new(ScriptedModel::replying(r#"["Tom Ayrton"]"#));
        let searcher = GraphSearcher::new(llm.clone(), store, "gemini-2.0-flash", 10);

        let evidence = searcher.search("Tom Ayrton led the mutiny.").await;
        assert_eq!(evidence, "Tom Ayrton --[LEADER]--> Mutineers");

        let request = &llm.requests()[0];
        assert_eq!(request.model, "gemini-2.0-flash");
        assert!(request.json_response);
        assert!(request.contents.contains("Tom Ayrton led the mutiny."));
    }

    #[tokio::test]
    async fn test_search_no_entities() {
        let (store, _temp) = store_with_ayrton().await;
        let searcher = GraphSearcher::new(Arc::new(ScriptedModel::replying("[]")), store, "m", 10);
        assert_eq!(searcher.search("It rained.").await, "No entities found.");
    }

    #[tokio::test]
    async fn test_search_no_connections() {
        let (store, _temp) = store_with_ayrton().await;
        let searcher =
            GraphSearcher::new(Arc::new(ScriptedModel::replying(r#"["Paganel"]"#)), store, "m", 10);
        assert_eq!(searcher.search("Paganel read maps.").await, "No graph connections found.");
    }

    #[tokio::test]
    async fn test_search_bare_string_entity() {
        let (store, _temp) = store_with_ayrton().await;
        let searcher =
            GraphSearcher::new(Arc::new(ScriptedModel::replying(r#""mutineers""#)), store, "m", 10);
        assert_eq!(searcher.search("The mutineers.").await, "Tom Ayrton --[LEADER]--> Mutineers");
    }

    #[tokio::test]
    async fn test_search_extraction_failure() {
        let (store, _temp) = store_with_ayrton().await;
        let searcher = GraphSearcher::new(Arc::new(ScriptedModel::failing("timeout")), store, "m", 10);
        assert!(searcher
            .search("Tom Ayrton")
            .await
            .starts_with("Entity Extraction Error:"));
    }

    #[tokio::test]
    async fn test_search_disconnected_store_skips_model() {
        let llm = Arc::new(ScriptedModel::replying(r#"["Tom Ayrton"]"#));
        let searcher = GraphSearcher::new(llm.clone(), Arc::new(GraphStore::disconnected()), "m", 10);
        assert_eq!(searcher.search("Tom Ayrton").await, GRAPH_UNAVAILABLE);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_search_blank_query() {
        let llm = Arc::new(ScriptedModel::replying(r#"["x"]"#));
        let searcher = GraphSearcher::new(llm.clone(), Arc::new(GraphStore::disconnected()), "m", 10);
        assert_eq!(searcher.search("  ").await, NO_ENTITIES_FOUND);
        assert_eq!(llm.calls(), 0);
    }

    #[test]
    fn test_parse_entity_list_variants() {
        assert_eq!(parse_entity_list(r#"["A", " B ", 3, ""]"#).unwrap(), vec!["A", "B"]);
        assert_eq!(parse_entity_list("```json\n[\"A\"]\n```").unwrap(), vec!["A"]);
        assert!(parse_entity_list(r#"{"a": 1}"#).is_err());
        assert!(parse_entity_list("nope").is_err());
    }
}
