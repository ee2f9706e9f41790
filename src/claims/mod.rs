//! Claim decomposition: narrative -> atomic factual statements.

use std::sync::Arc;

use crate::error::{ClaimgraphError, Result};
use crate::llm::{strip_code_fences, GenerateRequest, LanguageModel};

/// Inputs shorter than this many characters produce no claims
pub const MIN_NARRATIVE_CHARS: usize = 10;

pub struct ClaimDecomposer {
    llm: Arc<dyn LanguageModel>,
    model: String,
}

impl ClaimDecomposer {
    pub fn new(llm: Arc<dyn LanguageModel>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    /// Split `text` into standalone claims.
    ///
    /// Short input yields no claims without a model call. Any request or
    /// parse failure, or an empty claim list, falls back to `[text]`.
    pub async fn decompose(&self, text: &str) -> Vec<String> {
        if text.chars().count() < MIN_NARRATIVE_CHARS {
            return Vec::new();
        }

        match self.request_claims(text).await {
            Ok(claims) if !claims.is_empty() => claims,
            Ok(_) => {
                log::warn!("Decomposition returned no claims; keeping the original text");
                vec![text.to_string()]
            }
            Err(e) => {
                log::warn!("Error decomposing text: {}", e);
                vec![text.to_string()]
            }
        }
    }

    async fn request_claims(&self, text: &str) -> Result<Vec<String>> {
        let prompt = format!(
            r#"You are a logic engine. Break the following text into atomic, standalone facts (claims).
Each claim must be a complete sentence containing the entities involved.

TEXT: "{}"

Return ONLY a raw JSON list of strings. No markdown, no code blocks.
Example: ["Fact 1", "Fact 2"]"#,
            text
        );
        let response = self
            .llm
            .generate(GenerateRequest::new(&self.model, prompt))
            .await?;
        parse_claim_list(&response)
    }
}

fn parse_claim_list(response: &str) -> Result<Vec<String>> {
    let claims: Vec<String> = serde_json::from_str(&strip_code_fences(response))
        .map_err(|e| ClaimgraphError::Parse(format!("claim list: {}", e)))?;
    Ok(claims
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect())
}
