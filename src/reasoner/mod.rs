//! Verdicts: claim + text evidence + graph evidence -> label and rationale.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::llm::{GenerateRequest, LanguageModel};

pub const NO_RATIONALE: &str = "No rationale provided.";
const RATIONALE_MARKER: &str = "RATIONALE:";
const VERDICT_MARKER: &str = "VERDICT:";

/// Closed set of verdict labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Supported,
    Contradicted,
    NotEnoughInfo,
    Error,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Supported => "Supported",
            Verdict::Contradicted => "Contradicted",
            Verdict::NotEnoughInfo => "Not Enough Info",
            Verdict::Error => "Error",
        }
    }

    /// Map a free-form model label onto the closed set. Anything that is
    /// not clearly supported or contradicted counts as Not Enough Info.
    /// `Error` is never produced here; only a failed call yields it.
    pub fn from_label(label: &str) -> Self {
        let normalized: String = label
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect();
        let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");

        if normalized.starts_with("not enough") || normalized.contains("insufficient") {
            Verdict::NotEnoughInfo
        } else if normalized.starts_with("contradict") || normalized.starts_with("refute") {
            Verdict::Contradicted
        } else if normalized.starts_with("support") {
            Verdict::Supported
        } else {
            Verdict::NotEnoughInfo
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Verdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Split a `VERDICT: ... / RATIONALE: ...` response
pub fn parse_verdict_response(text: &str) -> (Verdict, String) {
    let text = text.trim();
    let (verdict_part, rationale) = match text.split_once(RATIONALE_MARKER) {
        Some((verdict, rationale)) => (verdict, rationale.trim().to_string()),
        None => (text, NO_RATIONALE.to_string()),
    };
    let label = verdict_part.replace(VERDICT_MARKER, "");
    (Verdict::from_label(label.trim()), rationale)
}

pub struct Reasoner {
    llm: Arc<dyn LanguageModel>,
    model: String,
}

impl Reasoner {
    pub fn new(llm: Arc<dyn LanguageModel>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    /// Judge `claim` against the evidence only. A failed request yields
    /// `(Error, "Failed to reason: ...")`.
    pub async fn generate_verdict(
        &self,
        claim: &str,
        text_evidence: &str,
        graph_evidence: &str,
    ) -> (Verdict, String) {
        let prompt = build_prompt(claim, text_evidence, graph_evidence);
        match self.llm.generate(GenerateRequest::new(&self.model, prompt)).await {
            Ok(response) => parse_verdict_response(&response),
            Err(e) => {
                log::warn!("Reasoner failed for claim {:?}: {}", claim, e);
                (Verdict::Error, format!("Failed to reason: {}", e))
            }
        }
    }
}

fn build_prompt(claim: &str, text_evidence: &str, graph_evidence: &str) -> String {
    format!(
        r#"You are a Fact-Checker. Compare the 'Claim' against the 'Evidence' provided.

CLAIM: "{}"

TEXT EVIDENCE: {}

GRAPH EVIDENCE: {}

TASK:
1. VERDICT: Is the claim supported by the evidence? (Supported / Contradicted / Not Enough Info).
2. RATIONALE: Briefly explain why based ONLY on the provided evidence.

Return the result in this exact format:
VERDICT: [Your Verdict]
RATIONALE: [Your Rationale]"#,
        claim, text_evidence, graph_evidence
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;

    #[test]
    fn test_parse_standard_response() {
        let (verdict, rationale) =
            parse_verdict_response("VERDICT: Supported\nRATIONALE: Matches evidence X");
        assert_eq!(verdict.as_str(), "Supported");
        assert_eq!(rationale, "Matches evidence X");
    }

    #[test]
    fn test_parse_missing_rationale() {
        let (verdict, rationale) = parse_verdict_response("VERDICT: Contradicted");
        assert_eq!(verdict, Verdict::Contradicted);
        assert_eq!(rationale, "No rationale provided.");
    }

    #[test]
    fn test_parse_keeps_rest_of_response_as_rationale() {
        let (_, rationale) = parse_verdict_response(
            "VERDICT: Not Enough Info\nRATIONALE: The text never mentions Grant.\nIt only covers the voyage.",
        );
        assert_eq!(rationale, "The text never mentions Grant.\nIt only covers the voyage.");
    }

    #[test]
    fn test_labels_map_to_closed_set() {
        assert_eq!(Verdict::from_label("Supported"), Verdict::Supported);
        assert_eq!(Verdict::from_label("**Supported.**"), Verdict::Supported);
        assert_eq!(Verdict::from_label("contradicted"), Verdict::Contradicted);
        assert_eq!(Verdict::from_label("Not Enough Info"), Verdict::NotEnoughInfo);
        assert_eq!(Verdict::from_label("Not enough information"), Verdict::NotEnoughInfo);
        assert_eq!(Verdict::from_label("Partially true"), Verdict::NotEnoughInfo);
        assert_eq!(Verdict::from_label(""), Verdict::NotEnoughInfo);
    }

    #[test]
    fn test_model_written_error_label_is_not_enough_info() {
        assert_eq!(Verdict::from_label("Error"), Verdict::NotEnoughInfo);
        let (verdict, rationale) = parse_verdict_response("VERDICT: Error\nRATIONALE: x");
        assert_eq!(verdict, Verdict::NotEnoughInfo);
        assert_eq!(rationale, "x");
    }

    #[test]
    fn test_verdict_serializes_as_label() {
        assert_eq!(serde_json::to_string(&Verdict::NotEnoughInfo).unwrap(), "\"Not Enough Info\"");
    }

    #[tokio::test]
    async fn test_generate_verdict_prompt_contains_inputs() {
        let llm = Arc::new(ScriptedModel::replying("VERDICT: Supported\nRATIONALE: Stated directly."));
        let reasoner = Reasoner::new(llm.clone(), "m");

        let (verdict, rationale) = reasoner
            .generate_verdict(
                "Tom Ayrton betrayed Captain Grant.",
                "Tom Ayrton was a pirate who betrayed Captain Grant.",
                "Tom Ayrton --[BETRAYED]--> Captain Grant",
            )
            .await;

        assert_eq!(verdict, Verdict::Supported);
        assert_eq!(rationale, "Stated directly.");
        let prompt = &llm.requests()[0].contents;
        assert!(prompt.contains("CLAIM: \"Tom Ayrton betrayed Captain Grant.\""));
        assert!(prompt.contains("TEXT EVIDENCE: Tom Ayrton was a pirate"));
        assert!(prompt.contains("GRAPH EVIDENCE: Tom Ayrton --[BETRAYED]--> Captain Grant"));
    }

    #[tokio::test]
    async fn test_generate_verdict_failure() {
        let reasoner = Reasoner::new(Arc::new(ScriptedModel::failing("quota exceeded")), "m");
        let (verdict, rationale) = reasoner.generate_verdict("c", "t", "g").await;
        assert_eq!(verdict, Verdict::Error);
        assert_eq!(rationale, "Failed to reason: Language model error: quota exceeded");
    }
}
