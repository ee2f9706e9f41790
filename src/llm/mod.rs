//! Language model seam.
//!
//! Every prompt-driven component (graph extraction, entity lookup, claim
//! decomposition, verdicts) talks to the model through [`LanguageModel`], so
//! the hosted client can be swapped for a scripted one in tests.

pub mod gemini;

#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use crate::error::Result;

pub use gemini::GeminiClient;

/// A single generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub model: String,
    pub system_instruction: Option<String>,
    pub contents: String,
    /// Ask the service for `application/json` output
    pub json_response: bool,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_instruction: None,
            contents: contents.into(),
            json_response: false,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn json(mut self) -> Self {
        self.json_response = true;
        self
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one generation request and return the raw response text
    async fn generate(&self, request: GenerateRequest) -> Result<String>;
}

fn code_fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```(?:json|JSON)?").expect("valid fence pattern"))
}

/// Remove markdown code fences (```json ... ```) around a model response.
pub fn strip_code_fences(text: &str) -> String {
    code_fence_regex().replace_all(text, "").trim().to_string()
}
