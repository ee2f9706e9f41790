//! Scripted language model for unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{GenerateRequest, LanguageModel};
use crate::error::{ClaimgraphError, Result};

type Handler = Box<dyn Fn(&GenerateRequest) -> Result<String> + Send + Sync>;

/// Answers every request through a closure and records what it was asked.
pub struct ScriptedModel {
    handler: Handler,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedModel {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&GenerateRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always returns the same text
    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Always fails with an LLM error
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::new(move |_| Err(ClaimgraphError::Llm(message.clone())))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, request: GenerateRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(&request)
    }
}
