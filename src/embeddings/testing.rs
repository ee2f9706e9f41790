//! Deterministic embedding backends for unit tests.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::EmbeddingBackend;
use crate::error::{ClaimgraphError, Result};

/// Bag-of-words embedding: every lowercased word adds 1.0 at a hashed index.
/// Texts sharing words end up close under cosine similarity.
pub struct HashingBackend;

pub fn hashed_bag_of_words(text: &str, dimensions: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimensions];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let digest = Sha256::digest(word.to_lowercase().as_bytes());
        let slot = u64::from_le_bytes(digest[..8].try_into().unwrap()) as usize % dimensions;
        vector[slot] += 1.0;
    }
    vector
}

#[async_trait]
impl EmbeddingBackend for HashingBackend {
    async fn embed(&self, text: &str, dimensions: usize) -> Result<Vec<f32>> {
        Ok(hashed_bag_of_words(text, dimensions))
    }
}

/// Always errors; counts how often it was called
#[derive(Default)]
pub struct FailingBackend {
    calls: AtomicUsize,
}

impl FailingBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingBackend for FailingBackend {
    async fn embed(&self, _text: &str, _dimensions: usize) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ClaimgraphError::Embedding("Gemini API error 503".to_string()))
    }
}

/// Returns the same vector for every input
pub struct FixedBackend(pub Vec<f32>);

#[async_trait]
impl EmbeddingBackend for FixedBackend {
    async fn embed(&self, _text: &str, _dimensions: usize) -> Result<Vec<f32>> {
        Ok(self.0.clone())
    }
}
