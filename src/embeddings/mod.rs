//! Text embeddings.
//!
//! [`Embedder`] never fails: blank input, a failed request or a vector of the
//! wrong length all come back as the all-zero vector, which downstream code
//! reads as "no signal".

pub mod gemini;

#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

pub use gemini::GeminiEmbeddingClient;

/// Default dimensionality of chunk and claim vectors
pub const DEFAULT_DIMENSIONS: usize = 768;

#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed one non-empty text into a vector of `dimensions` values
    async fn embed(&self, text: &str, dimensions: usize) -> Result<Vec<f32>>;
}

/// Stateless, cloneable embedding handle shared by every pipeline stage
#[derive(Clone)]
pub struct Embedder {
    backend: Arc<dyn EmbeddingBackend>,
    dimensions: usize,
}

impl Embedder {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, dimensions: usize) -> Self {
        Self { backend, dimensions }
    }

    /// Embed `text`, degrading to the zero vector instead of failing
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        if text.trim().is_empty() {
            return zero_vector(self.dimensions);
        }

        match self.backend.embed(text, self.dimensions).await {
            Ok(vector) if vector.len() == self.dimensions => vector,
            Ok(vector) => {
                log::warn!(
                    "Embedding has {} dimensions, expected {}; using zero vector",
                    vector.len(),
                    self.dimensions
                );
                zero_vector(self.dimensions)
            }
            Err(e) => {
                log::warn!("Embedding error: {}", e);
                zero_vector(self.dimensions)
            }
        }
    }
}

pub fn zero_vector(dimensions: usize) -> Vec<f32> {
    vec![0.0; dimensions]
}

/// True for the "embedding unavailable" sentinel
pub fn is_zero_vector(vector: &[f32]) -> bool {
    vector.iter().all(|v| *v == 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::testing::{FailingBackend, FixedBackend, HashingBackend};

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = Embedder::new(Arc::new(HashingBackend), DEFAULT_DIMENSIONS);
        let vector = embedder.embed("").await;
        assert_eq!(vector.len(), 768);
        assert!(is_zero_vector(&vector));
    }

    #[tokio::test]
    async fn test_whitespace_text_skips_backend() {
        // FailingBackend would log a warning; blank text never reaches it
        let backend = Arc::new(FailingBackend::default());
        let embedder = Embedder::new(backend.clone(), DEFAULT_DIMENSIONS);
        let vector = embedder.embed("  \n\t ").await;
        assert_eq!(vector.len(), 768);
        assert!(is_zero_vector(&vector));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_is_zero_vector() {
        let backend = Arc::new(FailingBackend::default());
        let embedder = Embedder::new(backend.clone(), DEFAULT_DIMENSIONS);
        let vector = embedder.embed("Tom Ayrton").await;
        assert_eq!(vector.len(), 768);
        assert!(is_zero_vector(&vector));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_zero_vector() {
        let embedder = Embedder::new(Arc::new(FixedBackend(vec![1.0; 3])), DEFAULT_DIMENSIONS);
        let vector = embedder.embed("text").await;
        assert_eq!(vector.len(), 768);
        assert!(is_zero_vector(&vector));
    }

    #[tokio::test]
    async fn test_successful_embedding_passes_through() {
        let embedder = Embedder::new(Arc::new(HashingBackend), 64);
        let vector = embedder.embed("Captain Grant").await;
        assert_eq!(vector.len(), 64);
        assert!(!is_zero_vector(&vector));
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_independent() {
        let embedder = Embedder::new(Arc::new(HashingBackend), 32);
        let a = embedder.clone();
        let b = embedder.clone();
        let (va, vb) = tokio::join!(a.embed("pirate ship"), b.embed("pirate ship"));
        assert_eq!(va, vb);
    }
}
