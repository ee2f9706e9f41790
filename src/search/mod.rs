//! In-memory nearest-neighbour index over chunk embeddings.
//!
//! Lives for one pipeline run. Documents are replaced wholesale when they
//! change, so a chunk never outlives the text it came from.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::embeddings::is_zero_vector;
use crate::ingest::Chunk;

/// A chunk returned by a top-k query
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMatch {
    pub chunk: Chunk,
    pub score: f32,
    /// 1-based position in the result list
    pub rank: usize,
}

#[derive(Default)]
pub struct ChunkIndex {
    /// doc_path -> (chunk, embedding) in chunk order
    documents: RwLock<HashMap<String, Vec<(Chunk, Vec<f32>)>>>,
}

impl ChunkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every chunk of `doc_path` with `entries`. Returns how many
    /// entries carry a usable (non-zero) vector.
    pub async fn replace_document(&self, doc_path: &str, entries: Vec<(Chunk, Vec<f32>)>) -> usize {
        let usable = entries.iter().filter(|(_, v)| !is_zero_vector(v)).count();
        let mut documents = self.documents.write().await;
        if entries.is_empty() {
            documents.remove(doc_path);
        } else {
            documents.insert(doc_path.to_string(), entries);
        }
        usable
    }

    /// Drop a document's chunks. Returns true if it was indexed.
    pub async fn remove_document(&self, doc_path: &str) -> bool {
        self.documents.write().await.remove(doc_path).is_some()
    }

    /// Number of indexed chunks
    pub async fn len(&self) -> usize {
        self.documents.read().await.values().map(|v| v.len()).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Score `query` against every indexed chunk and return the `k` most
    /// similar, best first.
    ///
    /// Zero vectors carry no signal: a zero query yields nothing and zero
    /// chunk vectors are never ranked.
    pub async fn top_k(&self, query: &[f32], k: usize) -> Vec<ChunkMatch> {
        if k == 0 || is_zero_vector(query) {
            return Vec::new();
        }

        let documents = self.documents.read().await;
        let mut scored: Vec<(f32, &Chunk)> = Vec::new();
        for (chunk, embedding) in documents.values().flatten() {
            if embedding.len() != query.len() || is_zero_vector(embedding) {
                continue;
            }
            scored.push((cosine_similarity(query, embedding), chunk));
        }

        // Ties resolve by chunk id so results are stable across runs
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.chunk_id.cmp(&b.1.chunk_id))
        });
        scored
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(idx, (score, chunk))| ChunkMatch {
                chunk: chunk.clone(),
                score,
                rank: idx + 1,
            })
            .collect()
    }
}

/// Cosine similarity in [-1, 1], or 0.0 if either vector has zero magnitude
/// or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}
