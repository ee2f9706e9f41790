use std::collections::VecDeque;

use sha2::{Digest, Sha256};

use crate::config::PerformanceConfig;

/// Separator preference, coarsest first. The empty separator splits into
/// single characters and always succeeds.
pub const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " ", ""];

/// A contiguous span of a source document; the unit of vector indexing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// `<doc_path>#<ordinal>:<content hash prefix>`; changes when the text changes
    pub chunk_id: String,
    pub doc_path: String,
    pub ordinal: usize,
    pub text: String,
}

/// Chunk a document into overlapping windows sized by the performance config
///
/// Uses character-based approximation: ~4 characters per token.
pub fn chunk_document(doc_path: &str, text: &str, config: &PerformanceConfig) -> Vec<Chunk> {
    let chunk_size = config.chunk_size_tokens.max(1) * 4;
    let overlap = config.chunk_overlap_tokens * 4;

    split_text(text, chunk_size, overlap)
        .into_iter()
        .enumerate()
        .map(|(ordinal, text)| Chunk {
            chunk_id: chunk_id(doc_path, ordinal, &text),
            doc_path: doc_path.to_string(),
            ordinal,
            text,
        })
        .collect()
}

fn chunk_id(doc_path: &str, ordinal: usize, text: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(text.as_bytes()));
    format!("{}#{}:{}", doc_path, ordinal, &digest[..12])
}

/// Recursively split `text` into pieces of at most `chunk_size` characters
/// with up to `overlap` characters shared between neighbours.
///
/// The coarsest separator present in the text is tried first; pieces that
/// are still too large are split again with the next finer separator.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.trim().is_empty() || chunk_size == 0 {
        return Vec::new();
    }
    let overlap = overlap.min(chunk_size.saturating_sub(1));
    split_recursive(text, SEPARATORS, chunk_size, overlap)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_recursive(text: &str, separators: &[&str], chunk_size: usize, overlap: usize) -> Vec<String> {
    let position = separators
        .iter()
        .position(|sep| sep.is_empty() || text.contains(sep))
        .unwrap_or(separators.len().saturating_sub(1));
    let separator = separators.get(position).copied().unwrap_or("");
    let finer = separators.get(position + 1..).unwrap_or(&[]);

    // Separators stay attached to the end of the piece they terminate
    let pieces: Vec<&str> = if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split_inclusive(separator).collect()
    };

    let mut chunks = Vec::new();
    let mut fitting: Vec<&str> = Vec::new();

    for piece in pieces {
        if char_len(piece) <= chunk_size {
            fitting.push(piece);
            continue;
        }
        if !fitting.is_empty() {
            chunks.extend(merge_pieces(&fitting, chunk_size, overlap));
            fitting.clear();
        }
        if finer.is_empty() {
            push_trimmed(&mut chunks, piece);
        } else {
            chunks.extend(split_recursive(piece, finer, chunk_size, overlap));
        }
    }

    if !fitting.is_empty() {
        chunks.extend(merge_pieces(&fitting, chunk_size, overlap));
    }
    chunks
}

/// Greedily pack small pieces into windows, carrying a tail of at most
/// `overlap` characters into the next window.
fn merge_pieces(pieces: &[&str], chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut window_len = 0usize;

    for piece in pieces {
        let len = char_len(piece);
        if window_len + len > chunk_size && !window.is_empty() {
            push_trimmed(&mut chunks, &window.iter().copied().collect::<String>());
            while window_len > overlap || (window_len + len > chunk_size && window_len > 0) {
                match window.pop_front() {
                    Some(front) => window_len -= char_len(front),
                    None => break,
                }
            }
        }
        window.push_back(piece);
        window_len += len;
    }

    if !window.is_empty() {
        push_trimmed(&mut chunks, &window.iter().copied().collect::<String>());
    }
    chunks
}

fn push_trimmed(chunks: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
