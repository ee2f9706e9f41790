use sha2::{Sha256, Digest};

/// SHA256 of document text, hex encoded
pub fn compute_content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}
