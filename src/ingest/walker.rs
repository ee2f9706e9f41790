use walkdir::WalkDir;
use std::path::{Path, PathBuf};
use crate::error::{ClaimgraphError, Result};
use super::metadata::compute_content_hash;

/// Plaintext formats accepted as corpus documents
pub const DOCUMENT_EXTENSIONS: &[&str] = &["txt", "md"];

/// A corpus document: path relative to the docs folder plus full text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Forward-slash path relative to the docs folder
    pub path: String,
    pub text: String,
    pub content_hash: String,
}

impl SourceDocument {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            path: path.into(),
            content_hash: compute_content_hash(&text),
            text,
        }
    }
}

fn has_document_extension(path: &Path) -> bool {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    DOCUMENT_EXTENSIONS.contains(&extension.as_str())
}

/// Relative, forward-slash document path for `path` under `root`,
/// or None if `path` lies outside `root`.
pub fn relative_doc_path(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

/// Discover all plaintext documents under the docs folder, sorted by path.
pub fn discover_documents(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && has_document_extension(path) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    log::info!("Discovered {} documents in {}", files.len(), root.display());
    Ok(files)
}

/// Read a document that lives under `root`.
///
/// Returns None if the path is outside root, is not a file, or has an
/// unsupported extension. Undecodable bytes are replaced rather than rejected.
pub fn read_document(root: &Path, path: &Path) -> Result<Option<SourceDocument>> {
    let root = root
        .canonicalize()
        .map_err(|e| ClaimgraphError::Config(format!("docs folder canonicalize: {}", e)))?;
    let absolute = match path.canonicalize() {
        Ok(p) => p,
        // Deleted between event and read
        Err(_) => return Ok(None),
    };

    if !absolute.is_file() || !has_document_extension(&absolute) {
        return Ok(None);
    }
    let relative = match relative_doc_path(&root, &absolute) {
        Some(rel) => rel,
        None => return Ok(None),
    };

    let bytes = std::fs::read(&absolute).map_err(ClaimgraphError::Io)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    Ok(Some(SourceDocument::new(relative, text)))
}
