pub mod walker;
pub mod metadata;
pub mod chunker;
pub mod queries;

pub use walker::{SourceDocument, discover_documents, read_document, relative_doc_path, DOCUMENT_EXTENSIONS};
pub use metadata::compute_content_hash;
pub use chunker::{Chunk, chunk_document, split_text};
pub use queries::{QueryRow, read_queries};
