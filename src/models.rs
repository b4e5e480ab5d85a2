//! Data types that flow between the chunker, the store, and the calling layer.

use serde::{Deserialize, Serialize};

/// Metadata persisted for every stored chunk, keyed by its chunk key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// Source filename the chunk was cut from.
    pub document_id: String,
    /// Position within the document, starting at 0.
    pub chunk_index: usize,
    pub text: String,
    /// Character count of `text`.
    pub chunk_size: usize,
}

/// Per-document aggregate returned by `list_documents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub chunk_count: usize,
    pub total_size: usize,
}

/// A single nearest-neighbor hit.
///
/// `distance` is `1 - cosine_similarity`: 0 means identical direction,
/// larger means less similar (up to 2 for opposite vectors).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub document_id: String,
    pub distance: f32,
}

/// Summary of the whole collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    pub total_chunks: usize,
    pub total_documents: usize,
    pub storage_type: String,
    pub embedding_model: String,
}

/// Outcome of processing every supported file in a folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub processed_files: Vec<String>,
    pub skipped_files: Vec<String>,
    pub errors: Vec<String>,
    pub total_chunks: usize,
}

/// Basic statistics about a single document, computed without storing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    pub file_name: String,
    pub file_type: String,
    pub character_count: usize,
    pub word_count: usize,
    pub chunk_count: usize,
    pub avg_chunk_size: usize,
}
