//! Error taxonomy shared by the library.
//!
//! Extraction and storage failures during bulk folder processing are
//! collected per file by [`crate::ingest`]; everywhere else they propagate
//! to the caller as the failed operation's result.

use crate::extract::ExtractError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file extension is not one of the supported document formats.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// The file was opened but its content could not be parsed.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Reading or writing the persisted maps failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The embedding provider could not produce vectors.
    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// The hosted language model call failed.
    #[error("language model error: {0}")]
    Llm(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid chunking configuration: chunk_size={chunk_size}, overlap={overlap}")]
    InvalidChunking { chunk_size: usize, overlap: usize },
}

impl From<ExtractError> for Error {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::UnsupportedFormat(ext) => Error::UnsupportedFormat(ext),
            other => Error::Extraction(other.to_string()),
        }
    }
}
