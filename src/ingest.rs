//! Document ingestion: extract → clean → chunk → store.
//!
//! [`DocumentProcessor`] turns a single file into chunks and drives bulk
//! processing of an upload folder. Bulk runs never abort on a bad file;
//! failures are collected into the [`IngestReport`].

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::chunk::{clean_text, Chunker};
use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::extract::{extract_file, SUPPORTED_EXTENSIONS};
use crate::models::{DocumentStats, IngestReport};
use crate::store::KnowledgeStore;

#[derive(Debug, Clone, Default)]
pub struct DocumentProcessor {
    chunker: Chunker,
}

impl DocumentProcessor {
    pub fn new(chunker: Chunker) -> Self {
        Self { chunker }
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Ok(Self::new(Chunker::new(config.chunk_size, config.overlap)?))
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Extract, clean and chunk one file.
    ///
    /// A document whose cleaned text is empty (e.g. a scanned PDF with no
    /// text layer) is an extraction error.
    pub fn process_document(&self, path: &Path) -> Result<Vec<String>> {
        let cleaned = self.cleaned_text(path)?;
        let chunks = self.chunker.chunk(&cleaned);
        tracing::debug!(file = %path.display(), chunks = chunks.len(), "processed document");
        Ok(chunks)
    }

    /// Process `path` and store its chunks under its file name.
    pub fn ingest_file(&self, path: &Path, store: &KnowledgeStore) -> Result<usize> {
        let document_id = document_id(path)?;
        let chunks = self.process_document(path)?;
        store.add_document(&document_id, &chunks)
    }

    /// Supported files directly inside `dir`, sorted by path.
    ///
    /// A missing folder yields an empty list.
    pub fn scan_folder(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            tracing::warn!(folder = %dir.display(), "folder does not exist");
            return Ok(Vec::new());
        }

        let supported = supported_globset()?;
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| Error::Storage(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if supported.is_match(entry.file_name()) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Ingest every supported file in `dir` not already in the store.
    pub fn process_folder(&self, dir: &Path, store: &KnowledgeStore) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for path in self.scan_folder(dir)? {
            let name = document_id(&path)?;
            if store.has_document(&name)? {
                report.skipped_files.push(name);
                continue;
            }

            match self.ingest_file(&path, store) {
                Ok(count) => {
                    tracing::info!(file = %name, chunks = count, "ingested");
                    report.total_chunks += count;
                    report.processed_files.push(name);
                }
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "failed to ingest");
                    report.errors.push(format!("{}: {}", name, e));
                }
            }
        }

        tracing::info!(
            folder = %dir.display(),
            processed = report.processed_files.len(),
            skipped = report.skipped_files.len(),
            errors = report.errors.len(),
            chunks = report.total_chunks,
            "folder processed"
        );
        Ok(report)
    }

    /// Size statistics for one file; nothing is stored.
    pub fn document_stats(&self, path: &Path) -> Result<DocumentStats> {
        let cleaned = self.cleaned_text(path)?;
        let chunks = self.chunker.chunk(&cleaned);
        let chunk_chars: usize = chunks.iter().map(|c| c.chars().count()).sum();

        Ok(DocumentStats {
            file_name: document_id(path)?,
            file_type: path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
                .unwrap_or_default(),
            character_count: cleaned.chars().count(),
            word_count: cleaned.split_whitespace().count(),
            chunk_count: chunks.len(),
            avg_chunk_size: if chunks.is_empty() {
                0
            } else {
                chunk_chars / chunks.len()
            },
        })
    }

    fn cleaned_text(&self, path: &Path) -> Result<String> {
        let raw = extract_file(path)?;
        let cleaned = clean_text(&raw);
        if cleaned.is_empty() {
            return Err(Error::Extraction(format!(
                "no text extracted from {}",
                path.display()
            )));
        }
        Ok(cleaned)
    }
}

/// Document id for a file: its file name.
pub fn document_id(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| Error::Extraction(format!("no file name in {}", path.display())))
}

fn supported_globset() -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for ext in SUPPORTED_EXTENSIONS {
        let glob = GlobBuilder::new(&format!("*.{}", ext))
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;
        builder.add(glob);
    }
    builder.build().map_err(|e| Error::Config(e.to_string()))
}
