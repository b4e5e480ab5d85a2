//! Flat-file similarity store.
//!
//! [`KnowledgeStore`] owns two maps keyed by chunk key
//! (`"{document_id}_chunk_{index}"`):
//!
//! - **metadata**: [`ChunkMeta`], persisted as pretty JSON in `documents.json`
//! - **vectors**: `Vec<f32>`, persisted in the binary `embeddings.bin`
//!
//! The maps hold exactly the same keys at all times. Every mutation builds
//! the next state off to the side, writes both files, and only then swaps
//! it in, so a failed write leaves the in-memory store untouched. When the
//! vector file cannot be written, `documents.json` is rewritten from the
//! current state so the files on disk stay in step. A single `RwLock`
//! serializes mutations; searches and listings share the read side.
//!
//! Vectors with NaN or infinite components are refused on the way in and
//! on load.
//!
//! Search is a full scan: cosine similarity against every stored vector,
//! stable-sorted descending, truncated to `k`, reported as
//! `distance = 1 - similarity`.
//!
//! # Vector file layout
//!
//! ```text
//! b"KAVEC001" | count: u32 LE | count × ( key_len: u32 LE | key | dims: u32 LE | dims × f32 LE )
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use crate::embedding::{blob_to_vec, cosine_similarity, embed_query, vec_to_blob, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::models::{ChunkMeta, CollectionInfo, DocumentSummary, SearchHit};
use crate::persist::{FsMedium, PersistenceMedium};

pub const DOCUMENTS_FILE: &str = "documents.json";
pub const EMBEDDINGS_FILE: &str = "embeddings.bin";

const VECTOR_MAGIC: &[u8; 8] = b"KAVEC001";

/// Key under which chunk `index` of `document_id` is stored.
pub fn chunk_key(document_id: &str, index: usize) -> String {
    format!("{}_chunk_{}", document_id, index)
}

#[derive(Debug, Clone, Default, PartialEq)]
struct StoreState {
    documents: BTreeMap<String, ChunkMeta>,
    embeddings: BTreeMap<String, Vec<f32>>,
}

impl StoreState {
    fn is_empty(&self) -> bool {
        self.documents.is_empty() || self.embeddings.is_empty()
    }

    fn keys_for(&self, document_id: &str) -> Vec<String> {
        self.documents
            .iter()
            .filter(|(_, meta)| meta.document_id == document_id)
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn remove_keys(&mut self, keys: &[String]) {
        for key in keys {
            self.documents.remove(key);
            self.embeddings.remove(key);
        }
    }
}

pub struct KnowledgeStore {
    medium: Arc<dyn PersistenceMedium>,
    embedder: Arc<dyn EmbeddingProvider>,
    state: RwLock<StoreState>,
}

impl KnowledgeStore {
    /// Load the store from `medium`.
    ///
    /// Missing or unreadable files load as empty maps; the failure is
    /// logged, not returned.
    pub fn open(medium: Arc<dyn PersistenceMedium>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let state = load_state(medium.as_ref());
        tracing::info!(
            location = %medium.location(),
            chunks = state.documents.len(),
            model = embedder.model_name(),
            "knowledge store loaded"
        );
        Self {
            medium,
            embedder,
            state: RwLock::new(state),
        }
    }

    /// Open a store persisted as files in `dir`, creating the directory.
    pub fn open_dir(dir: &Path, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let medium = FsMedium::open(dir)?;
        Ok(Self::open(Arc::new(medium), embedder))
    }

    pub fn location(&self) -> String {
        self.medium.location()
    }

    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    /// Embed and store `chunks` as the content of `document_id`.
    ///
    /// Chunks previously stored for the same document are replaced, so an
    /// empty `chunks` removes the document. Returns the number of chunks
    /// stored.
    pub fn add_document(&self, document_id: &str, chunks: &[String]) -> Result<usize> {
        let vectors = if chunks.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed(chunks)?
        };
        if vectors.len() != chunks.len() {
            return Err(Error::EmbeddingProvider(format!(
                "expected {} vectors, provider returned {}",
                chunks.len(),
                vectors.len()
            )));
        }
        if let Some(index) = vectors.iter().position(|v| !is_finite_vector(v)) {
            return Err(Error::EmbeddingProvider(format!(
                "non-finite embedding for chunk {} of {}",
                index, document_id
            )));
        }

        let mut state = self.write_state()?;
        let stale = state.keys_for(document_id);
        if chunks.is_empty() && stale.is_empty() {
            tracing::debug!(document_id, "no chunks to add");
            return Ok(0);
        }
        let mut next = state.clone();
        next.remove_keys(&stale);

        for (index, (text, vector)) in chunks.iter().zip(vectors).enumerate() {
            let key = chunk_key(document_id, index);
            next.documents.insert(
                key.clone(),
                ChunkMeta {
                    document_id: document_id.to_string(),
                    chunk_index: index,
                    text: text.clone(),
                    chunk_size: text.chars().count(),
                },
            );
            next.embeddings.insert(key, vector);
        }

        self.persist(&next, &state)?;
        *state = next;

        tracing::info!(
            document_id,
            chunks = chunks.len(),
            replaced = stale.len(),
            "added document to knowledge store"
        );
        Ok(chunks.len())
    }

    /// Top-`k` chunks most similar to `query`, most similar first.
    ///
    /// An empty store returns no hits without calling the embedder.
    pub fn search_similar(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || self.read_state()?.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = embed_query(self.embedder.as_ref(), query)?;
        self.search_by_vector(&query_vec, k)
    }

    /// Top-`k` chunks most similar to an already-embedded query.
    pub fn search_by_vector(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let started = Instant::now();
        let state = self.read_state()?;

        let mut scored: Vec<(f32, &ChunkMeta)> = state
            .embeddings
            .iter()
            .filter_map(|(key, vector)| {
                state
                    .documents
                    .get(key)
                    .map(|meta| (cosine_similarity(query_vec, vector), meta))
            })
            .filter(|(similarity, _)| !similarity.is_nan())
            .collect();

        // Stable: equal similarities keep chunk-key order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(k);

        let hits: Vec<SearchHit> = scored
            .into_iter()
            .map(|(similarity, meta)| SearchHit {
                text: meta.text.clone(),
                document_id: meta.document_id.clone(),
                distance: 1.0 - similarity,
            })
            .collect();

        tracing::debug!(
            scanned = state.embeddings.len(),
            returned = hits.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "vector search"
        );
        Ok(hits)
    }

    /// Remove every chunk of `document_id`. Returns how many were removed;
    /// removing an absent document is a no-op.
    pub fn remove_document(&self, document_id: &str) -> Result<usize> {
        let mut state = self.write_state()?;
        let keys = state.keys_for(document_id);
        if keys.is_empty() {
            return Ok(0);
        }

        let mut next = state.clone();
        next.remove_keys(&keys);
        self.persist(&next, &state)?;
        *state = next;

        tracing::info!(document_id, chunks = keys.len(), "removed document from knowledge store");
        Ok(keys.len())
    }

    /// Per-document chunk counts and total sizes, sorted by document id.
    pub fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let state = self.read_state()?;
        let mut grouped: BTreeMap<&str, DocumentSummary> = BTreeMap::new();
        for meta in state.documents.values() {
            let entry = grouped
                .entry(meta.document_id.as_str())
                .or_insert_with(|| DocumentSummary {
                    document_id: meta.document_id.clone(),
                    chunk_count: 0,
                    total_size: 0,
                });
            entry.chunk_count += 1;
            entry.total_size += meta.chunk_size;
        }
        Ok(grouped.into_values().collect())
    }

    pub fn has_document(&self, document_id: &str) -> Result<bool> {
        Ok(self
            .read_state()?
            .documents
            .values()
            .any(|meta| meta.document_id == document_id))
    }

    /// Empty both maps and persist the empty state.
    pub fn clear_all(&self) -> Result<()> {
        let mut state = self.write_state()?;
        let next = StoreState::default();
        self.persist(&next, &state)?;
        let cleared = state.documents.len();
        *state = next;
        tracing::info!(chunks = cleared, "knowledge store cleared");
        Ok(())
    }

    pub fn collection_info(&self) -> Result<CollectionInfo> {
        let total_documents = self.list_documents()?.len();
        let total_chunks = self.read_state()?.documents.len();
        Ok(CollectionInfo {
            total_chunks,
            total_documents,
            storage_type: "file_based".to_string(),
            embedding_model: self.embedder.model_name().to_string(),
        })
    }

    /// Write `next` to the medium. `current` is what the files held before;
    /// if the vector file cannot be written, the metadata file goes back to it.
    fn persist(&self, next: &StoreState, current: &StoreState) -> Result<()> {
        self.medium.write(DOCUMENTS_FILE, &encode_documents(next)?)?;
        if let Err(e) = self.medium.write(EMBEDDINGS_FILE, &encode_vectors(&next.embeddings)) {
            let restored = encode_documents(current)
                .and_then(|bytes| self.medium.write(DOCUMENTS_FILE, &bytes));
            if let Err(restore_err) = restored {
                tracing::error!(
                    error = %restore_err,
                    "could not restore {} after failed vector write",
                    DOCUMENTS_FILE
                );
            }
            return Err(e);
        }
        Ok(())
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| Error::Storage("store lock poisoned".into()))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| Error::Storage("store lock poisoned".into()))
    }
}

fn load_state(medium: &dyn PersistenceMedium) -> StoreState {
    let mut documents: BTreeMap<String, ChunkMeta> = load_blob(medium, DOCUMENTS_FILE, |bytes| {
        serde_json::from_slice(bytes).map_err(|e| Error::Storage(e.to_string()))
    });
    let mut embeddings = load_blob(medium, EMBEDDINGS_FILE, decode_vectors);

    let before = (documents.len(), embeddings.len());
    documents.retain(|key, _| embeddings.contains_key(key));
    embeddings.retain(|key, _| documents.contains_key(key));
    if before != (documents.len(), embeddings.len()) {
        tracing::warn!(
            metadata = before.0,
            vectors = before.1,
            kept = documents.len(),
            "persisted maps out of step; dropped unmatched chunks"
        );
    }

    StoreState {
        documents,
        embeddings,
    }
}

fn load_blob<T: Default>(
    medium: &dyn PersistenceMedium,
    name: &str,
    decode: impl Fn(&[u8]) -> Result<T>,
) -> T {
    if !medium.exists(name) {
        return T::default();
    }
    match medium.read(name).and_then(|bytes| decode(&bytes)) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(file = name, error = %e, "unreadable store file, starting empty");
            T::default()
        }
    }
}

fn encode_documents(state: &StoreState) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(&state.documents)
        .map_err(|e| Error::Storage(format!("serialize {}: {}", DOCUMENTS_FILE, e)))
}

fn is_finite_vector(vector: &[f32]) -> bool {
    vector.iter().all(|x| x.is_finite())
}

fn encode_vectors(map: &BTreeMap<String, Vec<f32>>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(VECTOR_MAGIC);
    out.extend_from_slice(&(map.len() as u32).to_le_bytes());
    for (key, vector) in map {
        out.extend_from_slice(&(key.len() as u32).to_le_bytes());
        out.extend_from_slice(key.as_bytes());
        out.extend_from_slice(&(vector.len() as u32).to_le_bytes());
        out.extend_from_slice(&vec_to_blob(vector));
    }
    out
}

fn decode_vectors(bytes: &[u8]) -> Result<BTreeMap<String, Vec<f32>>> {
    let mut reader = ByteReader { bytes, pos: 0 };
    if reader.take(VECTOR_MAGIC.len())? != VECTOR_MAGIC {
        return Err(Error::Storage("bad vector file header".into()));
    }

    let count = reader.u32()?;
    let mut map = BTreeMap::new();
    for _ in 0..count {
        let key_len = reader.u32()? as usize;
        let key = std::str::from_utf8(reader.take(key_len)?)
            .map_err(|e| Error::Storage(format!("chunk key is not UTF-8: {}", e)))?
            .to_string();
        let dims = reader.u32()? as usize;
        let vector = blob_to_vec(reader.take(dims.saturating_mul(4))?);
        if !is_finite_vector(&vector) {
            return Err(Error::Storage(format!("non-finite vector for {}", key)));
        }
        map.insert(key, vector);
    }

    if reader.pos != bytes.len() {
        return Err(Error::Storage("trailing bytes in vector file".into()));
    }
    Ok(map)
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| Error::Storage("truncated vector file".into()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}
