//! Vector index and retriever.
//!
//! [`build_retriever`] embeds every chunk once, loads the vectors into an
//! immutable [`InMemoryIndex`] snapshot, and wraps it in a [`Retriever`]
//! that answers nearest-k lookups for query text. An empty chunk set is a
//! startup failure, never an empty-but-queryable index.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::embedding::{cosine_similarity, embed_batched, embed_query, EmbeddingProvider};
use crate::error::StartupError;
use crate::models::Chunk;

/// A chunk paired with its similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Nearest-neighbour lookup over embedded chunks.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return at most `k` chunks, nearest first.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Number of indexed chunks.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Brute-force cosine-similarity index held in memory.
pub struct InMemoryIndex {
    entries: Vec<(Chunk, Vec<f32>)>,
}

impl InMemoryIndex {
    pub fn new(entries: Vec<(Chunk, Vec<f32>)>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (_, v))| (i, cosine_similarity(query, v)))
            .collect();
        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].0.clone(),
                score,
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Query interface over one index snapshot.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>, k: usize) -> Self {
        Self { embedder, index, k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Embed `query` and return the nearest `k` chunks, nearest first.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Chunk>> {
        let vector = embed_query(self.embedder.as_ref(), query).await?;
        let hits = self.index.search(&vector, self.k).await?;
        debug!(hits = hits.len(), "retrieved chunks");
        Ok(hits.into_iter().map(|h| h.chunk).collect())
    }
}

/// Embed `chunks` and build a [`Retriever`] returning `k` chunks per query.
///
/// Chunks with identical text (same hash) are embedded once.
pub async fn build_retriever(
    chunks: Vec<Chunk>,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    k: usize,
) -> Result<Retriever, StartupError> {
    if chunks.is_empty() {
        return Err(StartupError::EmptyIndex);
    }

    let mut slot_by_hash: HashMap<&str, usize> = HashMap::new();
    let mut unique_texts: Vec<String> = Vec::new();
    let mut slots = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let slot = *slot_by_hash.entry(chunk.hash.as_str()).or_insert_with(|| {
            unique_texts.push(chunk.text.clone());
            unique_texts.len() - 1
        });
        slots.push(slot);
    }

    let vectors = embed_batched(embedder.as_ref(), &unique_texts, batch_size)
        .await
        .map_err(StartupError::Embedding)?;

    info!(
        chunks = chunks.len(),
        embedded = unique_texts.len(),
        model = embedder.model_name(),
        "embedded chunks"
    );

    let entries = chunks
        .into_iter()
        .zip(slots)
        .map(|(chunk, slot)| (chunk, vectors[slot].clone()))
        .collect();

    Ok(Retriever::new(
        embedder,
        Arc::new(InMemoryIndex::new(entries)),
        k,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;
    use serde_json::json;
    use std::sync::Mutex;

    /// Maps text onto fixed axes by keyword.
    struct KeywordEmbedder {
        seen: Mutex<Vec<String>>,
    }

    impl KeywordEmbedder {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keyword"
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.seen.lock().unwrap().extend(texts.iter().cloned());
            Ok(texts
                .iter()
                .map(|t| {
                    vec![
                        t.matches("cat").count() as f32,
                        t.matches("dog").count() as f32,
                        0.1,
                    ]
                })
                .collect())
        }
    }

    fn chunk(text: &str, source: &str) -> Chunk {
        let mut meta = Metadata::new();
        meta.insert("source".into(), json!(source));
        Chunk {
            id: text.to_string(),
            chunk_index: 0,
            text: text.to_string(),
            hash: format!("h-{}", text),
            metadata: meta,
        }
    }

    #[tokio::test]
    async fn test_empty_chunks_fail() {
        let err = build_retriever(Vec::new(), Arc::new(KeywordEmbedder::new()), 8, 3)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StartupError::EmptyIndex));
    }

    #[tokio::test]
    async fn test_nearest_first_and_bounded_by_k() {
        let chunks = vec![
            chunk("dog dog", "b.txt"),
            chunk("cat cat cat", "a.txt"),
            chunk("cat and dog", "c.txt"),
        ];
        let retriever = build_retriever(chunks, Arc::new(KeywordEmbedder::new()), 8, 2)
            .await
            .unwrap();
        assert_eq!(retriever.len(), 3);
        let hits = retriever.retrieve("cat").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source(), Some("a.txt"));
        assert_eq!(hits[1].source(), Some("c.txt"));
    }

    #[tokio::test]
    async fn test_duplicate_texts_embedded_once() {
        let embedder = Arc::new(KeywordEmbedder::new());
        let chunks = vec![chunk("cat", "a.txt"), chunk("cat", "b.txt")];
        let retriever = build_retriever(chunks, embedder.clone(), 8, 5)
            .await
            .unwrap();
        assert_eq!(retriever.len(), 2);
        // one build-time text
        assert_eq!(embedder.seen.lock().unwrap().len(), 1);
    }
}
