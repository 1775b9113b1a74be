//! In-process retrieval index over one uploaded document.
//!
//! Chunks are held in memory for the lifetime of the owning session. When an
//! embedding provider is enabled every chunk gets a vector and retrieval is
//! brute-force cosine similarity; otherwise retrieval scores chunks by query
//! term overlap.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::chunk::chunk_fragments;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::models::{Chunk, Fragment};

/// A chunk selected by [`RetrievalIndex::retrieve`].
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
}

pub struct RetrievalIndex {
    chunks: Vec<Chunk>,
    /// Parallel to `chunks` when present.
    vectors: Option<Vec<Vec<f32>>>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for RetrievalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalIndex")
            .field("chunks", &self.chunks.len())
            .field("semantic", &self.vectors.is_some())
            .field("embedder", &self.embedder.model_name())
            .finish()
    }
}

/// Build an index from document fragments.
pub async fn build_index(
    fragments: &[Fragment],
    embedder: Arc<dyn EmbeddingProvider>,
    max_tokens: usize,
    batch_size: usize,
) -> Result<RetrievalIndex> {
    if fragments.is_empty() {
        bail!("cannot build an index from zero fragments");
    }

    let chunks = chunk_fragments(fragments, max_tokens);
    if chunks.is_empty() {
        bail!("document produced no indexable chunks");
    }

    let vectors = if embedder.is_enabled() {
        Some(embed_chunks(&chunks, embedder.as_ref(), batch_size).await?)
    } else {
        None
    };

    tracing::info!(
        fragments = fragments.len(),
        chunks = chunks.len(),
        model = embedder.model_name(),
        "built retrieval index"
    );

    Ok(RetrievalIndex {
        chunks,
        vectors,
        embedder,
    })
}

/// Embed chunks in batches, sending each distinct text once.
async fn embed_chunks(
    chunks: &[Chunk],
    embedder: &dyn EmbeddingProvider,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut unique: Vec<String> = Vec::new();
    let mut slot_by_hash: HashMap<&str, usize> = HashMap::new();
    for chunk in chunks {
        slot_by_hash.entry(chunk.hash.as_str()).or_insert_with(|| {
            unique.push(chunk.text.clone());
            unique.len() - 1
        });
    }

    let mut unique_vectors = Vec::with_capacity(unique.len());
    for batch in unique.chunks(batch_size.max(1)) {
        let vecs = embedder
            .embed(batch)
            .await
            .context("failed to embed document chunks")?;
        unique_vectors.extend(vecs);
    }
    if unique_vectors.len() != unique.len() {
        bail!(
            "embedder returned {} vectors for {} chunks",
            unique_vectors.len(),
            unique.len()
        );
    }

    Ok(chunks
        .iter()
        .map(|c| unique_vectors[slot_by_hash[c.hash.as_str()]].clone())
        .collect())
}

impl RetrievalIndex {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn is_semantic(&self) -> bool {
        self.vectors.is_some()
    }

    /// Return up to `top_k` chunks most relevant to `query`, best first.
    ///
    /// Keyword scoring falls back to the leading chunks when nothing matches,
    /// so the chat backend always receives some document context.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>> {
        let mut scored = match &self.vectors {
            Some(vectors) => {
                let query_vec = self
                    .embedder
                    .embed(&[query.to_string()])
                    .await?
                    .into_iter()
                    .next()
                    .context("empty embedding response for query")?;
                self.chunks
                    .iter()
                    .zip(vectors)
                    .map(|(chunk, v)| ScoredChunk {
                        chunk: chunk.clone(),
                        score: cosine_similarity(&query_vec, v) as f64,
                    })
                    .collect::<Vec<_>>()
            }
            None => self.keyword_scores(query),
        };

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    fn keyword_scores(&self, query: &str) -> Vec<ScoredChunk> {
        let terms = query_terms(query);

        let matched: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let text_lower = chunk.text.to_lowercase();
                let matches = terms.iter().filter(|t| text_lower.contains(*t)).count();
                (matches > 0).then(|| ScoredChunk {
                    chunk: chunk.clone(),
                    score: matches as f64 / terms.len() as f64,
                })
            })
            .collect();

        if !matched.is_empty() {
            return matched;
        }

        self.chunks
            .iter()
            .map(|chunk| ScoredChunk {
                chunk: chunk.clone(),
                score: 0.0,
            })
            .collect()
    }
}

/// Lowercased query words, minus punctuation and very short words.
fn query_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DisabledProvider;
    use async_trait::async_trait;

    fn fragments(texts: &[&str]) -> Vec<Fragment> {
        texts
            .iter()
            .enumerate()
            .map(|(index, t)| Fragment {
                index,
                text: t.to_string(),
            })
            .collect()
    }

    /// Two-dimensional toy embedder: axis 0 counts "rust", axis 1 counts "python".
    struct AxisEmbedder;

    #[async_trait]
    impl EmbeddingProvider for AxisEmbedder {
        fn model_name(&self) -> &str {
            "axis"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        t.matches("rust").count() as f32,
                        t.matches("python").count() as f32,
                    ]
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn rejects_empty_fragments() {
        let err = build_index(&[], Arc::new(DisabledProvider), 100, 8)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("zero fragments"));
    }

    #[tokio::test]
    async fn keyword_retrieval_prefers_matching_chunk() {
        let index = build_index(
            &fragments(&["Cats sleep all day.", "Deployment uses Kubernetes clusters."]),
            Arc::new(DisabledProvider),
            100,
            8,
        )
        .await
        .unwrap();
        assert!(!index.is_semantic());

        let hits = index.retrieve("How is deployment done?", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].chunk.text.contains("Kubernetes"));
    }

    #[tokio::test]
    async fn keyword_retrieval_falls_back_to_leading_chunks() {
        let index = build_index(
            &fragments(&["Hello world"]),
            Arc::new(DisabledProvider),
            100,
            8,
        )
        .await
        .unwrap();
        let hits = index.retrieve("What does it say?", 4).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "Hello world");
    }

    #[tokio::test]
    async fn semantic_retrieval_uses_vectors() {
        let index = build_index(
            &fragments(&["Python notebooks and python scripts.", "Rust crates and rust traits."]),
            Arc::new(AxisEmbedder),
            100,
            1,
        )
        .await
        .unwrap();
        assert!(index.is_semantic());
        assert_eq!(index.len(), 2);

        let hits = index.retrieve("tell me about rust", 1).await.unwrap();
        assert!(hits[0].chunk.text.starts_with("Rust"));
    }
}
