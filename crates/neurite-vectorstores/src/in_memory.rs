use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use neurite_core::{
    Document, Embeddings, NeuriteError, Retriever, SearchRequest, VectorStore,
};
use tokio::sync::RwLock;

/// Stored document with its embedding vector.
struct StoredEntry {
    document: Document,
    embedding: Vec<f32>,
}

/// In-memory vector store using cosine similarity, with metadata filters
/// evaluated directly against each document's metadata map.
pub struct InMemoryVectorStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new store pre-populated with documents.
    pub async fn from_documents(
        documents: Vec<Document>,
        embeddings: &dyn Embeddings,
    ) -> Result<Self, NeuriteError> {
        let store = Self::new();
        store.add_documents(documents, embeddings).await?;
        Ok(store)
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add_documents(
        &self,
        docs: Vec<Document>,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<String>, NeuriteError> {
        let texts: Vec<&str> = docs.iter().map(|d| d.content.as_str()).collect();
        let vectors = embeddings.embed_documents(&texts).await?;

        let mut entries = self.entries.write().await;
        let mut ids = Vec::with_capacity(docs.len());

        for (doc, embedding) in docs.into_iter().zip(vectors) {
            ids.push(doc.id.clone());
            entries.insert(
                doc.id.clone(),
                StoredEntry {
                    document: doc,
                    embedding,
                },
            );
        }

        Ok(ids)
    }

    async fn search(
        &self,
        query: &str,
        request: &SearchRequest,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<(Document, f32)>, NeuriteError> {
        let query_vec = embeddings.embed_query(query).await?;
        self.search_by_vector(&query_vec, request).await
    }

    async fn search_by_vector(
        &self,
        embedding: &[f32],
        request: &SearchRequest,
    ) -> Result<Vec<(Document, f32)>, NeuriteError> {
        let entries = self.entries.read().await;

        let mut scored: Vec<(Document, f32)> = entries
            .values()
            .filter(|entry| request.filter.matches(&entry.document.metadata))
            .map(|entry| {
                let score = cosine_similarity(embedding, &entry.embedding);
                (entry.document.clone(), score)
            })
            .filter(|(_, score)| match request.score_threshold {
                Some(threshold) => *score >= threshold,
                None => true,
            })
            .collect();

        // Sort by score descending.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(request.k);

        Ok(scored)
    }

    async fn delete(&self, ids: &[&str]) -> Result<(), NeuriteError> {
        let mut entries = self.entries.write().await;
        for id in ids {
            entries.remove(*id);
        }
        Ok(())
    }
}

/// A retriever that wraps a [`VectorStore`], bridging it to the `Retriever`
/// trait with a fixed filter and optional score threshold.
pub struct VectorStoreRetriever<S: VectorStore> {
    store: Arc<S>,
    embeddings: Arc<dyn Embeddings>,
    k: usize,
    filter: neurite_core::Filter,
    score_threshold: Option<f32>,
}

impl<S: VectorStore + 'static> VectorStoreRetriever<S> {
    pub fn new(store: Arc<S>, embeddings: Arc<dyn Embeddings>, k: usize) -> Self {
        Self {
            store,
            embeddings,
            k,
            filter: neurite_core::Filter::none(),
            score_threshold: None,
        }
    }

    /// Restrict retrieval to documents matching the filter.
    pub fn with_filter(mut self, filter: impl Into<neurite_core::Filter>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Set a minimum similarity score threshold. Only documents with a score
    /// greater than or equal to the threshold will be returned.
    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }
}

#[async_trait]
impl<S: VectorStore + 'static> Retriever for VectorStoreRetriever<S> {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Document>, NeuriteError> {
        let k = if top_k > 0 { top_k } else { self.k };

        let mut request = SearchRequest::new(k).with_filter(self.filter.clone());
        if let Some(threshold) = self.score_threshold {
            request = request.with_score_threshold(threshold);
        }

        let scored = self
            .store
            .search(query, &request, self.embeddings.as_ref())
            .await?;
        Ok(scored.into_iter().map(|(doc, _)| doc).collect())
    }
}

/// Compute cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
