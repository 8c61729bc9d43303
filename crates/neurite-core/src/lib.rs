//! Core traits and types shared by the Neurite vector store integrations:
//! [`Document`], [`Embeddings`], [`VectorStore`], [`Retriever`], and the
//! unified [`NeuriteError`].

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use neurite_filter::{Filter, FilterError, FilterExpr, FilterValue};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for the Neurite crates.
///
/// Database-level failures from the underlying drivers are wrapped in
/// [`VectorStore`](NeuriteError::VectorStore) with the driver's error text;
/// they are never retried or masked here.
#[derive(Debug, Error)]
pub enum NeuriteError {
    #[error("filter error: {0}")]
    Filter(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("vector store error: {0}")]
    VectorStore(String),
    /// An embedding vector's length disagrees with the configured store
    /// dimensionality. Fatal for the operation that produced it.
    #[error("dimension mismatch: expected {expected} dimensions, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// Schema validation was enabled and the configured identifiers were not
    /// found or are unsafe. Fatal at initialization.
    #[error("schema validation error: {0}")]
    SchemaValidation(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("retriever error: {0}")]
    Retriever(String),
}

impl From<FilterError> for NeuriteError {
    fn from(e: FilterError) -> Self {
        NeuriteError::Filter(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A document with content and metadata, as stored and retrieved by the
/// vector stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(
        id: impl Into<String>,
        content: impl Into<String>,
        metadata: HashMap<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
        }
    }
}

// ---------------------------------------------------------------------------
// Embeddings
// ---------------------------------------------------------------------------

/// Trait for embedding text into fixed-length vectors.
///
/// The produced dimensionality must match the configured store dimension;
/// stores report [`NeuriteError::DimensionMismatch`] otherwise.
#[async_trait]
pub trait Embeddings: Send + Sync {
    /// Embed multiple texts (for batch document embedding).
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, NeuriteError>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, NeuriteError>;
}

// ---------------------------------------------------------------------------
// SearchRequest
// ---------------------------------------------------------------------------

/// Parameters for a similarity search: result count, an optional metadata
/// filter, and an optional minimum similarity score.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// Number of results to return.
    pub k: usize,
    /// Metadata filter; the default imposes no restriction.
    pub filter: Filter,
    /// Minimum similarity score (higher = more similar). Results scoring
    /// below the threshold are dropped.
    pub score_threshold: Option<f32>,
}

impl SearchRequest {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            filter: Filter::none(),
            score_threshold: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Parse and attach a filter from the text DSL.
    pub fn with_filter_text(mut self, text: &str) -> Result<Self, FilterError> {
        self.filter = Filter::parse(text)?;
        Ok(self)
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }
}

// ---------------------------------------------------------------------------
// VectorStore
// ---------------------------------------------------------------------------

/// Trait for vector storage backends.
///
/// The filtered entry points are [`search`](VectorStore::search) and
/// [`search_by_vector`](VectorStore::search_by_vector); the unfiltered
/// `similarity_search*` methods are conveniences layered on top of them.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Add documents to the store, computing their embeddings. Returns the
    /// stored document ids.
    async fn add_documents(
        &self,
        docs: Vec<Document>,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<String>, NeuriteError>;

    /// Search for similar documents by query text, with scores.
    async fn search(
        &self,
        query: &str,
        request: &SearchRequest,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<(Document, f32)>, NeuriteError>;

    /// Search by pre-computed embedding vector, with scores.
    async fn search_by_vector(
        &self,
        embedding: &[f32],
        request: &SearchRequest,
    ) -> Result<Vec<(Document, f32)>, NeuriteError>;

    /// Delete documents by id.
    async fn delete(&self, ids: &[&str]) -> Result<(), NeuriteError>;

    /// Unfiltered search by query text.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<Document>, NeuriteError> {
        let results = self.search(query, &SearchRequest::new(k), embeddings).await?;
        Ok(results.into_iter().map(|(doc, _)| doc).collect())
    }

    /// Unfiltered search by query text, with scores.
    async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<(Document, f32)>, NeuriteError> {
        self.search(query, &SearchRequest::new(k), embeddings).await
    }

    /// Unfiltered search by pre-computed embedding vector.
    async fn similarity_search_by_vector(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<Document>, NeuriteError> {
        let results = self
            .search_by_vector(embedding, &SearchRequest::new(k))
            .await?;
        Ok(results.into_iter().map(|(doc, _)| doc).collect())
    }
}

// ---------------------------------------------------------------------------
// Retriever
// ---------------------------------------------------------------------------

/// Trait for retrieving relevant documents given a query string.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Document>, NeuriteError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
