//! In-memory vector store for Neurite.
//!
//! [`InMemoryVectorStore`] keeps documents and embeddings in a map and scores
//! candidates with cosine similarity, evaluating metadata filters in-process.
//! It is the reference implementation of the [`VectorStore`] contract and is
//! mainly useful for tests and prototyping; production workloads should use
//! the pgvector or MongoDB integrations.

mod in_memory;

pub use in_memory::{InMemoryVectorStore, VectorStoreRetriever};

// Re-export core traits/types for convenience.
pub use neurite_core::{Document, Embeddings, Filter, Retriever, SearchRequest, VectorStore};
