//! MongoDB Atlas Vector Search integration for Neurite.
//!
//! This crate provides [`MongoVectorStore`], an implementation of the
//! [`VectorStore`](neurite_core::VectorStore) trait backed by
//! [MongoDB Atlas Vector Search](https://www.mongodb.com/docs/atlas/atlas-vector-search/).
//! Similarity search runs through the `$vectorSearch` aggregation stage;
//! metadata filters compile to nested boolean/comparison documents applied as
//! `$vectorSearch` pre-filters.
//!
//! # Example
//!
//! ```rust,no_run
//! use neurite_mongodb::{MongoVectorConfig, MongoVectorStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MongoVectorConfig::new("my_database", "my_collection")
//!     .with_vector_dimensions(1536);
//! let store = MongoVectorStore::from_uri("mongodb+srv://...", config).await?;
//! # Ok(())
//! # }
//! ```

mod vector_store;

pub use vector_store::{AtlasSimilarity, MongoVectorConfig, MongoVectorStore};

// Re-export core traits/types for convenience.
pub use neurite_core::{Document, Embeddings, Filter, SearchRequest, VectorStore};
