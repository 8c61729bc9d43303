use std::collections::HashMap;

use async_trait::async_trait;
use bson::{doc, Bson, Document as BsonDocument};
use futures::TryStreamExt;
use mongodb::error::{CommandError, ErrorKind};
use mongodb::Client;
use neurite_core::{Document, Embeddings, NeuriteError, SearchRequest, VectorStore};
use serde_json::Value;
use tracing::debug;

// ---------------------------------------------------------------------------
// MongoVectorConfig
// ---------------------------------------------------------------------------

/// Similarity function of the Atlas Vector Search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AtlasSimilarity {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
}

impl AtlasSimilarity {
    fn as_str(&self) -> &'static str {
        match self {
            AtlasSimilarity::Cosine => "cosine",
            AtlasSimilarity::Euclidean => "euclidean",
            AtlasSimilarity::DotProduct => "dotProduct",
        }
    }
}

/// Configuration for a [`MongoVectorStore`].
#[derive(Debug, Clone)]
pub struct MongoVectorConfig {
    /// MongoDB database name.
    pub database: String,
    /// MongoDB collection name.
    pub collection: String,
    /// Name of the Atlas Vector Search index (default: `vector_index`).
    pub index_name: String,
    /// Field name storing the embedding vector (default: `embedding`).
    pub vector_field: String,
    /// Field name storing the document content (default: `content`).
    pub content_field: String,
    /// Field name storing the metadata sub-document (default: `metadata`).
    pub metadata_field: String,
    /// Number of candidates for `$vectorSearch` (default: `10 * k`).
    pub num_candidates: Option<i64>,
    /// Expected embedding dimensionality; enforced on insert and search when
    /// set, and required for index bootstrap.
    pub vector_dimensions: Option<usize>,
    /// Similarity function used when bootstrapping the index.
    pub similarity: AtlasSimilarity,
    /// Metadata keys indexed as `$vectorSearch` filter fields during
    /// bootstrap. Filters on unindexed keys are rejected by Atlas.
    pub filter_paths: Vec<String>,
    /// When enabled, [`initialize`](MongoVectorStore::initialize) creates the
    /// collection and the vector search index. Never implicit.
    pub initialize_schema: bool,
}

impl MongoVectorConfig {
    /// Create a new config with the required database and collection names.
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
            index_name: "vector_index".to_string(),
            vector_field: "embedding".to_string(),
            content_field: "content".to_string(),
            metadata_field: "metadata".to_string(),
            num_candidates: None,
            vector_dimensions: None,
            similarity: AtlasSimilarity::default(),
            filter_paths: Vec::new(),
            initialize_schema: false,
        }
    }

    /// Set the vector search index name.
    pub fn with_index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = index_name.into();
        self
    }

    /// Set the field name for storing embedding vectors.
    pub fn with_vector_field(mut self, vector_field: impl Into<String>) -> Self {
        self.vector_field = vector_field.into();
        self
    }

    /// Set the field name for storing document content.
    pub fn with_content_field(mut self, content_field: impl Into<String>) -> Self {
        self.content_field = content_field.into();
        self
    }

    /// Set the field name for the metadata sub-document.
    pub fn with_metadata_field(mut self, metadata_field: impl Into<String>) -> Self {
        self.metadata_field = metadata_field.into();
        self
    }

    /// Set the number of candidates for `$vectorSearch`.
    ///
    /// If not set, defaults to `10 * k` at query time.
    pub fn with_num_candidates(mut self, num_candidates: i64) -> Self {
        self.num_candidates = Some(num_candidates);
        self
    }

    /// Set the expected embedding dimensionality.
    pub fn with_vector_dimensions(mut self, dimensions: usize) -> Self {
        self.vector_dimensions = Some(dimensions);
        self
    }

    pub fn with_similarity(mut self, similarity: AtlasSimilarity) -> Self {
        self.similarity = similarity;
        self
    }

    /// Add a metadata key to index as a filter field during bootstrap.
    pub fn with_filter_path(mut self, path: impl Into<String>) -> Self {
        self.filter_paths.push(path.into());
        self
    }

    pub fn with_initialize_schema(mut self, enabled: bool) -> Self {
        self.initialize_schema = enabled;
        self
    }
}

// ---------------------------------------------------------------------------
// MongoVectorStore
// ---------------------------------------------------------------------------

/// A [`VectorStore`] implementation backed by MongoDB Atlas Vector Search.
///
/// Documents are stored in a MongoDB collection with fields:
/// - `_id`: the document ID
/// - `content`: the document text
/// - `embedding`: the vector embedding (array of doubles)
/// - `metadata`: an embedded document with arbitrary metadata
///
/// Similarity search uses the `$vectorSearch` aggregation stage, which
/// requires an Atlas Vector Search index on the collection; with
/// `initialize_schema` enabled, [`initialize`](MongoVectorStore::initialize)
/// creates it.
pub struct MongoVectorStore {
    config: MongoVectorConfig,
    client: Client,
    collection: mongodb::Collection<BsonDocument>,
}

impl MongoVectorStore {
    /// Create a new store by connecting to MongoDB at the given URI.
    pub async fn from_uri(uri: &str, config: MongoVectorConfig) -> Result<Self, NeuriteError> {
        let client = Client::with_uri_str(uri).await.map_err(|e| {
            NeuriteError::VectorStore(format!("failed to connect to MongoDB: {e}"))
        })?;

        Ok(Self::from_client(client, config))
    }

    /// Create a new store from an existing MongoDB client.
    pub fn from_client(client: Client, config: MongoVectorConfig) -> Self {
        let db = client.database(&config.database);
        let collection = db.collection::<BsonDocument>(&config.collection);
        Self {
            config,
            client,
            collection,
        }
    }

    /// Create the collection and the Atlas Vector Search index.
    ///
    /// Does nothing unless `initialize_schema` is enabled in the config;
    /// bootstrap additionally requires `vector_dimensions` to be set.
    /// Idempotent: an existing collection or index of the same name is left
    /// in place.
    pub async fn initialize(&self) -> Result<(), NeuriteError> {
        if !self.config.initialize_schema {
            return Ok(());
        }
        let dimensions = self.config.vector_dimensions.ok_or_else(|| {
            NeuriteError::Config(
                "vector_dimensions must be set to initialize the search index".to_string(),
            )
        })?;

        let db = self.client.database(&self.config.database);

        if let Err(e) = db.create_collection(&self.config.collection).await {
            let already_exists =
                matches!(&*e.kind, ErrorKind::Command(CommandError { code: 48, .. }));
            if !already_exists {
                return Err(NeuriteError::VectorStore(format!(
                    "failed to create collection: {e}"
                )));
            }
        }

        let mut fields = vec![doc! {
            "type": "vector",
            "path": &self.config.vector_field,
            "numDimensions": dimensions as i64,
            "similarity": self.config.similarity.as_str(),
        }];
        for path in &self.config.filter_paths {
            fields.push(doc! {
                "type": "filter",
                "path": format!("{}.{}", self.config.metadata_field, path),
            });
        }

        let command = doc! {
            "createSearchIndexes": &self.config.collection,
            "indexes": [{
                "name": &self.config.index_name,
                "type": "vectorSearch",
                "definition": { "fields": fields },
            }],
        };

        if let Err(e) = db.run_command(command).await {
            // "IndexAlreadyExists" (68) keeps initialize idempotent.
            let already_exists =
                matches!(&*e.kind, ErrorKind::Command(CommandError { code: 68, .. }));
            if !already_exists {
                return Err(NeuriteError::VectorStore(format!(
                    "failed to create search index: {e}"
                )));
            }
        }

        debug!(
            collection = %self.config.collection,
            index = %self.config.index_name,
            "atlas vector search index initialized"
        );
        Ok(())
    }

    /// Return a reference to the underlying MongoDB client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &MongoVectorConfig {
        &self.config
    }

    /// Return a reference to the underlying MongoDB collection.
    pub fn collection(&self) -> &mongodb::Collection<BsonDocument> {
        &self.collection
    }

    /// Compute the number of candidates to use in `$vectorSearch`.
    fn num_candidates(&self, k: usize) -> i64 {
        self.config
            .num_candidates
            .unwrap_or_else(|| (k as i64) * 10)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), NeuriteError> {
        if let Some(expected) = self.config.vector_dimensions {
            if vector.len() != expected {
                return Err(NeuriteError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// VectorStore implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl VectorStore for MongoVectorStore {
    async fn add_documents(
        &self,
        docs: Vec<Document>,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<String>, NeuriteError> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = docs.iter().map(|d| d.content.as_str()).collect();
        let vectors = embeddings.embed_documents(&texts).await?;

        let mut ids = Vec::with_capacity(docs.len());
        let mut bson_docs = Vec::with_capacity(docs.len());

        for (doc, vector) in docs.into_iter().zip(vectors) {
            self.check_dimensions(&vector)?;

            let id = if doc.id.is_empty() {
                bson::oid::ObjectId::new().to_hex()
            } else {
                doc.id.clone()
            };

            let bson_vector: Vec<Bson> =
                vector.into_iter().map(|v| Bson::Double(v as f64)).collect();
            let metadata_bson = json_map_to_bson(&doc.metadata);

            let bson_doc = doc! {
                "_id": &id,
                &self.config.content_field: &doc.content,
                &self.config.vector_field: bson_vector,
                &self.config.metadata_field: metadata_bson,
            };

            ids.push(id);
            bson_docs.push(bson_doc);
        }

        let count = bson_docs.len();
        self.collection
            .insert_many(bson_docs)
            .await
            .map_err(|e| NeuriteError::VectorStore(format!("MongoDB insert failed: {e}")))?;
        debug!(count, "mongodb documents inserted");

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
        self.check_dimensions(embedding)?;

        let query_vector: Vec<Bson> = embedding.iter().map(|v| Bson::Double(*v as f64)).collect();

        let mut vector_search = doc! {
            "index": &self.config.index_name,
            "path": &self.config.vector_field,
            "queryVector": query_vector,
            "numCandidates": self.num_candidates(request.k),
            "limit": request.k as i64,
        };
        // Metadata filters are applied as a $vectorSearch pre-filter, so the
        // engine still returns up to k matching documents.
        if let Some(filter) = request.filter.to_mongo() {
            vector_search.insert("filter", json_to_bson(&filter));
        }

        let project_stage = doc! {
            "$project": {
                "_id": 1,
                &self.config.content_field: 1,
                &self.config.metadata_field: 1,
                "score": { "$meta": "vectorSearchScore" },
            }
        };

        let mut pipeline = vec![doc! { "$vectorSearch": vector_search }, project_stage];
        if let Some(threshold) = request.score_threshold {
            pipeline.push(doc! { "$match": { "score": { "$gte": threshold as f64 } } });
        }

        let mut cursor = self.collection.aggregate(pipeline).await.map_err(|e| {
            NeuriteError::VectorStore(format!("MongoDB aggregation failed: {e}"))
        })?;

        let mut results = Vec::new();

        while let Some(bson_doc) = cursor
            .try_next()
            .await
            .map_err(|e| NeuriteError::VectorStore(format!("MongoDB cursor error: {e}")))?
        {
            let id = bson_doc.get_str("_id").unwrap_or("").to_string();

            let content = bson_doc
                .get_str(&self.config.content_field)
                .unwrap_or("")
                .to_string();

            let score = bson_doc.get_f64("score").unwrap_or(0.0) as f32;

            let metadata = bson_doc
                .get_document(&self.config.metadata_field)
                .ok()
                .map(bson_doc_to_json_map)
                .unwrap_or_default();

            let doc = Document::with_metadata(id, content, metadata);
            results.push((doc, score));
        }

        Ok(results)
    }

    async fn delete(&self, ids: &[&str]) -> Result<(), NeuriteError> {
        if ids.is_empty() {
            return Ok(());
        }

        let id_values: Vec<Bson> = ids.iter().map(|id| Bson::String(id.to_string())).collect();

        self.collection
            .delete_many(doc! { "_id": { "$in": id_values } })
            .await
            .map_err(|e| NeuriteError::VectorStore(format!("MongoDB delete failed: {e}")))?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// Convert a JSON metadata map to a BSON document.
fn json_map_to_bson(map: &HashMap<String, Value>) -> BsonDocument {
    let mut doc = BsonDocument::new();
    for (k, v) in map {
        doc.insert(k.clone(), json_to_bson(v));
    }
    doc
}

/// Convert a `serde_json::Value` to a `bson::Bson` value.
fn json_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Bson::Int64(i)
            } else if let Some(f) = n.as_f64() {
                Bson::Double(f)
            } else {
                Bson::Null
            }
        }
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(arr) => Bson::Array(arr.iter().map(json_to_bson).collect()),
        Value::Object(map) => {
            let mut doc = BsonDocument::new();
            for (k, v) in map {
                doc.insert(k.clone(), json_to_bson(v));
            }
            Bson::Document(doc)
        }
    }
}

/// Convert a BSON document to a JSON metadata map.
fn bson_doc_to_json_map(doc: &BsonDocument) -> HashMap<String, Value> {
    let mut map = HashMap::new();
    for (k, v) in doc {
        map.insert(k.clone(), bson_to_json(v));
    }
    map
}

/// Convert a `bson::Bson` value to a `serde_json::Value`.
fn bson_to_json(bson: &Bson) -> Value {
    match bson {
        Bson::Null => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::Number((*i as i64).into()),
        Bson::Int64(i) => Value::Number((*i).into()),
        Bson::Double(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::String(s) => Value::String(s.clone()),
        Bson::Array(arr) => Value::Array(arr.iter().map(bson_to_json).collect()),
        Bson::Document(doc) => {
            let map: serde_json::Map<String, Value> = doc
                .iter()
                .map(|(k, v)| (k.clone(), bson_to_json(v)))
                .collect();
            Value::Object(map)
        }
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => Value::String(dt.to_string()),
        Bson::Binary(bin) => Value::String(format!("<binary {} bytes>", bin.bytes.len())),
        _ => Value::String(format!("{bson}")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
