use std::collections::HashMap;

use async_trait::async_trait;
use neurite_core::{Document, Embeddings, NeuriteError, SearchRequest, VectorStore};
use neurite_filter::{SqlBind, SqlFilter};
use pgvector::Vector;
use serde_json::Value;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Distance metric used for similarity search and index creation.
///
/// Scores returned by searches are normalized so that higher means more
/// similar, regardless of the metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    NegativeInnerProduct,
}

impl DistanceMetric {
    /// The pgvector distance operator for `ORDER BY`.
    fn operator(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "<=>",
            DistanceMetric::Euclidean => "<->",
            DistanceMetric::NegativeInnerProduct => "<#>",
        }
    }

    /// The pgvector operator class for index creation.
    fn index_ops(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "vector_cosine_ops",
            DistanceMetric::Euclidean => "vector_l2_ops",
            DistanceMetric::NegativeInnerProduct => "vector_ip_ops",
        }
    }

    /// SQL expression converting the distance to the query vector (`$1`) into
    /// a similarity score.
    fn score_expr(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "1 - (embedding <=> $1::vector)",
            DistanceMetric::Euclidean => "1 / (1 + (embedding <-> $1::vector))",
            DistanceMetric::NegativeInnerProduct => "-(embedding <#> $1::vector)",
        }
    }
}

/// Approximate index maintained by pgvector on the embedding column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PgIndexType {
    /// No index; every search is an exact scan.
    None,
    IvfFlat,
    #[default]
    Hnsw,
}

/// Configuration for a [`PgVectorStore`] table.
#[derive(Debug, Clone)]
pub struct PgVectorConfig {
    /// Schema containing the table (default `public`).
    pub schema_name: String,
    /// Name of the PostgreSQL table used to store documents and embeddings.
    pub table_name: String,
    /// Dimensionality of the embedding vectors (e.g. 1536 for OpenAI
    /// `text-embedding-ada-002`).
    pub vector_dimensions: u32,
    /// Distance metric for search and index creation (default cosine).
    pub distance: DistanceMetric,
    /// Index to create during schema initialization (default HNSW).
    pub index: PgIndexType,
    /// Maximum number of documents embedded and written per batch.
    pub batch_size: usize,
    /// When enabled, [`initialize`](PgVectorStore::initialize) creates the
    /// pgvector extension, the table, and the index. Never implicit.
    pub initialize_schema: bool,
    /// When enabled (and schema initialization is not), `initialize` verifies
    /// that the configured table exists instead of creating it.
    pub validate_schema: bool,
}

impl PgVectorConfig {
    /// Create a new configuration with defaults: schema `public`, cosine
    /// distance, HNSW index, batch size 100, no schema initialization.
    ///
    /// # Panics
    ///
    /// Panics if `table_name` is empty or `vector_dimensions` is zero.
    pub fn new(table_name: impl Into<String>, vector_dimensions: u32) -> Self {
        let table_name = table_name.into();
        assert!(!table_name.is_empty(), "table_name must not be empty");
        assert!(vector_dimensions > 0, "vector_dimensions must be > 0");
        Self {
            schema_name: "public".to_string(),
            table_name,
            vector_dimensions,
            distance: DistanceMetric::default(),
            index: PgIndexType::default(),
            batch_size: 100,
            initialize_schema: false,
            validate_schema: false,
        }
    }

    pub fn with_schema_name(mut self, schema_name: impl Into<String>) -> Self {
        self.schema_name = schema_name.into();
        self
    }

    pub fn with_distance(mut self, distance: DistanceMetric) -> Self {
        self.distance = distance;
        self
    }

    pub fn with_index(mut self, index: PgIndexType) -> Self {
        self.index = index;
        self
    }

    /// Set the batch size ceiling for `add_documents`.
    ///
    /// # Panics
    ///
    /// Panics if `batch_size` is zero.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be > 0");
        self.batch_size = batch_size;
        self
    }

    pub fn with_initialize_schema(mut self, enabled: bool) -> Self {
        self.initialize_schema = enabled;
        self
    }

    pub fn with_validate_schema(mut self, enabled: bool) -> Self {
        self.validate_schema = enabled;
        self
    }

    /// The schema-qualified table name, validated before interpolation.
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }

    fn validate_identifiers(&self) -> Result<(), NeuriteError> {
        validate_identifier("schema name", &self.schema_name)?;
        validate_identifier("table name", &self.table_name)
    }
}

/// Validate that an identifier is safe to interpolate into SQL. Only
/// alphanumeric ASCII characters and underscores are allowed.
fn validate_identifier(what: &str, name: &str) -> Result<(), NeuriteError> {
    if name.is_empty() {
        return Err(NeuriteError::SchemaValidation(format!(
            "{what} must not be empty"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(NeuriteError::SchemaValidation(format!(
            "invalid {what} '{name}': only alphanumeric and underscore characters are allowed"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// PgVectorStore
// ---------------------------------------------------------------------------

/// A [`VectorStore`] backed by PostgreSQL with the pgvector extension.
///
/// Documents are stored in a single table with columns:
/// - `id TEXT PRIMARY KEY`
/// - `content TEXT NOT NULL`
/// - `metadata JSONB NOT NULL DEFAULT '{}'`
/// - `embedding vector(<dimensions>)`
///
/// Construction never touches the database. Call
/// [`initialize`](PgVectorStore::initialize) once after construction; it
/// bootstraps the schema only when the configuration opts in.
pub struct PgVectorStore {
    pool: PgPool,
    config: PgVectorConfig,
}

impl PgVectorStore {
    /// Create a new store from an existing connection pool and config.
    pub fn new(pool: PgPool, config: PgVectorConfig) -> Self {
        Self { pool, config }
    }

    /// Prepare the store for use.
    ///
    /// With `initialize_schema` enabled this creates the pgvector extension,
    /// the backing table, and the configured index (all idempotent). With
    /// `validate_schema` enabled instead, it verifies the table exists and
    /// fails with [`NeuriteError::SchemaValidation`] otherwise. With neither
    /// flag set, only identifier safety is checked.
    pub async fn initialize(&self) -> Result<(), NeuriteError> {
        self.config.validate_identifiers()?;

        if self.config.initialize_schema {
            self.ensure_schema().await
        } else if self.config.validate_schema {
            self.check_table_exists().await
        } else {
            Ok(())
        }
    }

    async fn ensure_schema(&self) -> Result<(), NeuriteError> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                NeuriteError::VectorStore(format!("failed to create pgvector extension: {e}"))
            })?;

        let create_table = format!(
            r#"CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                metadata JSONB NOT NULL DEFAULT '{{}}',
                embedding vector({dims})
            )"#,
            table = self.config.qualified_table(),
            dims = self.config.vector_dimensions,
        );
        sqlx::query(&create_table)
            .execute(&self.pool)
            .await
            .map_err(|e| NeuriteError::VectorStore(format!("failed to create table: {e}")))?;

        if let Some(create_index) = self.create_index_sql() {
            sqlx::query(&create_index)
                .execute(&self.pool)
                .await
                .map_err(|e| NeuriteError::VectorStore(format!("failed to create index: {e}")))?;
        }

        debug!(
            table = %self.config.qualified_table(),
            index = ?self.config.index,
            "pgvector schema initialized"
        );
        Ok(())
    }

    fn create_index_sql(&self) -> Option<String> {
        let method = match self.config.index {
            PgIndexType::None => return None,
            PgIndexType::IvfFlat => "ivfflat",
            PgIndexType::Hnsw => "hnsw",
        };
        Some(format!(
            "CREATE INDEX IF NOT EXISTS {name}_embedding_idx ON {table} USING {method} (embedding {ops})",
            name = self.config.table_name,
            table = self.config.qualified_table(),
            ops = self.config.distance.index_ops(),
        ))
    }

    async fn check_table_exists(&self) -> Result<(), NeuriteError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables
             WHERE table_schema = $1 AND table_name = $2)",
        )
        .bind(&self.config.schema_name)
        .bind(&self.config.table_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| NeuriteError::VectorStore(format!("schema validation query failed: {e}")))?;

        if !exists {
            return Err(NeuriteError::SchemaValidation(format!(
                "table '{}' does not exist",
                self.config.qualified_table()
            )));
        }
        Ok(())
    }

    /// Return a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &PgVectorConfig {
        &self.config
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), NeuriteError> {
        let expected = self.config.vector_dimensions as usize;
        if vector.len() != expected {
            return Err(NeuriteError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Build the similarity query. `$1` is the query vector and `$2` the limit;
/// filter placeholders start at `$3`, and the optional score threshold takes
/// the next placeholder after them.
fn build_search_sql(
    config: &PgVectorConfig,
    filter: &SqlFilter,
    threshold_param: Option<usize>,
) -> String {
    let score = config.distance.score_expr();
    let mut sql = format!(
        "SELECT id, content, metadata, {score} AS score FROM {table} WHERE {clause}",
        table = config.qualified_table(),
        clause = filter.clause,
    );
    if let Some(param) = threshold_param {
        sql.push_str(&format!(" AND {score} >= ${param}"));
    }
    sql.push_str(&format!(
        " ORDER BY embedding {op} $1::vector LIMIT $2",
        op = config.distance.operator(),
    ));
    sql
}

// ---------------------------------------------------------------------------
// VectorStore implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn add_documents(
        &self,
        docs: Vec<Document>,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<String>, NeuriteError> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        self.config.validate_identifiers()?;

        // Assign UUIDs where the caller has not provided an id.
        let docs: Vec<Document> = docs
            .into_iter()
            .map(|mut d| {
                if d.id.is_empty() {
                    d.id = Uuid::new_v4().to_string();
                }
                d
            })
            .collect();

        let upsert_sql = format!(
            r#"INSERT INTO {table} (id, content, metadata, embedding)
               VALUES ($1, $2, $3, $4::vector)
               ON CONFLICT (id) DO UPDATE
               SET content = EXCLUDED.content,
                   metadata = EXCLUDED.metadata,
                   embedding = EXCLUDED.embedding"#,
            table = self.config.qualified_table(),
        );

        let mut ids = Vec::with_capacity(docs.len());
        for batch in docs.chunks(self.config.batch_size) {
            let texts: Vec<&str> = batch.iter().map(|d| d.content.as_str()).collect();
            let vectors = embeddings.embed_documents(&texts).await?;

            for (doc, vec) in batch.iter().zip(vectors) {
                self.check_dimensions(&vec)?;
                let embedding = Vector::from(vec);
                let metadata = serde_json::to_value(&doc.metadata).map_err(|e| {
                    NeuriteError::VectorStore(format!("failed to serialize metadata: {e}"))
                })?;

                sqlx::query(&upsert_sql)
                    .bind(&doc.id)
                    .bind(&doc.content)
                    .bind(&metadata)
                    .bind(&embedding)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| NeuriteError::VectorStore(format!("insert failed: {e}")))?;

                ids.push(doc.id.clone());
            }
            debug!(count = batch.len(), "pgvector batch written");
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
        self.config.validate_identifiers()?;
        self.check_dimensions(embedding)?;

        // $1 = query vector, $2 = limit, filter binds from $3.
        let filter_sql = request.filter.to_sql(3);
        let threshold_param = request
            .score_threshold
            .map(|_| 3 + filter_sql.binds.len());
        let sql = build_search_sql(&self.config, &filter_sql, threshold_param);

        let query_embedding = Vector::from(embedding.to_vec());
        let mut query = sqlx::query_as::<_, (String, String, Value, f64)>(&sql)
            .bind(&query_embedding)
            .bind(request.k as i64);
        for bind in &filter_sql.binds {
            query = match bind {
                SqlBind::Text(s) => query.bind(s.clone()),
                SqlBind::Int(i) => query.bind(*i),
                SqlBind::Float(f) => query.bind(*f),
                SqlBind::Bool(b) => query.bind(*b),
            };
        }
        if let Some(threshold) = request.score_threshold {
            query = query.bind(threshold as f64);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| NeuriteError::VectorStore(format!("similarity search failed: {e}")))?;

        let results = rows
            .into_iter()
            .map(|(id, content, metadata, score)| {
                let metadata: HashMap<String, Value> = match metadata {
                    Value::Object(map) => map.into_iter().collect(),
                    _ => HashMap::new(),
                };
                (Document { id, content, metadata }, score as f32)
            })
            .collect();

        Ok(results)
    }

    async fn delete(&self, ids: &[&str]) -> Result<(), NeuriteError> {
        if ids.is_empty() {
            return Ok(());
        }

        self.config.validate_identifiers()?;

        let sql = format!(
            "DELETE FROM {table} WHERE id = ANY($1)",
            table = self.config.qualified_table(),
        );

        let id_strings: Vec<String> = ids.iter().map(|s| s.to_string()).collect();

        sqlx::query(&sql)
            .bind(&id_strings)
            .execute(&self.pool)
            .await
            .map_err(|e| NeuriteError::VectorStore(format!("delete failed: {e}")))?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
