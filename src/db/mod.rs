//! Vector store seam plus two backends: a local SQLite + sqlite-vec database
//! and a Qdrant server reached over its REST API.
use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::{LazyLock, Once};
use thiserror::Error;
use tracing::info;

pub mod models;
pub mod points;
pub mod qdrant;
pub mod search;

use models::{ChunkPoint, ScoredChunk};

/// Errors raised by any vector store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("vector store request failed: {0}")]
    RequestFailed(String),

    #[error("vector store returned status {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("vector has {actual} dimensions, collection expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid collection name: {0:?}")]
    InvalidCollection(String),
}

/// Operations the indexer and the retriever need from a vector store.
///
/// Calls are sequential and blocking; implementations own their connection.
pub trait VectorStore {
    /// Create the collection if it does not exist yet.
    fn ensure_collection(&self) -> Result<(), StoreError>;

    /// Insert or replace one point.
    fn upsert(&self, point: &ChunkPoint) -> Result<(), StoreError>;

    /// Nearest neighbours of `vector`, best first, optionally restricted to one service.
    fn search(
        &self,
        vector: &[f32],
        limit: usize,
        service_filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, StoreError>;
}

static INIT_VEC: Once = Once::new();

/// Initialize the sqlite-vec extension. Safe to call multiple times.
fn init_sqlite_vec() {
    INIT_VEC.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

static COLLECTION_NAME: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// A SQLite connection holding one collection: a chunk table plus its `vec0` index.
pub struct Db {
    pub(crate) conn: Connection,
    pub(crate) table: String,
    pub(crate) vec_table: String,
    pub(crate) dimensions: usize,
}

impl Db {
    /// Open a database at the given path and create the collection if absent.
    pub fn open<P: AsRef<Path>>(
        path: P,
        collection: &str,
        dimensions: usize,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!("Initializing database: {}", path.display());

        init_sqlite_vec();
        let conn = Connection::open(path)?;
        Self::with_connection(conn, collection, dimensions)
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory(collection: &str, dimensions: usize) -> Result<Self, StoreError> {
        init_sqlite_vec();
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, collection, dimensions)
    }

    fn with_connection(
        conn: Connection,
        collection: &str,
        dimensions: usize,
    ) -> Result<Self, StoreError> {
        if !COLLECTION_NAME.is_match(collection) {
            return Err(StoreError::InvalidCollection(collection.to_string()));
        }

        let vec_version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        info!("sqlite-vec version: {}", vec_version);

        let db = Self {
            conn,
            table: collection.to_string(),
            vec_table: format!("vec_{collection}"),
            dimensions,
        };
        db.ensure_collection()?;
        Ok(db)
    }

    fn schema_sql(&self) -> String {
        format!(
            r#"
CREATE TABLE IF NOT EXISTS {table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    point_id TEXT NOT NULL UNIQUE,
    file_path TEXT NOT NULL,
    service_name TEXT NOT NULL,
    chunk_type TEXT NOT NULL,
    payload TEXT NOT NULL,
    indexed_at DATETIME NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_{table}_service ON {table}(service_name);
CREATE INDEX IF NOT EXISTS idx_{table}_file ON {table}(file_path);

CREATE VIRTUAL TABLE IF NOT EXISTS {vec_table} USING vec0(
    embedding FLOAT[{dims}]
);
"#,
            table = self.table,
            vec_table = self.vec_table,
            dims = self.dimensions,
        )
    }

    /// Number of stored chunks.
    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

impl VectorStore for Db {
    fn ensure_collection(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(&self.schema_sql())?;
        Ok(())
    }

    fn upsert(&self, point: &ChunkPoint) -> Result<(), StoreError> {
        self.upsert_point(point)
    }

    fn search(
        &self,
        vector: &[f32],
        limit: usize,
        service_filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        self.search_points(vector, limit, service_filter)
    }
}

/// Helper to serialize a float32 vector into bytes for vec0 virtual table
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}
