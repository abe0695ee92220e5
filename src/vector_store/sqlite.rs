//! SQLite-based vector store implementation.
//!
//! Embeddings are stored as little-endian f32 blobs; cosine similarity is
//! computed in Rust. Fine for the collection sizes a single coach library
//! reaches; swap in a dedicated vector database beyond that.

use super::{cosine_similarity, CollectionInfo, PayloadFilter, VectorHit, VectorPayload, VectorStore};
use crate::error::{RepcutError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// SQLite-backed vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    dimension: usize,
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS vectors (
        vector_id TEXT PRIMARY KEY,
        database_id TEXT NOT NULL,
        name TEXT NOT NULL,
        how_to TEXT,
        benefits TEXT,
        counteracts TEXT,
        fitness_level INTEGER,
        intensity INTEGER,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_vectors_database_id ON vectors(database_id);
"#;

impl SqliteVectorStore {
    /// Open (or create) the vector collection at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path, dimension: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=60000;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized vector store at {:?} (dimension {})", path, dimension);

        Ok(Self {
            conn: Mutex::new(conn),
            dimension,
        })
    }

    /// In-memory collection (useful for testing).
    pub fn in_memory(dimension: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            dimension,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepcutError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Uuid, Vec<u8>, VectorPayload)> {
    let vector_id_str: String = row.get(0)?;
    let database_id_str: String = row.get(1)?;
    let embedding_bytes: Vec<u8> = row.get(8)?;

    Ok((
        Uuid::parse_str(&vector_id_str).unwrap_or_default(),
        embedding_bytes,
        VectorPayload {
            database_id: Uuid::parse_str(&database_id_str).unwrap_or_default(),
            name: row.get(2)?,
            how_to: row.get(3)?,
            benefits: row.get(4)?,
            counteracts: row.get(5)?,
            fitness_level: row.get(6)?,
            intensity: row.get(7)?,
        },
    ))
}

const COLUMNS: &str = "vector_id, database_id, name, how_to, benefits, counteracts, \
    fitness_level, intensity, embedding";

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, vector, payload))]
    async fn upsert(&self, vector_id: Uuid, vector: &[f32], payload: &VectorPayload) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RepcutError::VectorStore(format!(
                "Vector dimension {} does not match collection dimension {}",
                vector.len(),
                self.dimension
            )));
        }

        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO vectors ({COLUMNS}, indexed_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                vector_id.to_string(),
                payload.database_id.to_string(),
                payload.name,
                payload.how_to,
                payload.benefits,
                payload.counteracts,
                payload.fitness_level,
                payload.intensity,
                Self::embedding_to_bytes(vector),
                Utc::now().to_rfc3339(),
            ],
        )?;

        debug!("Upserted vector {}", vector_id);
        Ok(())
    }

    #[instrument(skip(self, query_vector, filter))]
    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        score_threshold: Option<f32>,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<VectorHit>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM vectors"))?;

        let min_score = score_threshold.unwrap_or(f32::MIN);
        let entries = stmt.query_map([], row_to_entry)?;

        let mut hits: Vec<VectorHit> = entries
            .filter_map(|e| e.ok())
            .filter(|(_, _, payload)| filter.map_or(true, |f| f.matches(payload)))
            .map(|(vector_id, bytes, payload)| VectorHit {
                vector_id,
                score: cosine_similarity(query_vector, &Self::bytes_to_embedding(&bytes)),
                payload,
            })
            .filter(|h| h.score >= min_score)
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);

        debug!("Found {} matching vectors", hits.len());
        Ok(hits)
    }

    async fn get(&self, vector_id: Uuid) -> Result<Option<VectorHit>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            &format!("SELECT {COLUMNS} FROM vectors WHERE vector_id = ?1"),
            params![vector_id.to_string()],
            row_to_entry,
        );

        match result {
            Ok((vector_id, _, payload)) => Ok(Some(VectorHit {
                vector_id,
                score: 1.0,
                payload,
            })),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, vector_id: Uuid) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM vectors WHERE vector_id = ?1",
            params![vector_id.to_string()],
        )?;
        Ok(deleted > 0)
    }

    async fn list_refs(&self) -> Result<Vec<(Uuid, Uuid)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT vector_id, database_id FROM vectors")?;
        let rows = stmt.query_map([], |row| {
            let v: String = row.get(0)?;
            let d: String = row.get(1)?;
            Ok((
                Uuid::parse_str(&v).unwrap_or_default(),
                Uuid::parse_str(&d).unwrap_or_default(),
            ))
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    async fn info(&self) -> Result<CollectionInfo> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM vectors", [], |row| row.get(0))?;
        Ok(CollectionInfo {
            count: count as usize,
            dimension: self.dimension,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::payload;
    use super::*;

    #[tokio::test]
    async fn test_sqlite_vector_store_round_trip() {
        let store = SqliteVectorStore::in_memory(3).unwrap();
        let vector_id = Uuid::new_v4();
        let database_id = Uuid::new_v4();

        store
            .upsert(vector_id, &[1.0, 0.0, 0.0], &payload(database_id, "push-up", Some("slow and controlled")))
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0, 0.0], 10, None, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.0).abs() < 0.001);
        assert_eq!(results[0].payload.database_id, database_id);
        assert_eq!(results[0].payload.how_to.as_deref(), Some("slow and controlled"));

        let info = store.info().await.unwrap();
        assert_eq!(info.count, 1);
        assert_eq!(info.dimension, 3);

        assert!(store.delete(vector_id).await.unwrap());
        assert_eq!(store.info().await.unwrap().count, 0);
        assert!(store.get(vector_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let store = SqliteVectorStore::in_memory(3).unwrap();
        let err = store
            .upsert(Uuid::new_v4(), &[1.0, 0.0], &payload(Uuid::new_v4(), "x", None))
            .await
            .unwrap_err();
        assert!(matches!(err, RepcutError::VectorStore(_)));
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let store = SqliteVectorStore::in_memory(2).unwrap();
        let vector_id = Uuid::new_v4();
        let db_id = Uuid::new_v4();

        store.upsert(vector_id, &[1.0, 0.0], &payload(db_id, "old", None)).await.unwrap();
        store.upsert(vector_id, &[0.0, 1.0], &payload(db_id, "new", None)).await.unwrap();

        let hit = store.get(vector_id).await.unwrap().unwrap();
        assert_eq!(hit.payload.name, "new");
        assert_eq!(store.info().await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_list_refs() {
        let store = SqliteVectorStore::in_memory(2).unwrap();
        let v1 = Uuid::new_v4();
        let d1 = Uuid::new_v4();
        store.upsert(v1, &[1.0, 0.0], &payload(d1, "a", None)).await.unwrap();

        let refs = store.list_refs().await.unwrap();
        assert_eq!(refs, vec![(v1, d1)]);
    }
}
