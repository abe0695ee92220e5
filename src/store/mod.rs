//! Relational storage for Repcut.
//!
//! One SQLite database holds exercises, routines and background jobs. The
//! stores share a connection guarded by a mutex; WAL mode plus a busy
//! timeout keeps concurrent pipelines from tripping over each other.

mod exercises;
mod jobs;
mod routines;

pub use exercises::{Exercise, ExerciseFilter, ExerciseStore};
pub use jobs::{JobLedger, JobRecord, JobState};
pub use routines::{Routine, RoutineStore};

use crate::error::{RepcutError, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// Shared handle to the SQLite database.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Arc<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=60000;")?;
        Self::init_schema(&conn)?;

        info!("Opened database at {:?}", path);
        Ok(Arc::new(Self { conn: Mutex::new(conn) }))
    }

    /// In-memory database (useful for testing).
    pub fn in_memory() -> Result<Arc<Self>> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Arc::new(Self { conn: Mutex::new(conn) }))
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS exercises (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                normalized_url TEXT NOT NULL,
                carousel_index INTEGER NOT NULL DEFAULT 1,
                name TEXT NOT NULL,
                clip_path TEXT NOT NULL,
                start_time REAL NOT NULL,
                end_time REAL NOT NULL,
                how_to TEXT,
                benefits TEXT,
                counteracts TEXT,
                fitness_level INTEGER,
                rounds_reps TEXT,
                intensity INTEGER,
                vector_id TEXT,
                created_at TEXT NOT NULL,
                UNIQUE (normalized_url, carousel_index, name)
            );

            CREATE INDEX IF NOT EXISTS idx_exercises_url ON exercises(url);
            CREATE INDEX IF NOT EXISTS idx_exercises_fitness_level ON exercises(fitness_level);
            CREATE INDEX IF NOT EXISTS idx_exercises_intensity ON exercises(intensity);
            CREATE INDEX IF NOT EXISTS idx_exercises_created_at ON exercises(created_at);

            CREATE TABLE IF NOT EXISTS workout_routines (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                exercise_ids TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS jobs (
                job_id TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                result TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepcutError::ExerciseStore(format!("Failed to acquire lock: {}", e)))
    }
}

/// Escape `%`, `_` and the escape character itself so user text cannot act
/// as LIKE wildcards.
pub(crate) fn escape_like(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c == '%' || c == '_' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("leg_raise"), "leg\\_raise");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("plain"), "plain");
    }
}
