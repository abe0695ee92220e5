//! Exercise metadata store.

use super::{escape_like, Database};
use crate::error::{RepcutError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Row};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Maximum length of an exercise (or routine) name.
pub(crate) const NAME_MAX: usize = 200;

/// One extracted movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub id: Uuid,
    /// Source URL exactly as submitted.
    pub url: String,
    /// Canonical URL; part of the uniqueness fingerprint.
    pub normalized_url: String,
    /// 1-based carousel position.
    pub carousel_index: u32,
    pub name: String,
    /// Clip location relative to the content root.
    pub clip_path: String,
    pub start_time: f64,
    pub end_time: f64,
    pub how_to: Option<String>,
    pub benefits: Option<String>,
    pub counteracts: Option<String>,
    pub fitness_level: Option<i32>,
    pub rounds_reps: Option<String>,
    pub intensity: Option<i32>,
    /// Set after the vector entry is written.
    pub vector_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Filter for exercise listings.
#[derive(Debug, Clone, Default)]
pub struct ExerciseFilter {
    /// Substring match on name; wildcards in the input are escaped.
    pub name_contains: Option<String>,
    pub min_fitness_level: Option<i32>,
    pub max_fitness_level: Option<i32>,
    pub min_intensity: Option<i32>,
    pub max_intensity: Option<i32>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// SQLite-backed exercise store.
pub struct ExerciseStore {
    db: Arc<Database>,
}

const COLUMNS: &str = "id, url, normalized_url, carousel_index, name, clip_path, \
    start_time, end_time, how_to, benefits, counteracts, fitness_level, \
    rounds_reps, intensity, vector_id, created_at";

impl ExerciseStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new exercise row.
    ///
    /// Returns [`RepcutError::Duplicate`] when another row already holds the
    /// same `(normalized_url, carousel_index, name)` fingerprint.
    #[instrument(skip(self, exercise), fields(name = %exercise.name))]
    pub fn insert(&self, exercise: &Exercise) -> Result<Uuid> {
        if exercise.name.is_empty() || exercise.name.chars().count() > NAME_MAX {
            return Err(RepcutError::InvalidInput(format!(
                "Exercise name must be 1..={} characters",
                NAME_MAX
            )));
        }

        let conn = self.db.conn()?;
        let result = conn.execute(
            &format!("INSERT INTO exercises ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"),
            params![
                exercise.id.to_string(),
                exercise.url,
                exercise.normalized_url,
                exercise.carousel_index,
                exercise.name,
                exercise.clip_path,
                exercise.start_time,
                exercise.end_time,
                exercise.how_to,
                exercise.benefits,
                exercise.counteracts,
                exercise.fitness_level,
                exercise.rounds_reps,
                exercise.intensity,
                exercise.vector_id.map(|v| v.to_string()),
                exercise.created_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => {
                debug!("Inserted exercise {}", exercise.id);
                Ok(exercise.id)
            }
            Err(e) if is_unique_violation(&e) => Err(RepcutError::Duplicate(format!(
                "({}, {}, {})",
                exercise.normalized_url, exercise.carousel_index, exercise.name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Exercise>> {
        let conn = self.db.conn()?;
        let result = conn.query_row(
            &format!("SELECT {COLUMNS} FROM exercises WHERE id = ?1"),
            params![id.to_string()],
            row_to_exercise,
        );

        match result {
            Ok(e) => Ok(Some(e)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch many exercises, preserving input order; unknown ids are skipped.
    pub fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Exercise>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(exercise) = self.get(*id)? {
                out.push(exercise);
            }
        }
        Ok(out)
    }

    /// List exercises matching a filter, newest first.
    #[instrument(skip(self, filter))]
    pub fn list(&self, filter: &ExerciseFilter) -> Result<Vec<Exercise>> {
        let mut sql = format!("SELECT {COLUMNS} FROM exercises WHERE 1=1");
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(name) = &filter.name_contains {
            sql.push_str(" AND name LIKE ? ESCAPE '\\'");
            args.push(Box::new(format!("%{}%", escape_like(name))));
        }
        if let Some(v) = filter.min_fitness_level {
            sql.push_str(" AND fitness_level >= ?");
            args.push(Box::new(v));
        }
        if let Some(v) = filter.max_fitness_level {
            sql.push_str(" AND fitness_level <= ?");
            args.push(Box::new(v));
        }
        if let Some(v) = filter.min_intensity {
            sql.push_str(" AND intensity >= ?");
            args.push(Box::new(v));
        }
        if let Some(v) = filter.max_intensity {
            sql.push_str(" AND intensity <= ?");
            args.push(Box::new(v));
        }
        if let Some(t) = filter.created_after {
            sql.push_str(" AND created_at >= ?");
            args.push(Box::new(t.to_rfc3339()));
        }
        if let Some(t) = filter.created_before {
            sql.push_str(" AND created_at <= ?");
            args.push(Box::new(t.to_rfc3339()));
        }

        sql.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            args.push(Box::new(limit as i64));
        }

        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(args.iter().map(|a| a.as_ref())),
            row_to_exercise,
        )?;

        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// All exercises ingested from one canonical URL, in carousel order.
    pub fn search_by_url(&self, normalized_url: &str) -> Result<Vec<Exercise>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM exercises WHERE normalized_url = ?1 \
             ORDER BY carousel_index, start_time"
        ))?;
        let rows = stmt.query_map(params![normalized_url], row_to_exercise)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Look up by the ingestion fingerprint.
    pub fn find_by_fingerprint(
        &self,
        normalized_url: &str,
        carousel_index: u32,
        name: &str,
    ) -> Result<Option<Exercise>> {
        let conn = self.db.conn()?;
        let result = conn.query_row(
            &format!(
                "SELECT {COLUMNS} FROM exercises \
                 WHERE normalized_url = ?1 AND carousel_index = ?2 AND name = ?3"
            ),
            params![normalized_url, carousel_index, name],
            row_to_exercise,
        );

        match result {
            Ok(e) => Ok(Some(e)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Record the vector entry backing an exercise.
    pub fn set_vector_id(&self, id: Uuid, vector_id: Uuid) -> Result<()> {
        let conn = self.db.conn()?;
        let updated = conn.execute(
            "UPDATE exercises SET vector_id = ?1 WHERE id = ?2",
            params![vector_id.to_string(), id.to_string()],
        )?;

        if updated == 0 {
            return Err(RepcutError::ExerciseStore(format!(
                "No exercise row for {}",
                id
            )));
        }
        Ok(())
    }

    /// Delete a row, returning it so the caller can drive cascade cleanup.
    #[instrument(skip(self))]
    pub fn delete(&self, id: Uuid) -> Result<Option<Exercise>> {
        let exercise = self.get(id)?;
        if exercise.is_some() {
            let conn = self.db.conn()?;
            conn.execute("DELETE FROM exercises WHERE id = ?1", params![id.to_string()])?;
            info!("Deleted exercise {}", id);
        }
        Ok(exercise)
    }

    /// Clip paths of every live row (reconciliation).
    pub fn list_clip_paths(&self) -> Result<Vec<String>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare("SELECT clip_path FROM exercises")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.db.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM exercises", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    )
}

fn row_to_exercise(row: &Row<'_>) -> rusqlite::Result<Exercise> {
    let id_str: String = row.get(0)?;
    let vector_id_str: Option<String> = row.get(14)?;
    let created_at_str: String = row.get(15)?;

    Ok(Exercise {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        url: row.get(1)?,
        normalized_url: row.get(2)?,
        carousel_index: row.get(3)?,
        name: row.get(4)?,
        clip_path: row.get(5)?,
        start_time: row.get(6)?,
        end_time: row.get(7)?,
        how_to: row.get(8)?,
        benefits: row.get(9)?,
        counteracts: row.get(10)?,
        fitness_level: row.get(11)?,
        rounds_reps: row.get(12)?,
        intensity: row.get(13)?,
        vector_id: vector_id_str.and_then(|s| Uuid::parse_str(&s).ok()),
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, url: &str, index: u32) -> Exercise {
        Exercise {
            id: Uuid::new_v4(),
            url: format!("{}?utm=x", url),
            normalized_url: url.to_string(),
            carousel_index: index,
            name: name.to_string(),
            clip_path: format!("clips/{}_abcd1234.mp4", name),
            start_time: 4.0,
            end_time: 18.5,
            how_to: Some("keep the core tight".into()),
            benefits: Some("upper body strength".into()),
            counteracts: None,
            fitness_level: Some(5),
            rounds_reps: Some("3x10".into()),
            intensity: Some(7),
            vector_id: None,
            created_at: Utc::now(),
        }
    }

    fn store() -> ExerciseStore {
        ExerciseStore::new(Database::in_memory().unwrap())
    }

    #[test]
    fn test_insert_and_get() {
        let store = store();
        let exercise = sample("push-up", "https://www.instagram.com/p/abc", 1);
        store.insert(&exercise).unwrap();

        let loaded = store.get(exercise.id).unwrap().unwrap();
        assert_eq!(loaded.name, "push-up");
        assert_eq!(loaded.end_time - loaded.start_time, 14.5);
        assert!(loaded.vector_id.is_none());
    }

    #[test]
    fn test_duplicate_fingerprint_rejected() {
        let store = store();
        let a = sample("push-up", "https://www.instagram.com/p/abc", 1);
        let mut b = sample("push-up", "https://www.instagram.com/p/abc", 1);
        b.id = Uuid::new_v4();

        store.insert(&a).unwrap();
        let err = store.insert(&b).unwrap_err();
        assert!(matches!(err, RepcutError::Duplicate(_)));
    }

    #[test]
    fn test_same_name_different_index_allowed() {
        let store = store();
        store.insert(&sample("push-up", "https://www.instagram.com/p/abc", 1)).unwrap();
        store.insert(&sample("push-up", "https://www.instagram.com/p/abc", 2)).unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_name_length_bound() {
        let store = store();
        let mut exercise = sample("x", "https://www.instagram.com/p/abc", 1);
        exercise.name = "a".repeat(201);
        assert!(store.insert(&exercise).is_err());
    }

    #[test]
    fn test_filter_by_levels() {
        let store = store();
        let mut easy = sample("stretch", "https://www.instagram.com/p/a", 1);
        easy.fitness_level = Some(2);
        easy.intensity = Some(1);
        let mut hard = sample("burpee", "https://www.instagram.com/p/b", 1);
        hard.fitness_level = Some(8);
        hard.intensity = Some(9);
        store.insert(&easy).unwrap();
        store.insert(&hard).unwrap();

        let filter = ExerciseFilter {
            min_fitness_level: Some(5),
            ..Default::default()
        };
        let found = store.list(&filter).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "burpee");
    }

    #[test]
    fn test_name_filter_escapes_wildcards() {
        let store = store();
        store.insert(&sample("leg_raise", "https://www.instagram.com/p/a", 1)).unwrap();
        store.insert(&sample("legXraise", "https://www.instagram.com/p/b", 1)).unwrap();

        // An underscore must match literally, not as a single-char wildcard.
        let filter = ExerciseFilter {
            name_contains: Some("leg_raise".into()),
            ..Default::default()
        };
        let found = store.list(&filter).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "leg_raise");
    }

    #[test]
    fn test_get_many_preserves_order_and_skips_unknown() {
        let store = store();
        let a = sample("a", "https://www.instagram.com/p/a", 1);
        let b = sample("b", "https://www.instagram.com/p/b", 1);
        store.insert(&a).unwrap();
        store.insert(&b).unwrap();

        let got = store.get_many(&[b.id, Uuid::new_v4(), a.id]).unwrap();
        let names: Vec<_> = got.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_delete_returns_row() {
        let store = store();
        let exercise = sample("push-up", "https://www.instagram.com/p/abc", 1);
        store.insert(&exercise).unwrap();

        let deleted = store.delete(exercise.id).unwrap().unwrap();
        assert_eq!(deleted.id, exercise.id);
        assert!(store.get(exercise.id).unwrap().is_none());
        assert!(store.delete(exercise.id).unwrap().is_none());
    }

    #[test]
    fn test_set_vector_id() {
        let store = store();
        let exercise = sample("push-up", "https://www.instagram.com/p/abc", 1);
        store.insert(&exercise).unwrap();

        let vector_id = Uuid::new_v4();
        store.set_vector_id(exercise.id, vector_id).unwrap();
        assert_eq!(store.get(exercise.id).unwrap().unwrap().vector_id, Some(vector_id));

        assert!(store.set_vector_id(Uuid::new_v4(), vector_id).is_err());
    }

    #[test]
    fn test_search_by_url_ordered_by_index() {
        let store = store();
        store.insert(&sample("b", "https://www.instagram.com/p/abc", 2)).unwrap();
        store.insert(&sample("a", "https://www.instagram.com/p/abc", 1)).unwrap();

        let found = store.search_by_url("https://www.instagram.com/p/abc").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].carousel_index, 1);
    }
}
