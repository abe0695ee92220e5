//! User-curated workout routines.

use super::exercises::NAME_MAX;
use super::Database;
use crate::error::{RepcutError, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// An ordered, user-curated sequence of exercise ids.
///
/// There is no foreign-key constraint on `exercise_ids`; stale ids are
/// tolerated and filtered at read time by the curation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routine {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub exercise_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// SQLite-backed routine store.
pub struct RoutineStore {
    db: Arc<Database>,
}

impl RoutineStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a routine. The exercise sequence must be non-empty; duplicates
    /// are allowed.
    #[instrument(skip(self, description, exercise_ids), fields(name = %name))]
    pub fn create(
        &self,
        name: &str,
        description: Option<&str>,
        exercise_ids: &[Uuid],
    ) -> Result<Routine> {
        if name.is_empty() || name.chars().count() > NAME_MAX {
            return Err(RepcutError::InvalidInput(format!(
                "Routine name must be 1..={} characters",
                NAME_MAX
            )));
        }
        if exercise_ids.is_empty() {
            return Err(RepcutError::InvalidInput(
                "A routine needs at least one exercise".into(),
            ));
        }

        let now = Utc::now();
        let routine = Routine {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(|s| s.to_string()),
            exercise_ids: exercise_ids.to_vec(),
            created_at: now,
            updated_at: now,
        };

        let ids_json = serde_json::to_string(
            &routine.exercise_ids.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
        )?;

        let conn = self.db.conn()?;
        conn.execute(
            "INSERT INTO workout_routines (id, name, description, exercise_ids, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                routine.id.to_string(),
                routine.name,
                routine.description,
                ids_json,
                routine.created_at.to_rfc3339(),
                routine.updated_at.to_rfc3339(),
            ],
        )?;

        info!("Created routine {} ({})", routine.name, routine.id);
        Ok(routine)
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Routine>> {
        let conn = self.db.conn()?;
        let result = conn.query_row(
            "SELECT id, name, description, exercise_ids, created_at, updated_at \
             FROM workout_routines WHERE id = ?1",
            params![id.to_string()],
            row_to_routine,
        );

        match result {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List routines, newest first.
    pub fn list(&self, limit: usize, offset: usize) -> Result<Vec<Routine>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, exercise_ids, created_at, updated_at \
             FROM workout_routines ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], row_to_routine)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Delete a routine; returns whether a row was removed.
    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let conn = self.db.conn()?;
        let deleted = conn.execute(
            "DELETE FROM workout_routines WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(deleted > 0)
    }
}

fn row_to_routine(row: &rusqlite::Row<'_>) -> rusqlite::Result<Routine> {
    let id_str: String = row.get(0)?;
    let ids_json: String = row.get(3)?;
    let created_str: String = row.get(4)?;
    let updated_str: String = row.get(5)?;

    let exercise_ids: Vec<Uuid> = serde_json::from_str::<Vec<String>>(&ids_json)
        .unwrap_or_default()
        .iter()
        .filter_map(|s| Uuid::parse_str(s).ok())
        .collect();

    Ok(Routine {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        name: row.get(1)?,
        description: row.get(2)?,
        exercise_ids,
        created_at: DateTime::parse_from_rfc3339(&created_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        updated_at: DateTime::parse_from_rfc3339(&updated_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RoutineStore {
        RoutineStore::new(Database::in_memory().unwrap())
    }

    #[test]
    fn test_create_and_get() {
        let store = store();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        // Duplicates in the sequence are intentional (repeat an exercise).
        let routine = store.create("Morning flow", Some("wake up"), &[a, b, a]).unwrap();

        let loaded = store.get(routine.id).unwrap().unwrap();
        assert_eq!(loaded.exercise_ids, vec![a, b, a]);
        assert_eq!(loaded.description.as_deref(), Some("wake up"));
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let store = store();
        assert!(store.create("Empty", None, &[]).is_err());
    }

    #[test]
    fn test_name_bound() {
        let store = store();
        let long = "a".repeat(201);
        assert!(store.create(&long, None, &[Uuid::new_v4()]).is_err());
    }

    #[test]
    fn test_list_and_delete() {
        let store = store();
        let r1 = store.create("One", None, &[Uuid::new_v4()]).unwrap();
        store.create("Two", None, &[Uuid::new_v4()]).unwrap();

        assert_eq!(store.list(10, 0).unwrap().len(), 2);
        assert_eq!(store.list(1, 1).unwrap().len(), 1);

        assert!(store.delete(r1.id).unwrap());
        assert!(!store.delete(r1.id).unwrap());
        assert_eq!(store.list(10, 0).unwrap().len(), 1);
    }
}
