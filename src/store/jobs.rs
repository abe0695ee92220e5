//! Background job ledger.

use super::Database;
use crate::error::{RepcutError, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Lifecycle state of a background job. Progression is strictly
/// pending → in_progress → (done | failed); no retreats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    InProgress,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::InProgress => "in_progress",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(JobState::Pending),
            "in_progress" => Ok(JobState::InProgress),
            "done" => Ok(JobState::Done),
            "failed" => Ok(JobState::Failed),
            _ => Err(RepcutError::JobLedger(format!("Unknown job state: {}", s))),
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A job row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub state: JobState,
    /// Structured result payload for terminal states.
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// SQLite-backed job ledger.
pub struct JobLedger {
    db: Arc<Database>,
}

impl JobLedger {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new pending job.
    #[instrument(skip(self))]
    pub fn create(&self, job_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.db.conn()?;
        let result = conn.execute(
            "INSERT INTO jobs (job_id, state, result, created_at, updated_at) \
             VALUES (?1, 'pending', NULL, ?2, ?2)",
            params![job_id, now],
        );

        match result {
            Ok(_) => {
                debug!("Created job {}", job_id);
                Ok(())
            }
            Err(e)
                if matches!(
                    e.sqlite_error_code(),
                    Some(rusqlite::ErrorCode::ConstraintViolation)
                ) =>
            {
                Err(RepcutError::JobLedger(format!("Job {} already exists", job_id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Transition pending → in_progress. Idempotent if already in progress.
    #[instrument(skip(self))]
    pub fn start(&self, job_id: &str) -> Result<()> {
        let record = self.require(job_id)?;
        match record.state {
            JobState::Pending => {
                let conn = self.db.conn()?;
                conn.execute(
                    "UPDATE jobs SET state = 'in_progress', updated_at = ?2 \
                     WHERE job_id = ?1 AND state = 'pending'",
                    params![job_id, Utc::now().to_rfc3339()],
                )?;
                Ok(())
            }
            JobState::InProgress => Ok(()),
            terminal => Err(RepcutError::JobLedger(format!(
                "Cannot start job {} in state {}",
                job_id, terminal
            ))),
        }
    }

    /// Terminal transition. Idempotent only when repeated with the same
    /// terminal state and payload.
    #[instrument(skip(self, result))]
    pub fn finish(&self, job_id: &str, state: JobState, result: serde_json::Value) -> Result<()> {
        if !state.is_terminal() {
            return Err(RepcutError::JobLedger(format!(
                "finish requires a terminal state, got {}",
                state
            )));
        }

        let record = self.require(job_id)?;
        match record.state {
            JobState::InProgress => {
                let conn = self.db.conn()?;
                conn.execute(
                    "UPDATE jobs SET state = ?2, result = ?3, updated_at = ?4 WHERE job_id = ?1",
                    params![
                        job_id,
                        state.as_str(),
                        serde_json::to_string(&result)?,
                        Utc::now().to_rfc3339(),
                    ],
                )?;
                debug!("Job {} finished as {}", job_id, state);
                Ok(())
            }
            current if current == state && record.result.as_ref() == Some(&result) => Ok(()),
            current => Err(RepcutError::JobLedger(format!(
                "Cannot finish job {} as {}: state is {}",
                job_id, state, current
            ))),
        }
    }

    pub fn get(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let conn = self.db.conn()?;
        let result = conn.query_row(
            "SELECT job_id, state, result, created_at, updated_at FROM jobs WHERE job_id = ?1",
            params![job_id],
            |row| {
                let state_str: String = row.get(1)?;
                let result_str: Option<String> = row.get(2)?;
                let created_str: String = row.get(3)?;
                let updated_str: String = row.get(4)?;
                Ok((row.get::<_, String>(0)?, state_str, result_str, created_str, updated_str))
            },
        );

        match result {
            Ok((job_id, state_str, result_str, created_str, updated_str)) => {
                Ok(Some(JobRecord {
                    job_id,
                    state: JobState::parse(&state_str)?,
                    result: result_str
                        .map(|s| serde_json::from_str(&s))
                        .transpose()?,
                    created_at: parse_time(&created_str),
                    updated_at: parse_time(&updated_str),
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn require(&self, job_id: &str) -> Result<JobRecord> {
        self.get(job_id)?
            .ok_or_else(|| RepcutError::JobLedger(format!("Unknown job {}", job_id)))
    }
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
