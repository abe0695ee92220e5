//! Job inspection command.

use crate::cli::Output;
use crate::config::Settings;
use crate::store::{Database, JobLedger};
use anyhow::Result;

/// Run the job command.
pub fn run_job(job_id: &str, settings: Settings) -> Result<()> {
    let db = Database::open(&settings.sqlite_path())?;
    let ledger = JobLedger::new(db);

    match ledger.get(job_id)? {
        Some(record) => {
            Output::header(&format!("Job {}", record.job_id));
            Output::kv("state", &record.state.to_string());
            Output::kv("created", &record.created_at.to_rfc3339());
            Output::kv("updated", &record.updated_at.to_rfc3339());
            if let Some(result) = &record.result {
                println!("{}", serde_json::to_string_pretty(result)?);
            }
            Ok(())
        }
        None => {
            Output::error(&format!("No job with id {}", job_id));
            Err(anyhow::anyhow!("job not found"))
        }
    }
}
