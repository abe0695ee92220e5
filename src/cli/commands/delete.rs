//! Cascade delete command.

use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::Orchestrator;
use anyhow::Result;
use uuid::Uuid;

/// Run the delete command.
pub async fn run_delete(exercise_id: &str, settings: Settings) -> Result<()> {
    let id = Uuid::parse_str(exercise_id)
        .map_err(|_| anyhow::anyhow!("'{}' is not a valid exercise id", exercise_id))?;

    let orchestrator = Orchestrator::from_settings(settings)?;
    match orchestrator.delete_exercise(id).await? {
        Some(exercise) => {
            Output::success(&format!("Deleted '{}' ({})", exercise.name, exercise.id));
            Ok(())
        }
        None => {
            Output::warning("No exercise with that id");
            Ok(())
        }
    }
}
