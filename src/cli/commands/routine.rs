//! Routine management commands.

use crate::cli::{Output, RoutineAction};
use crate::config::Settings;
use crate::curation::Curator;
use anyhow::Result;
use uuid::Uuid;

/// Run a routine subcommand.
pub async fn run_routine(action: &RoutineAction, settings: Settings) -> Result<()> {
    let curator = Curator::from_settings(&settings)?;

    match action {
        RoutineAction::Create {
            name,
            exercise_ids,
            description,
        } => {
            let ids = parse_ids(exercise_ids)?;
            let routine = curator.create_routine(name, description.as_deref(), &ids)?;
            Output::success(&format!("Created routine {} ({})", routine.name, routine.id));
        }

        RoutineAction::Show { id } => {
            let id = parse_id(id)?;
            let Some(routine) = curator.get_routine(id)? else {
                Output::error("No routine with that id");
                return Err(anyhow::anyhow!("routine not found"));
            };

            Output::header(&routine.name);
            if let Some(description) = &routine.description {
                Output::kv("description", description);
            }
            Output::kv("created", &routine.created_at.to_rfc3339());

            let exercises = curator.bulk_get_exercises(&routine.exercise_ids)?;
            let stale = routine.exercise_ids.len() - exercises.len();
            for exercise in &exercises {
                Output::exercise(
                    &exercise.name,
                    &exercise.id.to_string(),
                    exercise.fitness_level,
                    exercise.intensity,
                    &exercise.clip_path,
                );
            }
            if stale > 0 {
                Output::warning(&format!("{} exercise(s) no longer exist", stale));
            }
        }

        RoutineAction::List { limit, offset } => {
            let routines = curator.list_routines(*limit, *offset)?;
            if routines.is_empty() {
                Output::info("No routines yet.");
            } else {
                for routine in &routines {
                    Output::list_item(&format!(
                        "{} ({} exercises) - {}",
                        routine.name,
                        routine.exercise_ids.len(),
                        routine.id
                    ));
                }
            }
        }

        RoutineAction::Delete { id } => {
            let id = parse_id(id)?;
            if curator.delete_routine(id)? {
                Output::success("Routine deleted");
            } else {
                Output::warning("No routine with that id");
            }
        }
    }

    Ok(())
}

fn parse_id(input: &str) -> Result<Uuid> {
    Uuid::parse_str(input).map_err(|_| anyhow::anyhow!("'{}' is not a valid id", input))
}

fn parse_ids(inputs: &[String]) -> Result<Vec<Uuid>> {
    inputs.iter().map(|s| parse_id(s)).collect()
}
