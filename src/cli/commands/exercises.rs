//! Exercise listing command.

use crate::cli::Output;
use crate::config::Settings;
use crate::store::{Database, ExerciseFilter, ExerciseStore};
use anyhow::Result;

/// Run the exercises command.
#[allow(clippy::too_many_arguments)]
pub fn run_exercises(
    name: Option<String>,
    min_level: Option<i32>,
    max_level: Option<i32>,
    min_intensity: Option<i32>,
    max_intensity: Option<i32>,
    limit: usize,
    settings: Settings,
) -> Result<()> {
    let db = Database::open(&settings.sqlite_path())?;
    let store = ExerciseStore::new(db);

    let filter = ExerciseFilter {
        name_contains: name,
        min_fitness_level: min_level,
        max_fitness_level: max_level,
        min_intensity,
        max_intensity,
        created_after: None,
        created_before: None,
        limit: Some(limit),
    };

    let exercises = store.list(&filter)?;
    if exercises.is_empty() {
        Output::info("No exercises match.");
        return Ok(());
    }

    Output::success(&format!("{} exercise(s)", exercises.len()));
    for exercise in &exercises {
        println!();
        Output::exercise(
            &exercise.name,
            &exercise.id.to_string(),
            exercise.fitness_level,
            exercise.intensity,
            &exercise.clip_path,
        );
    }
    Ok(())
}
