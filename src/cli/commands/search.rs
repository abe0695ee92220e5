//! Story search command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::curation::Curator;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    story: &str,
    limit: usize,
    min_score: Option<f32>,
    mut settings: Settings,
) -> Result<()> {
    if let Some(score) = min_score {
        settings.search.score_threshold = score;
    }
    let curator = Curator::from_settings(&settings)?;

    let spinner = Output::spinner("Searching...");
    let results = curator.search_for_story(story, limit).await;
    spinner.finish_and_clear();

    match results {
        Ok(matches) => {
            if matches.is_empty() {
                Output::warning("No exercises matched that story.");
            } else {
                Output::success(&format!("Found {} exercise(s)", matches.len()));
                for m in &matches {
                    println!();
                    Output::exercise(
                        &format!("{} ({:.2})", m.exercise.name, m.score),
                        &m.exercise.id.to_string(),
                        m.exercise.fitness_level,
                        m.exercise.intensity,
                        &m.exercise.clip_path,
                    );
                }
            }
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            Err(anyhow::anyhow!("{}", e))
        }
    }
}
