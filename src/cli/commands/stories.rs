//! Story generation command.

use crate::cli::Output;
use crate::config::Settings;
use crate::curation::Curator;
use anyhow::Result;

/// Run the stories command.
pub async fn run_stories(prompt: &str, count: usize, settings: Settings) -> Result<()> {
    let curator = Curator::from_settings(&settings)?;

    let spinner = Output::spinner("Generating stories...");
    let stories = curator.generate_stories(prompt, count).await;
    spinner.finish_and_clear();

    Output::success(&format!("{} stories for: {}", stories.len(), prompt));
    for story in &stories {
        Output::list_item(story);
    }
    Ok(())
}
