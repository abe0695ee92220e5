//! Repcut CLI entry point.

use anyhow::Result;
use clap::Parser;
use repcut::cli::{commands, Cli, Commands};
use repcut::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("repcut={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Ensure data directories exist
    std::fs::create_dir_all(settings.storage_dir())?;
    std::fs::create_dir_all(settings.temp_dir())?;

    // Execute command
    match &cli.command {
        Commands::Init => {
            commands::run_init(&settings)?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Ingest { url, job_id, json } => {
            commands::run_ingest(url, job_id.clone(), *json, settings).await?;
        }

        Commands::Job { job_id } => {
            commands::run_job(job_id, settings)?;
        }

        Commands::Search {
            story,
            limit,
            min_score,
        } => {
            commands::run_search(story, *limit, *min_score, settings).await?;
        }

        Commands::Stories { prompt, count } => {
            commands::run_stories(prompt, *count, settings).await?;
        }

        Commands::Routine { action } => {
            commands::run_routine(action, settings).await?;
        }

        Commands::Exercises {
            name,
            min_level,
            max_level,
            min_intensity,
            max_intensity,
            limit,
        } => {
            commands::run_exercises(
                name.clone(),
                *min_level,
                *max_level,
                *min_intensity,
                *max_intensity,
                *limit,
                settings,
            )?;
        }

        Commands::Delete { exercise_id } => {
            commands::run_delete(exercise_id, settings).await?;
        }

        Commands::Reconcile { apply } => {
            commands::run_reconcile(*apply, settings).await?;
        }
    }

    Ok(())
}
