//! Ingest command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::{CancelFlag, ItemStatus, Orchestrator};
use anyhow::Result;

/// Run the ingest command.
pub async fn run_ingest(
    url: &str,
    job_id: Option<String>,
    json: bool,
    settings: Settings,
) -> Result<()> {
    let orchestrator = Orchestrator::from_settings(settings)?;

    let cancel = CancelFlag::new();
    let ctrlc_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            ctrlc_flag.cancel();
        }
    });

    let spinner = Output::spinner("Ingesting...");
    let outcome = orchestrator.ingest(url, job_id, cancel).await;
    spinner.finish_and_clear();

    match outcome {
        Ok((job_id, result)) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            Output::success(&format!("Job {} done", job_id));
            for item in &result.items {
                match item.status {
                    ItemStatus::Created => {
                        for created in &item.created {
                            Output::list_item(&format!(
                                "{} [{:.1}s - {:.1}s] -> {}",
                                created.name, created.start, created.end, created.clip_path
                            ));
                        }
                        if item.skipped > 0 {
                            Output::kv("skipped as duplicates", &item.skipped.to_string());
                        }
                    }
                    ItemStatus::Empty => {
                        Output::list_item(&format!("item {}: no exercise found", item.carousel_index));
                    }
                    ItemStatus::DuplicateSkipped => {
                        Output::list_item(&format!(
                            "item {}: already ingested ({} duplicate(s) skipped)",
                            item.carousel_index, item.skipped
                        ));
                    }
                    ItemStatus::Failed => {
                        let message = item
                            .error
                            .as_ref()
                            .map(|e| e.message.clone())
                            .unwrap_or_else(|| "unknown error".into());
                        Output::warning(&format!("item {}: {}", item.carousel_index, message));
                    }
                }
            }
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Ingest failed ({}): {}", e.kind(), e));
            Err(anyhow::anyhow!("{}", e))
        }
    }
}
