//! Reconciliation sweep command.

use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::Orchestrator;
use anyhow::Result;

/// Run the reconcile command.
pub async fn run_reconcile(apply: bool, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::from_settings(settings)?;

    let spinner = Output::spinner("Sweeping for orphans...");
    let report = orchestrator.reconcile(apply).await?;
    spinner.finish_and_clear();

    if report.is_clean() {
        Output::success("No orphans found; stores are consistent.");
        return Ok(());
    }

    if !report.orphan_clips.is_empty() {
        Output::header("Orphan clips");
        for clip in &report.orphan_clips {
            Output::list_item(clip);
        }
    }
    if !report.orphan_vectors.is_empty() {
        Output::header("Orphan vectors");
        for vector_id in &report.orphan_vectors {
            Output::list_item(&vector_id.to_string());
        }
    }

    if apply {
        Output::success("Orphans removed.");
    } else {
        Output::info("Run with --apply to remove them.");
    }
    Ok(())
}
