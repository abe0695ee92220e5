//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::Settings;
use console::style;
use std::process::Command;

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Repcut Doctor");
    println!();

    let mut failures = 0;

    println!("{}", style("External Tools").bold());
    for (tool, hint) in [
        ("yt-dlp", "pip install yt-dlp (or your package manager)"),
        ("ffmpeg", "https://ffmpeg.org/download.html"),
        ("ffprobe", "ships with ffmpeg"),
    ] {
        if tool_available(tool) {
            println!("  {} {}", style("✓").green(), style(tool).bold());
        } else {
            failures += 1;
            println!("  {} {} - not found", style("✗").red(), style(tool).bold());
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }

    println!("\n{}", style("Credentials").bold());
    if crate::openai::is_api_key_configured() {
        println!("  {} OPENAI_API_KEY", style("✓").green());
    } else {
        failures += 1;
        println!("  {} OPENAI_API_KEY - not set", style("✗").red());
        println!(
            "    {} {}",
            style("→").dim(),
            style("export OPENAI_API_KEY=sk-...").dim()
        );
    }
    if std::env::var("OPENAI_API_KEY_BACKUP").is_ok() {
        println!("  {} OPENAI_API_KEY_BACKUP (quota fallback)", style("✓").green());
    }

    println!("\n{}", style("Storage").bold());
    for (label, path) in [
        ("storage dir", settings.storage_dir()),
        ("temp dir", settings.temp_dir()),
    ] {
        match std::fs::create_dir_all(&path) {
            Ok(()) => println!("  {} {} ({})", style("✓").green(), label, path.display()),
            Err(e) => {
                failures += 1;
                println!("  {} {} ({}): {}", style("✗").red(), label, path.display(), e);
            }
        }
    }

    println!();
    if failures == 0 {
        Output::success("All checks passed.");
        Ok(())
    } else {
        Output::error(&format!("{} check(s) failed.", failures));
        Err(anyhow::anyhow!("doctor found problems"))
    }
}

fn tool_available(tool: &str) -> bool {
    Command::new(tool)
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .or_else(|_| {
            Command::new(tool)
                .arg("--version")
                .output()
                .map(|o| o.status.success())
        })
        .unwrap_or(false)
}
