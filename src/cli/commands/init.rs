//! Init command - write a default config and create data directories.

use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the init command.
pub fn run_init(settings: &Settings) -> Result<()> {
    let config_path = Settings::default_config_path();

    if config_path.exists() {
        Output::info(&format!("Config already exists at {}", config_path.display()));
    } else {
        settings.save_to(&config_path)?;
        Output::success(&format!("Wrote default config to {}", config_path.display()));
    }

    std::fs::create_dir_all(settings.clips_dir())?;
    std::fs::create_dir_all(settings.temp_dir())?;
    Output::kv("storage", &settings.storage_dir().display().to_string());
    Output::kv("temp", &settings.temp_dir().display().to_string());
    Output::kv("database", &settings.sqlite_path().display().to_string());

    Output::info("Run `repcut doctor` to verify external tools.");
    Ok(())
}
