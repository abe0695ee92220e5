//! Configuration settings for Repcut.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub pipeline: PipelineSettings,
    pub ai: AiSettings,
    pub transcription: TranscriptionSettings,
    pub embedding: EmbeddingSettings,
    pub keyframes: KeyframeSettings,
    pub search: SearchSettings,
    pub database: DatabaseSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Content root; clips live under `<storage_dir>/clips`.
    pub storage_dir: String,
    /// Directory for per-pipeline temporary trees.
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            storage_dir: "~/.repcut/storage".to_string(),
            temp_dir: "/tmp/repcut".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Pipeline execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Maximum number of ingestion pipelines running concurrently.
    pub max_concurrent_requests: usize,
    /// Timeout applied to each external call (seconds).
    pub request_timeout_seconds: u64,
    /// Bounded retry attempts for capability calls.
    pub max_retries: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 4,
            request_timeout_seconds: 120,
            max_retries: 3,
        }
    }
}

/// AI provider selector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    /// OpenAI-backed Analyzer and Embedder (default).
    #[default]
    OpenAI,
}

impl std::str::FromStr for AiProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(AiProvider::OpenAI),
            _ => Err(format!("Unknown AI provider: {}", s)),
        }
    }
}

impl std::fmt::Display for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiProvider::OpenAI => write!(f, "openai"),
        }
    }
}

/// Analyzer and story-coach settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    /// Provider for Analyzer/Embedder implementations.
    pub provider: AiProvider,
    /// Multimodal model for exercise detection.
    pub analyzer_model: String,
    /// Text model for story generation.
    pub story_model: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: AiProvider::OpenAI,
            analyzer_model: "gpt-4o".to_string(),
            story_model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Whisper model to use.
    pub model: String,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: "whisper-1".to_string(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Keyframe extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyframeSettings {
    /// Frames per second for dense sampling within a cut segment.
    pub dense_fps: u32,
    /// Floor on kept-frame rate across the whole video.
    pub min_fps: u32,
    /// Ceiling on kept-frame rate across the whole video.
    pub max_fps: u32,
    /// Sliding-window size (frame pairs) for the adaptive cut threshold.
    pub cut_window: usize,
    /// Standard deviations above the window mean that declare a cut.
    pub cut_sigma: f64,
}

impl Default for KeyframeSettings {
    fn default() -> Self {
        Self {
            dense_fps: 8,
            min_fps: 1,
            max_fps: 8,
            cut_window: 25,
            cut_sigma: 3.0,
        }
    }
}

/// Diverse-search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Minimum similarity score for a hit to be considered.
    pub score_threshold: f32,
    /// Maximum hits per movement family in a diversified result.
    pub max_per_category: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            score_threshold: 0.3,
            max_per_category: 2,
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Path to the SQLite database holding exercises, routines, jobs and vectors.
    pub sqlite_path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.repcut/repcut.db".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or the default location if None.
    ///
    /// Recognized environment variables override file values:
    /// `MAX_CONCURRENT_REQUESTS`, `REQUEST_TIMEOUT_SECONDS`,
    /// `AI_PROVIDER`.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Settings>(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env_overrides()?;
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) -> crate::error::Result<()> {
        if let Ok(v) = std::env::var("MAX_CONCURRENT_REQUESTS") {
            self.pipeline.max_concurrent_requests = v.parse().map_err(|_| {
                crate::error::RepcutError::Config(format!(
                    "MAX_CONCURRENT_REQUESTS is not a number: {}",
                    v
                ))
            })?;
        }
        if let Ok(v) = std::env::var("REQUEST_TIMEOUT_SECONDS") {
            self.pipeline.request_timeout_seconds = v.parse().map_err(|_| {
                crate::error::RepcutError::Config(format!(
                    "REQUEST_TIMEOUT_SECONDS is not a number: {}",
                    v
                ))
            })?;
        }
        if let Ok(v) = std::env::var("AI_PROVIDER") {
            self.ai.provider = v
                .parse()
                .map_err(crate::error::RepcutError::Config)?;
        }
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::RepcutError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("repcut")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Expanded content root.
    pub fn storage_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.storage_dir)
    }

    /// Directory clips are materialized into.
    pub fn clips_dir(&self) -> PathBuf {
        self.storage_dir().join("clips")
    }

    /// Expanded temp directory root.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.database.sqlite_path)
    }
}
