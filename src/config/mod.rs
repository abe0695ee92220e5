//! Configuration module for Repcut.
//!
//! Handles loading and managing application settings.

mod settings;

pub use settings::{
    AiProvider, AiSettings, DatabaseSettings, EmbeddingSettings, GeneralSettings,
    KeyframeSettings, PipelineSettings, SearchSettings, Settings, TranscriptionSettings,
};
