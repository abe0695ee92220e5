//! Error types for Repcut.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure modes of the download capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadErrorKind {
    /// Platform or URL shape we cannot handle.
    Unsupported,
    /// The post no longer exists or is private.
    NotFound,
    /// Login/auth wall.
    Auth,
    /// Network-level failure.
    Network,
    /// The downloaded file is not decodable media.
    Decode,
}

impl std::fmt::Display for DownloadErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DownloadErrorKind::Unsupported => "unsupported",
            DownloadErrorKind::NotFound => "not_found",
            DownloadErrorKind::Auth => "auth",
            DownloadErrorKind::Network => "network",
            DownloadErrorKind::Decode => "decode",
        };
        write!(f, "{}", s)
    }
}

/// Failure modes of clip materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterializeErrorKind {
    ToolExitNonzero,
    ProbeFailed,
    DurationMismatch,
    Io,
}

impl std::fmt::Display for MaterializeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MaterializeErrorKind::ToolExitNonzero => "tool_exit_nonzero",
            MaterializeErrorKind::ProbeFailed => "probe_failed",
            MaterializeErrorKind::DurationMismatch => "duration_mismatch",
            MaterializeErrorKind::Io => "io",
        };
        write!(f, "{}", s)
    }
}

/// Coarse error taxonomy surfaced to callers in job results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InputInvalid,
    DownloadFailed,
    DecodeFailed,
    AnalyzeFailed,
    Duplicate,
    MaterializeFailed,
    PersistenceFailed,
    Cancelled,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InputInvalid => "input_invalid",
            ErrorKind::DownloadFailed => "download_failed",
            ErrorKind::DecodeFailed => "decode_failed",
            ErrorKind::AnalyzeFailed => "analyze_failed",
            ErrorKind::Duplicate => "duplicate",
            ErrorKind::MaterializeFailed => "materialize_failed",
            ErrorKind::PersistenceFailed => "persistence_failed",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

/// Library-level error type for Repcut operations.
#[derive(Error, Debug)]
pub enum RepcutError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    #[error("Download failed ({kind}): {message}")]
    Download {
        kind: DownloadErrorKind,
        message: String,
    },

    #[error("Media probe rejected file: {0}")]
    Decode(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Keyframe extraction failed: {0}")]
    Keyframes(String),

    #[error("Analysis failed: {0}")]
    Analyze(String),

    #[error("Clip materialization failed ({kind}): {message}")]
    Materialize {
        kind: MaterializeErrorKind,
        message: String,
    },

    #[error("Duplicate exercise: {0}")]
    Duplicate(String),

    #[error("Exercise store error: {0}")]
    ExerciseStore(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Job ledger error: {0}")]
    JobLedger(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Pipeline cancelled")]
    Cancelled,

    #[error("External call timed out after {0}s")]
    Timeout(u64),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl RepcutError {
    /// Map this error onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepcutError::InvalidInput(_) | RepcutError::UnsupportedUrl(_) => ErrorKind::InputInvalid,
            RepcutError::Download { .. } | RepcutError::ToolNotFound(_) => ErrorKind::DownloadFailed,
            RepcutError::Decode(_) => ErrorKind::DecodeFailed,
            RepcutError::Analyze(_) | RepcutError::Transcription(_) | RepcutError::Keyframes(_) => {
                ErrorKind::AnalyzeFailed
            }
            RepcutError::Duplicate(_) => ErrorKind::Duplicate,
            RepcutError::Materialize { .. } => ErrorKind::MaterializeFailed,
            RepcutError::ExerciseStore(_)
            | RepcutError::VectorStore(_)
            | RepcutError::JobLedger(_)
            | RepcutError::Database(_) => ErrorKind::PersistenceFailed,
            RepcutError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Internal,
        }
    }

    /// The `{kind, message}` envelope stored in failed job results.
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Error envelope exposed to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub kind: ErrorKind,
    pub message: String,
}

/// Result type alias for Repcut operations.
pub type Result<T> = std::result::Result<T, RepcutError>;
