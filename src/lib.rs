//! Repcut - fitness clip extraction and semantic curation
//!
//! Repcut ingests short fitness videos from social platforms, extracts
//! well-segmented exercise clips annotated with coaching metadata, stores
//! them alongside dense vector embeddings, and answers natural-language
//! queries that assemble those clips into workout routines.
//!
//! # Overview
//!
//! One ingestion runs the full pipeline: download the post's media,
//! transcribe the audio, select change-significant keyframes, ask a
//! multimodal model for exercise segments, normalize them, cut bit-exact
//! clips, and persist everything transactionally across the metadata store
//! and the vector store.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `source` - URL canonicalization and platform classification
//! - `downloader` - Media download capability (yt-dlp)
//! - `transcription` - Speech-to-text capability (Whisper)
//! - `keyframes` - Cut detection and keyframe selection
//! - `analyzer` - Multimodal exercise detection capability
//! - `segments` - Candidate segment normalization
//! - `clips` - Clip materialization and verification
//! - `store` - Exercise, routine and job storage (SQLite)
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector database abstraction and diverse search
//! - `pipeline` - Ingestion orchestration and reconciliation
//! - `curation` - Story-driven retrieval and routines
//!
//! # Example
//!
//! ```rust,no_run
//! use repcut::config::Settings;
//! use repcut::pipeline::{CancelFlag, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::from_settings(settings)?;
//!
//!     let (job_id, result) = orchestrator
//!         .ingest("https://www.instagram.com/reel/AbC123/", None, CancelFlag::new())
//!         .await?;
//!     println!("Job {} created {} clip(s)", job_id, result.created().len());
//!
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod cli;
pub mod clips;
pub mod config;
pub mod curation;
pub mod downloader;
pub mod embedding;
pub mod error;
pub mod ffmpeg;
pub mod keyframes;
pub mod openai;
pub mod pipeline;
pub mod segments;
pub mod source;
pub mod store;
pub mod transcription;
pub mod vector_store;

pub use error::{RepcutError, Result};
