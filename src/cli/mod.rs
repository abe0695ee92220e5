//! CLI module for Repcut.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Repcut - fitness clip extraction and curation
///
/// Ingest short fitness videos from social platforms, extract per-exercise
/// clips with coaching metadata, and assemble them into routines through
/// semantic search.
#[derive(Parser, Debug)]
#[command(name = "repcut")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Repcut and write a default config file
    Init,

    /// Check system requirements and configuration
    Doctor,

    /// Ingest a video URL and extract exercise clips
    Ingest {
        /// Post URL (Instagram, TikTok, YouTube Shorts)
        url: String,

        /// Use a specific job id instead of a generated one
        #[arg(long)]
        job_id: Option<String>,

        /// Print the full result payload as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a background job's state and result
    Job {
        /// Job id
        job_id: String,
    },

    /// Search exercises matching a story
    Search {
        /// Natural-language exercise need, e.g. "shoulder mobility for desk workers"
        story: String,

        /// Maximum results
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Minimum similarity score
        #[arg(long)]
        min_score: Option<f32>,
    },

    /// Generate curation stories from a goal
    Stories {
        /// User goal, e.g. "I sit all day and my hips hurt"
        prompt: String,

        /// Number of stories
        #[arg(short, long, default_value = "5")]
        count: usize,
    },

    /// Manage workout routines
    Routine {
        #[command(subcommand)]
        action: RoutineAction,
    },

    /// List stored exercises with optional filters
    Exercises {
        /// Substring match on name
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        min_level: Option<i32>,

        #[arg(long)]
        max_level: Option<i32>,

        #[arg(long)]
        min_intensity: Option<i32>,

        #[arg(long)]
        max_intensity: Option<i32>,

        /// Maximum rows
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Cascade delete an exercise (row, vector and clip)
    Delete {
        /// Exercise id
        exercise_id: String,
    },

    /// Find (and optionally remove) orphaned clips and vectors
    Reconcile {
        /// Delete what the sweep finds instead of only reporting
        #[arg(long)]
        apply: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum RoutineAction {
    /// Create a routine from exercise ids
    Create {
        /// Routine name
        name: String,

        /// Ordered exercise ids (repeats allowed)
        #[arg(required = true)]
        exercise_ids: Vec<String>,

        /// Optional description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Show a routine with its resolved exercises
    Show {
        /// Routine id
        id: String,
    },

    /// List routines
    List {
        #[arg(short, long, default_value = "20")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Delete a routine
    Delete {
        /// Routine id
        id: String,
    },
}
