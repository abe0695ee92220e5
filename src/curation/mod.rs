//! Retrieval and curation for Repcut.
//!
//! Turns a user goal into short "stories", matches each story against the
//! vector collection with diversity caps, and manages user-curated routines
//! over the resulting exercise ids.

use crate::analyzer::{OpenAIAnalyzer, StoryCoach};
use crate::config::{AiProvider, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::store::{Database, Exercise, ExerciseStore, Routine, RoutineStore};
use crate::vector_store::{diverse_search, SqliteVectorStore, VectorStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Stories used when the coach is unavailable.
const FALLBACK_STORIES: &[&str] = &[
    "gentle full-body warm-up to start the day",
    "core strength for better posture",
    "hip and hamstring mobility after sitting",
    "upper-body push strength without equipment",
    "balance and stability work for beginners",
];

/// An exercise matched to a story, with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredExercise {
    pub exercise: Exercise,
    pub score: f32,
}

/// Retrieval and routine curation facade.
pub struct Curator {
    exercises: Arc<ExerciseStore>,
    routines: Arc<RoutineStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    coach: Arc<dyn StoryCoach>,
    score_threshold: f32,
    max_per_category: usize,
}

impl Curator {
    /// Build a curator with real components from settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.pipeline.request_timeout_seconds);
        let dimensions = settings.embedding.dimensions as usize;

        let db = Database::open(&settings.sqlite_path())?;
        let exercises = Arc::new(ExerciseStore::new(db.clone()));
        let routines = Arc::new(RoutineStore::new(db));
        let vectors: Arc<dyn VectorStore> =
            Arc::new(SqliteVectorStore::new(&settings.sqlite_path(), dimensions)?);

        let (embedder, coach): (Arc<dyn Embedder>, Arc<dyn StoryCoach>) = match settings.ai.provider
        {
            AiProvider::OpenAI => (
                Arc::new(OpenAIEmbedder::with_config(&settings.embedding.model, dimensions, timeout)),
                Arc::new(OpenAIAnalyzer::new(
                    &settings.ai.analyzer_model,
                    &settings.ai.story_model,
                    timeout,
                    settings.pipeline.max_retries,
                )),
            ),
        };

        Ok(Self::new(
            exercises,
            routines,
            vectors,
            embedder,
            coach,
            settings.search.score_threshold,
            settings.search.max_per_category,
        ))
    }

    pub fn new(
        exercises: Arc<ExerciseStore>,
        routines: Arc<RoutineStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        coach: Arc<dyn StoryCoach>,
        score_threshold: f32,
        max_per_category: usize,
    ) -> Self {
        Self {
            exercises,
            routines,
            vectors,
            embedder,
            coach,
            score_threshold,
            max_per_category,
        }
    }

    /// Generate `n` short stories from a user prompt. Falls back to a fixed
    /// list when the coach fails.
    #[instrument(skip(self))]
    pub async fn generate_stories(&self, user_prompt: &str, n: usize) -> Vec<String> {
        match self.coach.generate_stories(user_prompt, n).await {
            Ok(stories) if !stories.is_empty() => stories,
            Ok(_) => fallback_stories(n),
            Err(e) => {
                warn!("Story coach failed, using fallback stories: {}", e);
                fallback_stories(n)
            }
        }
    }

    /// Diversified search returning exercises with scores, orphan hits
    /// dropped.
    #[instrument(skip(self))]
    pub async fn search_for_story(&self, story: &str, k: usize) -> Result<Vec<ScoredExercise>> {
        let hits = diverse_search(
            self.vectors.as_ref(),
            self.embedder.as_ref(),
            story,
            k,
            self.score_threshold,
            self.max_per_category,
        )
        .await?;

        let mut matched = Vec::with_capacity(hits.len());
        for hit in hits {
            // Rejoin with the metadata store; hits whose database_id is
            // unknown are orphans and dropped.
            match self.exercises.get(hit.payload.database_id)? {
                Some(exercise) => matched.push(ScoredExercise {
                    exercise,
                    score: hit.score,
                }),
                None => {
                    warn!(
                        "Dropping orphan vector {} (database_id {})",
                        hit.vector_id, hit.payload.database_id
                    );
                }
            }
        }

        debug!("Story matched {} exercise(s)", matched.len());
        Ok(matched)
    }

    /// Like [`Curator::search_for_story`] but returns only ids, ordered by
    /// final score.
    pub async fn search_ids_for_story(&self, story: &str, k: usize) -> Result<Vec<Uuid>> {
        Ok(self
            .search_for_story(story, k)
            .await?
            .into_iter()
            .map(|s| s.exercise.id)
            .collect())
    }

    pub fn create_routine(
        &self,
        name: &str,
        description: Option<&str>,
        exercise_ids: &[Uuid],
    ) -> Result<Routine> {
        self.routines.create(name, description, exercise_ids)
    }

    pub fn get_routine(&self, id: Uuid) -> Result<Option<Routine>> {
        self.routines.get(id)
    }

    pub fn list_routines(&self, limit: usize, offset: usize) -> Result<Vec<Routine>> {
        self.routines.list(limit, offset)
    }

    pub fn delete_routine(&self, id: Uuid) -> Result<bool> {
        self.routines.delete(id)
    }

    /// Fetch exercises preserving input order; unknown (stale) ids are
    /// skipped.
    pub fn bulk_get_exercises(&self, ids: &[Uuid]) -> Result<Vec<Exercise>> {
        self.exercises.get_many(ids)
    }
}

fn fallback_stories(n: usize) -> Vec<String> {
    FALLBACK_STORIES
        .iter()
        .take(n.max(1))
        .map(|s| s.to_string())
        .collect()
}
