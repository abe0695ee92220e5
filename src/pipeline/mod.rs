//! Pipeline orchestration for Repcut.
//!
//! Drives one ingestion end to end: canonicalize, download, transcribe,
//! extract keyframes, analyze, normalize, materialize clips and persist
//! across the metadata and vector stores. The orchestrator is the only
//! component allowed to mutate both stores in concert.

mod result;

pub use result::{CreatedExercise, IngestResult, ItemResult, ItemStatus, ReconcileReport};

use crate::analyzer::{keyword_fallback, AnalysisContext, Analyzer, OpenAIAnalyzer};
use crate::clips::{self, Clipper, FfmpegClipper};
use crate::config::{AiProvider, Settings};
use crate::downloader::{Downloader, PostMetadata, YtDlpDownloader};
use crate::embedding::{exercise_embedding_text, Embedder, OpenAIEmbedder};
use crate::error::{RepcutError, Result};
use crate::keyframes::{FfmpegFrameExtractor, FrameExtractor};
use crate::segments::{self, Segment};
use crate::source::{SourceUrl, UrlClass};
use crate::store::{Database, Exercise, ExerciseStore, JobLedger, JobState};
use crate::transcription::{Transcriber, Transcript, WhisperTranscriber};
use crate::vector_store::{SqliteVectorStore, VectorPayload, VectorStore};
use chrono::Utc;
use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_retry2::{strategy::jitter, strategy::ExponentialBackoff, Retry, RetryError};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Cooperative cancellation handle. The orchestrator checks it between
/// stages and before persistence steps.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(RepcutError::Cancelled)
        } else {
            Ok(())
        }
    }
}

enum PersistOutcome {
    Created(CreatedExercise),
    Skipped,
}

/// The ingestion pipeline orchestrator.
pub struct Orchestrator {
    settings: Settings,
    downloader: Arc<dyn Downloader>,
    transcriber: Arc<dyn Transcriber>,
    frames: Arc<dyn FrameExtractor>,
    analyzer: Arc<dyn Analyzer>,
    clipper: Arc<dyn Clipper>,
    embedder: Arc<dyn Embedder>,
    exercises: Arc<ExerciseStore>,
    vectors: Arc<dyn VectorStore>,
    jobs: Arc<JobLedger>,
    semaphore: Arc<Semaphore>,
}

impl Orchestrator {
    /// Build an orchestrator with real components from settings.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.pipeline.request_timeout_seconds);
        let dimensions = settings.embedding.dimensions as usize;

        let db = Database::open(&settings.sqlite_path())?;
        let exercises = Arc::new(ExerciseStore::new(db.clone()));
        let jobs = Arc::new(JobLedger::new(db));
        let vectors: Arc<dyn VectorStore> =
            Arc::new(SqliteVectorStore::new(&settings.sqlite_path(), dimensions)?);

        let (transcriber, analyzer, embedder): (
            Arc<dyn Transcriber>,
            Arc<dyn Analyzer>,
            Arc<dyn Embedder>,
        ) = match settings.ai.provider {
            AiProvider::OpenAI => (
                Arc::new(WhisperTranscriber::with_model(&settings.transcription.model, timeout)),
                Arc::new(OpenAIAnalyzer::new(
                    &settings.ai.analyzer_model,
                    &settings.ai.story_model,
                    timeout,
                    settings.pipeline.max_retries,
                )),
                Arc::new(OpenAIEmbedder::with_config(&settings.embedding.model, dimensions, timeout)),
            ),
        };

        let semaphore = Arc::new(Semaphore::new(settings.pipeline.max_concurrent_requests.max(1)));
        let frames = Arc::new(FfmpegFrameExtractor::new(settings.keyframes.clone()));

        Ok(Self {
            settings,
            downloader: Arc::new(YtDlpDownloader::new()),
            transcriber,
            frames,
            analyzer,
            clipper: Arc::new(FfmpegClipper::new()),
            embedder,
            exercises,
            vectors,
            jobs,
            semaphore,
        })
    }

    /// Build an orchestrator with injected components.
    #[allow(clippy::too_many_arguments)]
    pub fn with_components(
        settings: Settings,
        downloader: Arc<dyn Downloader>,
        transcriber: Arc<dyn Transcriber>,
        frames: Arc<dyn FrameExtractor>,
        analyzer: Arc<dyn Analyzer>,
        clipper: Arc<dyn Clipper>,
        embedder: Arc<dyn Embedder>,
        exercises: Arc<ExerciseStore>,
        vectors: Arc<dyn VectorStore>,
        jobs: Arc<JobLedger>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(settings.pipeline.max_concurrent_requests.max(1)));
        Self {
            settings,
            downloader,
            transcriber,
            frames,
            analyzer,
            clipper,
            embedder,
            exercises,
            vectors,
            jobs,
            semaphore,
        }
    }

    pub fn exercises(&self) -> Arc<ExerciseStore> {
        self.exercises.clone()
    }

    pub fn jobs(&self) -> Arc<JobLedger> {
        self.jobs.clone()
    }

    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.vectors.clone()
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run one ingestion under a fresh or caller-supplied job id.
    ///
    /// The job is created at admission, started once a concurrency permit is
    /// held, and always driven to a terminal state. The pipeline's temp tree
    /// is removed on exit, success or failure.
    #[instrument(skip(self, cancel), fields(url = %url))]
    pub async fn ingest(
        &self,
        url: &str,
        job_id: Option<String>,
        cancel: CancelFlag,
    ) -> Result<(String, IngestResult)> {
        let job_id = job_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        self.jobs.create(&job_id)?;

        let _permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| RepcutError::InvalidInput(format!("Pipeline pool closed: {}", e)))?;

        self.jobs.start(&job_id)?;
        info!("Job {} started", job_id);

        let work_dir = self.settings.temp_dir().join(format!("pipeline_{}", job_id));
        let outcome = self.run_pipeline(url, &work_dir, &cancel).await;
        tokio::fs::remove_dir_all(&work_dir).await.ok();

        match outcome {
            Ok(result) => {
                self.jobs
                    .finish(&job_id, JobState::Done, serde_json::to_value(&result)?)?;
                info!("Job {} done ({} created)", job_id, result.created().len());
                Ok((job_id, result))
            }
            Err(e) => {
                warn!("Job {} failed: {}", job_id, e);
                self.jobs
                    .finish(&job_id, JobState::Failed, serde_json::to_value(e.envelope())?)?;
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        url: &str,
        work_dir: &Path,
        cancel: &CancelFlag,
    ) -> Result<IngestResult> {
        let source = SourceUrl::parse(url)?;
        if source.class == UrlClass::Unsupported {
            return Err(RepcutError::UnsupportedUrl(url.to_string()));
        }
        cancel.check()?;

        let download_dir = work_dir.join("download");
        let downloaded = self
            .with_retry(|| self.timed(self.downloader.download(&source, &download_dir)))
            .await?;

        let total = downloaded.media_files.len() as u32;
        let mut items: Vec<ItemResult> = Vec::with_capacity(downloaded.media_files.len());
        let mut errors: Vec<RepcutError> = Vec::new();

        // Carousel items run sequentially in deterministic order; one item's
        // failure is captured without aborting its siblings.
        for (offset, media) in downloaded.media_files.iter().enumerate() {
            cancel.check()?;

            let carousel_index = if total == 1 {
                source.index_hint.unwrap_or(1)
            } else {
                offset as u32 + 1
            };

            let item_dir = work_dir.join(format!("item_{:02}", carousel_index));
            let outcome = self
                .process_item(
                    media,
                    carousel_index,
                    total,
                    &downloaded.metadata,
                    &source,
                    &item_dir,
                    cancel,
                )
                .await;

            match outcome {
                Ok((created, skipped)) => {
                    items.push(ItemResult::classify(carousel_index, created, skipped, None));
                }
                Err(RepcutError::Cancelled) => return Err(RepcutError::Cancelled),
                Err(e) => {
                    warn!("Carousel item {} failed: {}", carousel_index, e);
                    items.push(ItemResult::classify(carousel_index, vec![], 0, Some(e.envelope())));
                    errors.push(e);
                }
            }
        }

        let result = IngestResult {
            url: source.raw.clone(),
            normalized_url: source.normalized.clone(),
            items,
        };

        if result.all_items_failed() {
            return Err(errors.remove(0));
        }
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(carousel_index = carousel_index))]
    async fn process_item(
        &self,
        media: &Path,
        carousel_index: u32,
        carousel_total: u32,
        metadata: &PostMetadata,
        source: &SourceUrl,
        item_dir: &Path,
        cancel: &CancelFlag,
    ) -> Result<(Vec<CreatedExercise>, usize)> {
        tokio::fs::create_dir_all(item_dir).await?;

        // Transcription degrades gracefully to an empty transcript.
        let transcript = match self
            .with_retry(|| self.timed(self.transcriber.transcribe(media)))
            .await
        {
            Ok(t) => t,
            Err(e) => {
                warn!("Transcription failed, continuing without transcript: {}", e);
                Transcript::empty()
            }
        };
        cancel.check()?;

        let (frames, duration) = self.timed(self.frames.extract(media, item_dir)).await?;
        cancel.check()?;

        // Music-only captions must not drive detection.
        let usable = transcript.is_usable();
        if !transcript.is_empty() && !usable {
            debug!("Transcript failed the quality gate, omitting from analysis");
        }

        let context = AnalysisContext {
            platform: source.platform,
            carousel_index,
            carousel_total,
            first_item_may_be_hook: carousel_total > 1,
            description: metadata.description.clone(),
            tags: metadata.tags.clone(),
            duration,
        };

        let candidates = match self
            .timed(self.analyzer.analyze(&frames, usable.then_some(&transcript), &context))
            .await
        {
            Ok(c) => c,
            Err(e) if usable => {
                warn!("Analyzer failed, falling back to transcript keywords: {}", e);
                keyword_fallback(&transcript)
            }
            Err(e) => return Err(e),
        };

        let segments = segments::normalize(&candidates, duration);
        debug!("{} candidate(s) normalized to {} segment(s)", candidates.len(), segments.len());

        let mut created = Vec::new();
        let mut skipped = 0usize;

        for segment in &segments {
            cancel.check()?;
            match self.persist_segment(source, carousel_index, media, segment).await? {
                PersistOutcome::Created(c) => created.push(c),
                PersistOutcome::Skipped => skipped += 1,
            }
        }

        Ok((created, skipped))
    }

    /// The per-exercise persistence transaction:
    /// clip file → metadata row → vector entry → vector_id backfill,
    /// with rollback of earlier steps when a later one fails.
    async fn persist_segment(
        &self,
        source: &SourceUrl,
        carousel_index: u32,
        media: &Path,
        segment: &Segment,
    ) -> Result<PersistOutcome> {
        // Idempotency: an exercise already ingested under this fingerprint
        // is skipped silently.
        if self
            .exercises
            .find_by_fingerprint(&source.normalized, carousel_index, &segment.name)?
            .is_some()
        {
            debug!("Fingerprint already present, skipping '{}'", segment.name);
            return Ok(PersistOutcome::Skipped);
        }

        let file_name = clips::clip_file_name(&segment.name, &source.normalized, segment.start);
        let clip_path = format!("clips/{}", file_name);
        let target = self.settings.clips_dir().join(&file_name);

        // Step 1: materialize the clip.
        self.timed(self.clipper.materialize(media, segment.start, segment.end, &target))
            .await?;

        // Step 2: insert the metadata row, vector_id not yet set.
        let exercise = Exercise {
            id: Uuid::new_v4(),
            url: source.raw.clone(),
            normalized_url: source.normalized.clone(),
            carousel_index,
            name: segment.name.clone(),
            clip_path: clip_path.clone(),
            start_time: segment.start,
            end_time: segment.end,
            how_to: segment.how_to.clone(),
            benefits: segment.benefits.clone(),
            counteracts: segment.counteracts.clone(),
            fitness_level: segment.fitness_level,
            rounds_reps: segment.rounds_reps.clone(),
            intensity: segment.intensity,
            vector_id: None,
            created_at: Utc::now(),
        };

        if let Err(e) = self.exercises.insert(&exercise) {
            tokio::fs::remove_file(&target).await.ok();
            return match e {
                // A concurrent ingestion won the race; our clip is rolled
                // back and the exercise counts as a duplicate skip.
                RepcutError::Duplicate(fp) => {
                    debug!("Lost insert race on {}", fp);
                    Ok(PersistOutcome::Skipped)
                }
                other => Err(other),
            };
        }

        // Step 3: embed and upsert the vector entry.
        let vector_id = Uuid::new_v4();
        let text = exercise_embedding_text(
            &segment.name,
            segment.how_to.as_deref(),
            segment.benefits.as_deref(),
            segment.counteracts.as_deref(),
        );
        let payload = VectorPayload {
            database_id: exercise.id,
            name: segment.name.clone(),
            how_to: segment.how_to.clone(),
            benefits: segment.benefits.clone(),
            counteracts: segment.counteracts.clone(),
            fitness_level: segment.fitness_level,
            intensity: segment.intensity,
        };

        let step3 = async {
            let vector = self.with_retry(|| self.timed(self.embedder.embed(&text))).await?;
            self.vectors.upsert(vector_id, &vector, &payload).await
        };

        if let Err(e) = step3.await {
            self.exercises.delete(exercise.id).ok();
            tokio::fs::remove_file(&target).await.ok();
            return Err(e);
        }

        // Step 4: backfill the vector id onto the row.
        if let Err(e) = self.exercises.set_vector_id(exercise.id, vector_id) {
            self.vectors.delete(vector_id).await.ok();
            self.exercises.delete(exercise.id).ok();
            tokio::fs::remove_file(&target).await.ok();
            return Err(e);
        }

        info!("Persisted exercise '{}' ({})", segment.name, exercise.id);
        Ok(PersistOutcome::Created(CreatedExercise {
            id: exercise.id,
            name: exercise.name,
            clip_path,
            start: segment.start,
            end: segment.end,
        }))
    }

    /// Cascade delete: vector entry and clip file best-effort, then the row.
    /// The row is the source of truth; deletion is acknowledged only once it
    /// is gone. Leftovers are found by [`Orchestrator::reconcile`].
    #[instrument(skip(self))]
    pub async fn delete_exercise(&self, id: Uuid) -> Result<Option<Exercise>> {
        let Some(row) = self.exercises.get(id)? else {
            return Ok(None);
        };

        if let Some(vector_id) = row.vector_id {
            if let Err(e) = self.vectors.delete(vector_id).await {
                warn!("Vector delete for {} failed, sweep will catch it: {}", vector_id, e);
            }
        }

        let clip = self.settings.storage_dir().join(&row.clip_path);
        if let Err(e) = tokio::fs::remove_file(&clip).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Clip delete for {} failed, sweep will catch it: {}", clip.display(), e);
            }
        }

        self.exercises.delete(id)
    }

    /// Reconciliation sweep: find clip files no live row references and
    /// vector entries whose `database_id` does not resolve. With `apply`,
    /// delete what was found.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, apply: bool) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        let referenced: HashSet<String> = self.exercises.list_clip_paths()?.into_iter().collect();
        let clips_dir = self.settings.clips_dir();
        if clips_dir.exists() {
            for entry in std::fs::read_dir(&clips_dir)?.flatten() {
                let Some(name) = entry.file_name().to_str().map(|s| s.to_string()) else {
                    continue;
                };
                let rel = format!("clips/{}", name);
                if !referenced.contains(&rel) {
                    if apply {
                        tokio::fs::remove_file(entry.path()).await.ok();
                    }
                    report.orphan_clips.push(rel);
                }
            }
        }

        for (vector_id, database_id) in self.vectors.list_refs().await? {
            if self.exercises.get(database_id)?.is_none() {
                if apply {
                    self.vectors.delete(vector_id).await.ok();
                }
                report.orphan_vectors.push(vector_id);
            }
        }

        if !report.is_clean() {
            info!(
                "Reconcile found {} orphan clip(s), {} orphan vector(s){}",
                report.orphan_clips.len(),
                report.orphan_vectors.len(),
                if apply { " (removed)" } else { "" },
            );
        }
        Ok(report)
    }

    /// Apply the per-call timeout to an external operation.
    async fn timed<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let secs = self.settings.pipeline.request_timeout_seconds;
        match tokio::time::timeout(Duration::from_secs(secs), fut).await {
            Ok(r) => r,
            Err(_) => Err(RepcutError::Timeout(secs)),
        }
    }

    /// Bounded exponential backoff for external capability calls. Only
    /// transient failures are retried.
    async fn with_retry<T, Fut, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let strategy = ExponentialBackoff::from_millis(500)
            .factor(2)
            .max_delay(Duration::from_secs(8))
            .map(jitter)
            .take(self.settings.pipeline.max_retries.saturating_sub(1));

        Retry::spawn(strategy, || {
            let fut = op();
            async move {
                match fut.await {
                    Ok(v) => Ok(v),
                    Err(e) if is_transient(&e) => {
                        warn!("Transient failure, may retry: {}", e);
                        Err(RetryError::Transient { err: e, retry_after: None })
                    }
                    Err(e) => Err(RetryError::Permanent(e)),
                }
            }
        })
        .await
    }
}

fn is_transient(e: &RepcutError) -> bool {
    matches!(
        e,
        RepcutError::Timeout(_)
            | RepcutError::Http(_)
            | RepcutError::OpenAI(_)
            | RepcutError::Download {
                kind: crate::error::DownloadErrorKind::Network,
                ..
            }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::RawCandidate;
    use crate::downloader::DownloadedMedia;
    use crate::error::{ErrorKind, MaterializeErrorKind};
    use crate::keyframes::Keyframe;
    use crate::store::ExerciseFilter;
    use crate::transcription::TranscriptSegment;
    use crate::vector_store::MemoryVectorStore;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct StubDownloader {
        item_count: usize,
    }

    #[async_trait]
    impl Downloader for StubDownloader {
        async fn download(&self, _url: &SourceUrl, work_dir: &Path) -> Result<DownloadedMedia> {
            tokio::fs::create_dir_all(work_dir).await?;
            let mut media_files = Vec::new();
            for i in 1..=self.item_count {
                let path = work_dir.join(format!("item_{:02}.mp4", i));
                tokio::fs::write(&path, b"fake media").await?;
                media_files.push(path);
            }
            Ok(DownloadedMedia {
                media_files,
                metadata: PostMetadata {
                    description: Some("daily mobility".into()),
                    ..Default::default()
                },
                temp_dir: work_dir.to_path_buf(),
            })
        }
    }

    struct StubTranscriber {
        transcript: Transcript,
    }

    #[async_trait]
    impl Transcriber for StubTranscriber {
        async fn transcribe(&self, _media_path: &Path) -> Result<Transcript> {
            Ok(self.transcript.clone())
        }
    }

    struct StubFrames {
        duration: f64,
    }

    #[async_trait]
    impl FrameExtractor for StubFrames {
        async fn extract(&self, _media: &Path, _work_dir: &Path) -> Result<(Vec<Keyframe>, f64)> {
            let frames = (0..22)
                .map(|i| Keyframe {
                    path: PathBuf::from(format!("/nonexistent/frame_{i}.jpg")),
                    cut_index: 0,
                    frame_number: i as u64,
                    timestamp: i as f64,
                    score: 1.0,
                })
                .collect();
            Ok((frames, self.duration))
        }
    }

    /// Returns one scripted response per item, in order.
    struct StubAnalyzer {
        responses: Mutex<Vec<Result<Vec<RawCandidate>>>>,
    }

    impl StubAnalyzer {
        fn scripted(responses: Vec<Result<Vec<RawCandidate>>>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl Analyzer for StubAnalyzer {
        async fn analyze(
            &self,
            _frames: &[Keyframe],
            _transcript: Option<&Transcript>,
            _context: &AnalysisContext,
        ) -> Result<Vec<RawCandidate>> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Ok(Vec::new());
            }
            responses.remove(0)
        }
    }

    struct StubClipper {
        fail: bool,
    }

    #[async_trait]
    impl Clipper for StubClipper {
        async fn materialize(
            &self,
            _source: &Path,
            start: f64,
            end: f64,
            target_path: &Path,
        ) -> Result<()> {
            if self.fail {
                return Err(RepcutError::Materialize {
                    kind: MaterializeErrorKind::ToolExitNonzero,
                    message: "ffmpeg exited with status 1".into(),
                });
            }
            if let Some(parent) = target_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(target_path, format!("clip {start}-{end}")).await?;
            Ok(())
        }
    }

    struct StubEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            if self.fail {
                return Err(RepcutError::Embedding("embedding backend down".into()));
            }
            Ok(vec![1.0, 0.0, 0.0])
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }
        fn dimensions(&self) -> usize {
            3
        }
    }

    /// Vector store whose upserts always fail (step 3 rollback testing).
    struct FailingVectorStore;

    #[async_trait]
    impl VectorStore for FailingVectorStore {
        async fn upsert(&self, _: Uuid, _: &[f32], _: &VectorPayload) -> Result<()> {
            Err(RepcutError::VectorStore("collection unavailable".into()))
        }
        async fn search(
            &self,
            _: &[f32],
            _: usize,
            _: Option<f32>,
            _: Option<&crate::vector_store::PayloadFilter>,
        ) -> Result<Vec<crate::vector_store::VectorHit>> {
            Ok(Vec::new())
        }
        async fn get(&self, _: Uuid) -> Result<Option<crate::vector_store::VectorHit>> {
            Ok(None)
        }
        async fn delete(&self, _: Uuid) -> Result<bool> {
            Ok(false)
        }
        async fn list_refs(&self) -> Result<Vec<(Uuid, Uuid)>> {
            Ok(Vec::new())
        }
        async fn info(&self) -> Result<crate::vector_store::CollectionInfo> {
            Ok(crate::vector_store::CollectionInfo { count: 0, dimension: 3 })
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        _tmp: tempfile::TempDir,
    }

    fn push_up_candidate() -> RawCandidate {
        let mut c = RawCandidate::timed("push-up", 4.0, 18.5, 0.82);
        c.fitness_level = Some(5);
        c.intensity = Some(7);
        c.how_to = Some("lower slowly, elbows tucked".into());
        c
    }

    fn speech() -> Transcript {
        Transcript::new(vec![
            TranscriptSegment::new(0.0, 5.0, "today we train the chest".into()),
            TranscriptSegment::new(5.0, 10.0, "start in a strong plank".into()),
            TranscriptSegment::new(10.0, 16.0, "lower into the push-up slowly".into()),
            TranscriptSegment::new(16.0, 20.0, "press back to the top".into()),
            TranscriptSegment::new(20.0, 25.0, "keep the elbows tucked in".into()),
            TranscriptSegment::new(25.0, 30.0, "repeat for three sets".into()),
        ])
    }

    fn harness(
        item_count: usize,
        analyzer: StubAnalyzer,
        clipper_fails: bool,
        embedder_fails: bool,
        vectors: Arc<dyn VectorStore>,
        transcript: Transcript,
    ) -> Harness {
        let tmp = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.general.storage_dir = tmp.path().join("storage").to_string_lossy().into_owned();
        settings.general.temp_dir = tmp.path().join("tmp").to_string_lossy().into_owned();

        let db = Database::in_memory().unwrap();
        let exercises = Arc::new(ExerciseStore::new(db.clone()));
        let jobs = Arc::new(JobLedger::new(db));

        let orchestrator = Orchestrator::with_components(
            settings,
            Arc::new(StubDownloader { item_count }),
            Arc::new(StubTranscriber { transcript }),
            Arc::new(StubFrames { duration: 30.0 }),
            Arc::new(analyzer),
            Arc::new(StubClipper { fail: clipper_fails }),
            Arc::new(StubEmbedder { fail: embedder_fails }),
            exercises,
            vectors,
            jobs,
        );

        Harness { orchestrator, _tmp: tmp }
    }

    const URL: &str = "https://www.instagram.com/reel/AbC123/?igsh=tracking";

    #[tokio::test]
    async fn test_single_video_happy_path() {
        let vectors = Arc::new(MemoryVectorStore::new());
        let h = harness(
            1,
            StubAnalyzer::scripted(vec![Ok(vec![push_up_candidate()])]),
            false,
            false,
            vectors.clone(),
            speech(),
        );

        let (job_id, result) = h
            .orchestrator
            .ingest(URL, None, CancelFlag::new())
            .await
            .unwrap();

        // One exercise; the lone 4.0-18.5 candidate covers under 80% of the
        // 30 s video, so it is extended to the full duration.
        let created = result.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].start, 0.0);
        assert_eq!(created[0].end, 30.0);

        // Row persisted with vector_id set.
        let store = h.orchestrator.exercises();
        let row = store.get(created[0].id).unwrap().unwrap();
        assert_eq!(row.name, "push-up");
        assert_eq!(row.normalized_url, "https://www.instagram.com/reel/AbC123");
        let vector_id = row.vector_id.expect("vector_id backfilled");

        // Vector entry points back at the row.
        let hit = vectors.get(vector_id).await.unwrap().unwrap();
        assert_eq!(hit.payload.database_id, row.id);

        // Clip file exists under the content root.
        let clip = h.orchestrator.settings().storage_dir().join(&row.clip_path);
        assert!(clip.exists());
        assert!(std::fs::metadata(&clip).unwrap().len() > 0);

        // Job is terminal-done with the result payload.
        let job = h.orchestrator.jobs().get(&job_id).unwrap().unwrap();
        assert_eq!(job.state, JobState::Done);
        assert!(job.result.is_some());

        // Temp tree is gone.
        assert!(!h.orchestrator.settings().temp_dir().join(format!("pipeline_{}", job_id)).exists());
    }

    #[tokio::test]
    async fn test_carousel_with_hook_first_item() {
        let vectors = Arc::new(MemoryVectorStore::new());
        let h = harness(
            3,
            StubAnalyzer::scripted(vec![
                Ok(vec![]), // hook
                Ok(vec![RawCandidate::timed("squat", 2.0, 14.0, 0.9)]),
                Ok(vec![RawCandidate::timed("lunge", 1.0, 12.0, 0.9)]),
            ]),
            false,
            false,
            vectors,
            speech(),
        );

        let (_, result) = h
            .orchestrator
            .ingest(URL, None, CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(result.items.len(), 3);
        assert_eq!(result.items[0].status, ItemStatus::Empty);
        assert_eq!(result.created().len(), 2);

        let store = h.orchestrator.exercises();
        let all = store.list(&ExerciseFilter::default()).unwrap();
        let mut indexes: Vec<u32> = all.iter().map(|e| e.carousel_index).collect();
        indexes.sort();
        assert_eq!(indexes, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_duplicate_reingest_is_idempotent_skip() {
        let vectors = Arc::new(MemoryVectorStore::new());
        let h = harness(
            1,
            StubAnalyzer::scripted(vec![
                Ok(vec![push_up_candidate()]),
                Ok(vec![push_up_candidate()]),
            ]),
            false,
            false,
            vectors.clone(),
            speech(),
        );

        let (_, first) = h.orchestrator.ingest(URL, None, CancelFlag::new()).await.unwrap();
        assert_eq!(first.created().len(), 1);

        let (_, second) = h.orchestrator.ingest(URL, None, CancelFlag::new()).await.unwrap();
        assert_eq!(second.created().len(), 0);
        assert_eq!(second.items[0].status, ItemStatus::DuplicateSkipped);
        assert_eq!(second.items[0].skipped, 1);

        // No second row, vector or clip.
        assert_eq!(h.orchestrator.exercises().count().unwrap(), 1);
        assert_eq!(vectors.info().await.unwrap().count, 1);
        let clips: Vec<_> = std::fs::read_dir(h.orchestrator.settings().clips_dir())
            .unwrap()
            .collect();
        assert_eq!(clips.len(), 1);
    }

    #[tokio::test]
    async fn test_analyzer_failure_uses_transcript_fallback() {
        // The only exercise keyword is "push-up", spanning 10.0-16.0.
        let transcript = Transcript::new(vec![
            TranscriptSegment::new(0.0, 5.0, "today we move through the warm up".into()),
            TranscriptSegment::new(5.0, 10.0, "breathe in and get ready to go".into()),
            TranscriptSegment::new(10.0, 16.0, "lower into the push-up slowly and back up".into()),
            TranscriptSegment::new(16.0, 20.0, "great work keep breathing".into()),
        ]);

        let vectors = Arc::new(MemoryVectorStore::new());
        let h = harness(
            1,
            StubAnalyzer::scripted(vec![Err(RepcutError::Analyze("model returned prose".into()))]),
            false,
            false,
            vectors,
            transcript,
        );

        let (_, result) = h.orchestrator.ingest(URL, None, CancelFlag::new()).await.unwrap();

        let created = result.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, "push-up");
    }

    #[tokio::test]
    async fn test_analyzer_failure_without_transcript_fails_item() {
        let vectors = Arc::new(MemoryVectorStore::new());
        let h = harness(
            1,
            StubAnalyzer::scripted(vec![Err(RepcutError::Analyze("model returned prose".into()))]),
            false,
            false,
            vectors,
            Transcript::empty(),
        );

        let err = h.orchestrator.ingest(URL, None, CancelFlag::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AnalyzeFailed);
    }

    #[tokio::test]
    async fn test_materializer_failure_leaves_nothing() {
        let vectors = Arc::new(MemoryVectorStore::new());
        let h = harness(
            1,
            StubAnalyzer::scripted(vec![Ok(vec![push_up_candidate()])]),
            true,
            false,
            vectors.clone(),
            speech(),
        );

        let err = h.orchestrator.ingest(URL, Some("job-s5".into()), CancelFlag::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MaterializeFailed);

        assert_eq!(h.orchestrator.exercises().count().unwrap(), 0);
        assert_eq!(vectors.info().await.unwrap().count, 0);
        let clips_dir = h.orchestrator.settings().clips_dir();
        assert!(!clips_dir.exists() || std::fs::read_dir(clips_dir).unwrap().count() == 0);

        let job = h.orchestrator.jobs().get("job-s5").unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        let payload = job.result.unwrap();
        assert_eq!(payload["kind"], "materialize_failed");
    }

    #[tokio::test]
    async fn test_vector_upsert_failure_rolls_back_row_and_clip() {
        let h = harness(
            1,
            StubAnalyzer::scripted(vec![Ok(vec![push_up_candidate()])]),
            false,
            false,
            Arc::new(FailingVectorStore),
            speech(),
        );

        let err = h.orchestrator.ingest(URL, None, CancelFlag::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PersistenceFailed);

        assert_eq!(h.orchestrator.exercises().count().unwrap(), 0);
        let clips_dir = h.orchestrator.settings().clips_dir();
        assert!(!clips_dir.exists() || std::fs::read_dir(clips_dir).unwrap().count() == 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_rolls_back_row_and_clip() {
        let vectors = Arc::new(MemoryVectorStore::new());
        let h = harness(
            1,
            StubAnalyzer::scripted(vec![Ok(vec![push_up_candidate()])]),
            false,
            true,
            vectors.clone(),
            speech(),
        );

        let err = h.orchestrator.ingest(URL, None, CancelFlag::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);

        assert_eq!(h.orchestrator.exercises().count().unwrap(), 0);
        assert_eq!(vectors.info().await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_cancellation_before_work() {
        let vectors = Arc::new(MemoryVectorStore::new());
        let h = harness(
            1,
            StubAnalyzer::scripted(vec![Ok(vec![push_up_candidate()])]),
            false,
            false,
            vectors,
            speech(),
        );

        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = h.orchestrator.ingest(URL, Some("job-c".into()), cancel).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        let job = h.orchestrator.jobs().get("job-c").unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(h.orchestrator.exercises().count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cascade_delete_removes_row_vector_and_clip() {
        let vectors = Arc::new(MemoryVectorStore::new());
        let h = harness(
            1,
            StubAnalyzer::scripted(vec![Ok(vec![push_up_candidate()])]),
            false,
            false,
            vectors.clone(),
            speech(),
        );

        let (_, result) = h.orchestrator.ingest(URL, None, CancelFlag::new()).await.unwrap();
        let id = result.created()[0].id;

        let row = h.orchestrator.exercises().get(id).unwrap().unwrap();
        let vector_id = row.vector_id.unwrap();
        let clip = h.orchestrator.settings().storage_dir().join(&row.clip_path);
        assert!(clip.exists());

        let deleted = h.orchestrator.delete_exercise(id).await.unwrap().unwrap();
        assert_eq!(deleted.id, id);

        assert!(h.orchestrator.exercises().get(id).unwrap().is_none());
        assert!(vectors.get(vector_id).await.unwrap().is_none());
        assert!(!clip.exists());

        // Deleting again is a no-op.
        assert!(h.orchestrator.delete_exercise(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reconcile_finds_and_removes_orphans() {
        let vectors = Arc::new(MemoryVectorStore::new());
        let h = harness(
            1,
            StubAnalyzer::scripted(vec![Ok(vec![push_up_candidate()])]),
            false,
            false,
            vectors.clone(),
            speech(),
        );

        h.orchestrator.ingest(URL, None, CancelFlag::new()).await.unwrap();

        // An orphan clip nothing references, and a vector entry whose
        // database_id resolves to nothing.
        let clips_dir = h.orchestrator.settings().clips_dir();
        std::fs::write(clips_dir.join("stray_deadbeef.mp4"), b"x").unwrap();
        let stray_vector = Uuid::new_v4();
        vectors
            .upsert(
                stray_vector,
                &[1.0, 0.0, 0.0],
                &VectorPayload {
                    database_id: Uuid::new_v4(),
                    name: "ghost".into(),
                    how_to: None,
                    benefits: None,
                    counteracts: None,
                    fitness_level: None,
                    intensity: None,
                },
            )
            .await
            .unwrap();

        let report = h.orchestrator.reconcile(false).await.unwrap();
        assert_eq!(report.orphan_clips, vec!["clips/stray_deadbeef.mp4".to_string()]);
        assert_eq!(report.orphan_vectors, vec![stray_vector]);

        // Dry run removed nothing.
        assert!(clips_dir.join("stray_deadbeef.mp4").exists());

        let report = h.orchestrator.reconcile(true).await.unwrap();
        assert!(!report.is_clean());
        assert!(!clips_dir.join("stray_deadbeef.mp4").exists());
        assert!(vectors.get(stray_vector).await.unwrap().is_none());

        let report = h.orchestrator.reconcile(false).await.unwrap();
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_unsupported_url_is_input_invalid() {
        let vectors = Arc::new(MemoryVectorStore::new());
        let h = harness(
            1,
            StubAnalyzer::scripted(vec![]),
            false,
            false,
            vectors,
            speech(),
        );

        let err = h
            .orchestrator
            .ingest("https://vimeo.com/12345", None, CancelFlag::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputInvalid);
    }

    #[tokio::test]
    async fn test_single_extension_covers_full_video() {
        // One detected exercise covering 40% of the duration is extended to
        // cover the whole video.
        let vectors = Arc::new(MemoryVectorStore::new());
        let h = harness(
            1,
            StubAnalyzer::scripted(vec![Ok(vec![RawCandidate::timed("flow", 10.0, 22.0, 0.9)])]),
            false,
            false,
            vectors,
            speech(),
        );

        let (_, result) = h.orchestrator.ingest(URL, None, CancelFlag::new()).await.unwrap();
        let created = result.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].start, 0.0);
        assert_eq!(created[0].end, 30.0);
    }
}
