//! OpenAI multimodal analyzer implementation.

use super::{AnalysisContext, Analyzer, RawCandidate, StoryCoach};
use crate::error::{RepcutError, Result};
use crate::keyframes::Keyframe;
use crate::openai::{create_backup_client, create_client_with_timeout, is_quota_error};
use crate::transcription::Transcript;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
    CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs,
};
use async_trait::async_trait;
use base64::Engine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_retry2::{strategy::jitter, strategy::ExponentialBackoff, Retry, RetryError};
use tracing::{debug, info, instrument, warn};

const DETECTION_SYSTEM_PROMPT: &str = "\
You are an expert movement coach analyzing keyframes from a short fitness video.\n\
Identify every distinct exercise demonstrated and return a JSON array. Each element:\n\
{\"name\", \"start\", \"end\", \"how_to\", \"benefits\", \"counteracts\", \"rounds_reps\", \
\"fitness_level\" (0-10), \"intensity\" (0-10), \"confidence\" (0-1)}.\n\
Rules:\n\
- Only report segments at least 3.5 seconds long.\n\
- Never emit overlapping segments for the same movement. If a continuous flow \
is shown, report either the whole flow or its component movements, not both.\n\
- If no exercise is demonstrated, return [].\n\
- Times are seconds from the start of the video. Frame file names encode \
cut index, frame number, timestamp in milliseconds, and change score.\n\
Return only the JSON array, no commentary.";

const STORY_SYSTEM_PROMPT: &str = "\
You are a fitness coach turning a user's goal into short, concrete exercise \
needs (\"stories\"). Each story is one sentence describing a movement need, \
e.g. \"gentle hip opener after long sitting\". Return a JSON array of strings, \
nothing else.";

/// OpenAI-backed multimodal analyzer and story coach.
pub struct OpenAIAnalyzer {
    primary: async_openai::Client<OpenAIConfig>,
    backup: Option<async_openai::Client<OpenAIConfig>>,
    model: String,
    story_model: String,
    max_retries: usize,
    /// Set once a quota-shaped error is seen; later attempts use the backup
    /// credential without resetting the attempt count.
    use_backup: AtomicBool,
}

impl OpenAIAnalyzer {
    pub fn new(model: &str, story_model: &str, timeout: Duration, max_retries: usize) -> Self {
        Self {
            primary: create_client_with_timeout(timeout),
            backup: create_backup_client(timeout),
            model: model.to_string(),
            story_model: story_model.to_string(),
            max_retries,
            use_backup: AtomicBool::new(false),
        }
    }

    fn client(&self) -> &async_openai::Client<OpenAIConfig> {
        if self.use_backup.load(Ordering::Relaxed) {
            if let Some(backup) = &self.backup {
                return backup;
            }
        }
        &self.primary
    }

    fn note_error(&self, message: &str) {
        if is_quota_error(message) && self.backup.is_some() && !self.use_backup.load(Ordering::Relaxed) {
            warn!("Primary credential hit quota, switching to backup");
            self.use_backup.store(true, Ordering::Relaxed);
        }
    }

    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(500)
            .factor(2)
            .max_delay(Duration::from_secs(8))
            .map(jitter)
            .take(self.max_retries.saturating_sub(1))
    }

    async fn frame_parts(
        frames: &[Keyframe],
    ) -> Result<Vec<async_openai::types::ChatCompletionRequestUserMessageContentPart>> {
        let mut parts = Vec::with_capacity(frames.len());
        for frame in frames {
            let bytes = tokio::fs::read(&frame.path).await?;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
            let part = ChatCompletionRequestMessageContentPartImageArgs::default()
                .image_url(
                    ImageUrlArgs::default()
                        .url(format!("data:image/jpeg;base64,{}", encoded))
                        .detail(ImageDetail::Low)
                        .build()
                        .map_err(|e| RepcutError::Analyze(e.to_string()))?,
                )
                .build()
                .map_err(|e| RepcutError::Analyze(e.to_string()))?
                .into();
            parts.push(part);
        }
        Ok(parts)
    }

    fn context_text(
        frames: &[Keyframe],
        transcript: Option<&Transcript>,
        context: &AnalysisContext,
    ) -> String {
        let mut text = String::new();

        text.push_str(&format!(
            "Platform: {}. Video duration: {:.1}s. Carousel item {} of {}.\n",
            context.platform, context.duration, context.carousel_index, context.carousel_total
        ));
        if context.first_item_may_be_hook && context.carousel_index == 1 && context.carousel_total > 1 {
            text.push_str(
                "Note: the first item of a carousel is often a hook/teaser with no demonstration.\n",
            );
        }
        if let Some(desc) = &context.description {
            text.push_str(&format!("Post caption: {}\n", desc));
        }
        if !context.tags.is_empty() {
            text.push_str(&format!("Tags: {}\n", context.tags.join(", ")));
        }

        text.push_str("\nKeyframes in order:\n");
        for frame in frames {
            text.push_str(&format!("- {}\n", frame.file_name()));
        }

        match transcript {
            Some(t) if !t.is_empty() => {
                text.push_str("\nTranscript:\n");
                text.push_str(&t.format_with_timestamps());
            }
            _ => text.push_str("\nNo usable transcript."),
        }

        text
    }

    /// Extract the JSON array out of a chatty model response.
    fn parse_candidates(response: &str) -> Result<Vec<RawCandidate>> {
        let json_start = response.find('[');
        let json_end = response.rfind(']');

        let json_str = match (json_start, json_end) {
            (Some(start), Some(end)) if end > start => &response[start..=end],
            _ => response,
        };

        serde_json::from_str(json_str).map_err(|e| {
            RepcutError::Analyze(format!(
                "Failed to parse analyzer response: {}. Response was: {}",
                e,
                &response[..response.len().min(500)]
            ))
        })
    }

    async fn chat_with_retry(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        model: &str,
    ) -> Result<String> {
        let strategy = self.retry_strategy();

        let content = Retry::spawn(strategy, || {
            let messages = messages.clone();
            async move {
                let request = CreateChatCompletionRequestArgs::default()
                    .model(model)
                    .messages(messages)
                    .build()
                    .map_err(|e| RetryError::Permanent(RepcutError::Analyze(e.to_string())))?;

                match self.client().chat().create(request).await {
                    Ok(response) => {
                        let text = response
                            .choices
                            .first()
                            .and_then(|c| c.message.content.clone())
                            .unwrap_or_default();
                        Ok(text)
                    }
                    Err(e) => {
                        let message = e.to_string();
                        self.note_error(&message);
                        warn!("Model call failed, may retry: {}", message);
                        Err(RetryError::Transient {
                            err: RepcutError::OpenAI(message),
                            retry_after: None,
                        })
                    }
                }
            }
        })
        .await?;

        Ok(content)
    }
}

#[async_trait]
impl Analyzer for OpenAIAnalyzer {
    #[instrument(skip_all, fields(frames = frames.len(), model = %self.model))]
    async fn analyze(
        &self,
        frames: &[Keyframe],
        transcript: Option<&Transcript>,
        context: &AnalysisContext,
    ) -> Result<Vec<RawCandidate>> {
        if frames.is_empty() {
            return Ok(Vec::new());
        }

        let mut parts = vec![ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(Self::context_text(frames, transcript, context))
            .build()
            .map_err(|e| RepcutError::Analyze(e.to_string()))?
            .into()];
        parts.extend(Self::frame_parts(frames).await?);

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(DETECTION_SYSTEM_PROMPT)
                .build()
                .map_err(|e| RepcutError::Analyze(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Array(parts))
                .build()
                .map_err(|e| RepcutError::Analyze(e.to_string()))?
                .into(),
        ];

        let response = self.chat_with_retry(messages, &self.model).await?;
        let candidates = Self::parse_candidates(&response)?;

        info!("Analyzer returned {} candidate(s)", candidates.len());
        Ok(candidates)
    }
}

#[async_trait]
impl StoryCoach for OpenAIAnalyzer {
    #[instrument(skip(self), fields(model = %self.story_model))]
    async fn generate_stories(&self, user_prompt: &str, n: usize) -> Result<Vec<String>> {
        let user_text = format!(
            "User goal: {}\nGenerate exactly {} stories.",
            user_prompt, n
        );

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(STORY_SYSTEM_PROMPT)
                .build()
                .map_err(|e| RepcutError::Analyze(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_text)
                .build()
                .map_err(|e| RepcutError::Analyze(e.to_string()))?
                .into(),
        ];

        let response = self.chat_with_retry(messages, &self.story_model).await?;

        let json_start = response.find('[');
        let json_end = response.rfind(']');
        let json_str = match (json_start, json_end) {
            (Some(start), Some(end)) if end > start => &response[start..=end],
            _ => response.as_str(),
        };

        let stories: Vec<String> = serde_json::from_str(json_str)
            .map_err(|e| RepcutError::Analyze(format!("Unparseable stories: {}", e)))?;

        debug!("Generated {} stories", stories.len());
        Ok(stories.into_iter().take(n).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_candidates_with_surrounding_prose() {
        let response = r#"Here is what I found:
        [{"name": "push-up", "start": 4.0, "end": 18.5, "confidence": 0.82,
          "fitness_level": 5, "intensity": 7}]
        Let me know if you need more."#;

        let candidates = OpenAIAnalyzer::parse_candidates(response).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "push-up");
        assert_eq!(candidates[0].fitness_level, Some(5));
    }

    #[test]
    fn test_parse_candidates_empty_array() {
        let candidates = OpenAIAnalyzer::parse_candidates("[]").unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_parse_candidates_string_times() {
        // Models occasionally return times as strings; coercion happens in
        // the normalizer, parsing must not reject them.
        let response = r#"[{"name": "squat", "start": "3.0", "end": "9.5"}]"#;
        let candidates = OpenAIAnalyzer::parse_candidates(response).unwrap();
        assert_eq!(candidates[0].start.as_str(), Some("3.0"));
    }

    #[test]
    fn test_parse_candidates_rejects_garbage() {
        assert!(OpenAIAnalyzer::parse_candidates("no json here").is_err());
    }
}
