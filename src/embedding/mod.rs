//! Embedding generation for semantic search and retrieval.

mod openai;

pub use openai::OpenAIEmbedder;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

/// Text embedded for an exercise: the semantic fields joined into one
/// retrieval document.
pub fn exercise_embedding_text(
    name: &str,
    how_to: Option<&str>,
    benefits: Option<&str>,
    counteracts: Option<&str>,
) -> String {
    let mut parts = vec![name.to_string()];
    if let Some(t) = how_to {
        parts.push(format!("How to: {}", t));
    }
    if let Some(t) = benefits {
        parts.push(format!("Benefits: {}", t));
    }
    if let Some(t) = counteracts {
        parts.push(format!("Counteracts: {}", t));
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_text_includes_present_fields() {
        let text = exercise_embedding_text("push-up", Some("lower slowly"), None, Some("desk posture"));
        assert!(text.starts_with("push-up"));
        assert!(text.contains("How to: lower slowly"));
        assert!(text.contains("Counteracts: desk posture"));
        assert!(!text.contains("Benefits"));
    }
}
