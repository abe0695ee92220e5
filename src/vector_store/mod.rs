//! Vector store abstraction for Repcut.
//!
//! Dense exercise vectors with retrieval payloads, plus the diverse search
//! primitive that keeps story results from collapsing onto one movement
//! family.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::embedding::Embedder;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Retrieval payload stored next to each vector. `database_id` is the
/// mandatory back-reference used to rejoin with the metadata store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPayload {
    pub database_id: Uuid,
    pub name: String,
    pub how_to: Option<String>,
    pub benefits: Option<String>,
    pub counteracts: Option<String>,
    pub fitness_level: Option<i32>,
    pub intensity: Option<i32>,
}

/// A similarity search hit.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub vector_id: Uuid,
    pub score: f32,
    pub payload: VectorPayload,
}

/// Collection statistics.
#[derive(Debug, Clone, Copy)]
pub struct CollectionInfo {
    pub count: usize,
    pub dimension: usize,
}

/// Retrieval-side payload filter applied during search.
#[derive(Debug, Clone, Default)]
pub struct PayloadFilter {
    pub min_fitness_level: Option<i32>,
    pub max_fitness_level: Option<i32>,
    pub min_intensity: Option<i32>,
    pub max_intensity: Option<i32>,
}

impl PayloadFilter {
    pub fn matches(&self, payload: &VectorPayload) -> bool {
        let in_range = |value: Option<i32>, min: Option<i32>, max: Option<i32>| match value {
            Some(v) => min.map_or(true, |m| v >= m) && max.map_or(true, |m| v <= m),
            // Entries without the field only pass an unconstrained filter.
            None => min.is_none() && max.is_none(),
        };

        in_range(payload.fitness_level, self.min_fitness_level, self.max_fitness_level)
            && in_range(payload.intensity, self.min_intensity, self.max_intensity)
    }
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace a vector entry.
    async fn upsert(&self, vector_id: Uuid, vector: &[f32], payload: &VectorPayload) -> Result<()>;

    /// Top-k cosine similarity search above an optional score threshold,
    /// optionally restricted by a payload filter.
    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        score_threshold: Option<f32>,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<VectorHit>>;

    /// Fetch a single entry.
    async fn get(&self, vector_id: Uuid) -> Result<Option<VectorHit>>;

    /// Delete an entry; returns whether it existed.
    async fn delete(&self, vector_id: Uuid) -> Result<bool>;

    /// Every `(vector_id, database_id)` pair (reconciliation sweep).
    async fn list_refs(&self) -> Result<Vec<(Uuid, Uuid)>>;

    /// Collection size and dimension.
    async fn info(&self) -> Result<CollectionInfo>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Movement families used to diversify search results. The set is fixed and
/// ordered; the first matching family wins.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("handstand", &["handstand", "press to handstand", "wall walk", "inversion"]),
    ("stretch", &["stretch", "mobility", "opener", "flexibility"]),
    ("core", &["core", "abs", "plank", "hollow", "crunch"]),
    ("push", &["push", "press", "dip"]),
    ("hip_leg", &["hip", "leg", "squat", "lunge", "glute", "hamstring", "calf"]),
    ("balance", &["balance", "single leg", "stability"]),
    ("wall", &["wall"]),
    ("floor", &["floor", "ground", "lying", "supine"]),
];

/// Categorize a hit by keyword match over its name and how-to text.
pub fn categorize(payload: &VectorPayload) -> &'static str {
    let haystack = format!(
        "{} {}",
        payload.name,
        payload.how_to.as_deref().unwrap_or("")
    )
    .to_lowercase();

    for (family, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|k| haystack.contains(k)) {
            return family;
        }
    }
    "other"
}

/// Minimum candidate buffer fetched before diversification.
const FETCH_BUFFER: usize = 40;

/// Embed a story and return up to `k_final` hits, capped per movement
/// family, in descending score order.
pub async fn diverse_search(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    query_text: &str,
    k_final: usize,
    score_threshold: f32,
    max_per_category: usize,
) -> Result<Vec<VectorHit>> {
    let query_vector = embedder.embed(query_text).await?;

    let fetch = (2 * k_final).max(FETCH_BUFFER);
    let hits = store
        .search(&query_vector, fetch, Some(score_threshold), None)
        .await?;

    let mut counts: std::collections::HashMap<&'static str, usize> =
        std::collections::HashMap::new();
    let mut picked = Vec::with_capacity(k_final);

    // Hits arrive in descending score order; greedy pick, skipping any
    // family already at its cap.
    for hit in hits {
        if picked.len() >= k_final {
            break;
        }
        let family = categorize(&hit.payload);
        let count = counts.entry(family).or_insert(0);
        if *count >= max_per_category {
            continue;
        }
        *count += 1;
        picked.push(hit);
    }

    debug!(
        "Diverse search for '{}' picked {} of requested {}",
        query_text,
        picked.len(),
        k_final
    );
    Ok(picked)
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn payload(database_id: Uuid, name: &str, how_to: Option<&str>) -> VectorPayload {
        VectorPayload {
            database_id,
            name: name.to_string(),
            how_to: how_to.map(|s| s.to_string()),
            benefits: None,
            counteracts: None,
            fitness_level: Some(5),
            intensity: Some(5),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_categorize_first_match_wins() {
        // "wall handstand hold" mentions both wall and handstand; the
        // ordered map puts handstand first.
        let p = payload(Uuid::new_v4(), "wall handstand hold", None);
        assert_eq!(categorize(&p), "handstand");
    }

    #[test]
    fn test_categorize_uses_how_to() {
        let p = payload(Uuid::new_v4(), "couch move", Some("deep squat position by the sofa"));
        assert_eq!(categorize(&p), "hip_leg");
    }

    #[test]
    fn test_categorize_other() {
        let p = payload(Uuid::new_v4(), "breathing drill", None);
        assert_eq!(categorize(&p), "other");
    }

    #[test]
    fn test_payload_filter_ranges() {
        let p = payload(Uuid::new_v4(), "squat", None); // level 5, intensity 5

        let unconstrained = PayloadFilter::default();
        assert!(unconstrained.matches(&p));

        let in_range = PayloadFilter {
            min_fitness_level: Some(3),
            max_fitness_level: Some(7),
            min_intensity: Some(5),
            max_intensity: None,
        };
        assert!(in_range.matches(&p));

        let out_of_range = PayloadFilter {
            min_intensity: Some(8),
            ..Default::default()
        };
        assert!(!out_of_range.matches(&p));

        // A constrained field that is absent from the payload fails.
        let mut no_levels = p.clone();
        no_levels.fitness_level = None;
        let needs_level = PayloadFilter {
            min_fitness_level: Some(1),
            ..Default::default()
        };
        assert!(!needs_level.matches(&no_levels));
        assert!(unconstrained.matches(&no_levels));
    }

    struct StubEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| self.0.clone()).collect())
        }
        fn dimensions(&self) -> usize {
            self.0.len()
        }
    }

    #[tokio::test]
    async fn test_diverse_search_caps_categories() {
        let store = MemoryVectorStore::new();
        let query = vec![1.0, 0.0];

        // Eight stretches all closer to the query than anything else, plus
        // two distinct families further away.
        for i in 0..8 {
            let v = vec![1.0, 0.01 * i as f32];
            store
                .upsert(Uuid::new_v4(), &v, &payload(Uuid::new_v4(), &format!("neck stretch {}", i), None))
                .await
                .unwrap();
        }
        store
            .upsert(Uuid::new_v4(), &[0.8, 0.6], &payload(Uuid::new_v4(), "push-up", None))
            .await
            .unwrap();
        store
            .upsert(Uuid::new_v4(), &[0.7, 0.7], &payload(Uuid::new_v4(), "squat", None))
            .await
            .unwrap();

        let embedder = StubEmbedder(query);
        let hits = diverse_search(&store, &embedder, "loosen up", 5, 0.3, 2)
            .await
            .unwrap();

        assert_eq!(hits.len(), 4, "2 stretches + push + hip_leg");
        let stretches = hits
            .iter()
            .filter(|h| categorize(&h.payload) == "stretch")
            .count();
        assert_eq!(stretches, 2);

        // Descending score order.
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_diverse_search_five_families() {
        let store = MemoryVectorStore::new();
        // 40 candidates spread over five families, all above threshold.
        let families = ["handstand", "stretch", "plank", "push", "squat"];
        for i in 0..40 {
            let name = format!("{} drill {}", families[i % families.len()], i);
            let v = vec![1.0, 0.002 * i as f32];
            store
                .upsert(Uuid::new_v4(), &v, &payload(Uuid::new_v4(), &name, None))
                .await
                .unwrap();
        }

        let embedder = StubEmbedder(vec![1.0, 0.0]);
        let hits = diverse_search(&store, &embedder, "shoulder mobility for desk workers", 5, 0.3, 2)
            .await
            .unwrap();

        assert_eq!(hits.len(), 5);
        let mut per_family: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
        for hit in &hits {
            *per_family.entry(categorize(&hit.payload)).or_insert(0) += 1;
        }
        assert!(per_family.values().all(|&c| c <= 2));
    }
}
