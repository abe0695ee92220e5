//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{cosine_similarity, CollectionInfo, PayloadFilter, VectorHit, VectorPayload, VectorStore};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory vector store.
pub struct MemoryVectorStore {
    entries: RwLock<HashMap<Uuid, (Vec<f32>, VectorPayload)>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, vector_id: Uuid, vector: &[f32], payload: &VectorPayload) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.insert(vector_id, (vector.to_vec(), payload.clone()));
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        score_threshold: Option<f32>,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<VectorHit>> {
        let entries = self.entries.read().unwrap();
        let min_score = score_threshold.unwrap_or(f32::MIN);

        let mut hits: Vec<VectorHit> = entries
            .iter()
            .filter(|(_, (_, payload))| filter.map_or(true, |f| f.matches(payload)))
            .map(|(id, (vector, payload))| VectorHit {
                vector_id: *id,
                score: cosine_similarity(query_vector, vector),
                payload: payload.clone(),
            })
            .filter(|h| h.score >= min_score)
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    async fn get(&self, vector_id: Uuid) -> Result<Option<VectorHit>> {
        let entries = self.entries.read().unwrap();
        Ok(entries.get(&vector_id).map(|(_, payload)| VectorHit {
            vector_id,
            score: 1.0,
            payload: payload.clone(),
        }))
    }

    async fn delete(&self, vector_id: Uuid) -> Result<bool> {
        let mut entries = self.entries.write().unwrap();
        Ok(entries.remove(&vector_id).is_some())
    }

    async fn list_refs(&self) -> Result<Vec<(Uuid, Uuid)>> {
        let entries = self.entries.read().unwrap();
        Ok(entries
            .iter()
            .map(|(id, (_, payload))| (*id, payload.database_id))
            .collect())
    }

    async fn info(&self) -> Result<CollectionInfo> {
        let entries = self.entries.read().unwrap();
        let dimension = entries.values().next().map(|(v, _)| v.len()).unwrap_or(0);
        Ok(CollectionInfo {
            count: entries.len(),
            dimension,
        })
    }
}
