//! Result payloads recorded on jobs and returned to callers.

use crate::error::ErrorEnvelope;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One exercise created by an ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedExercise {
    pub id: Uuid,
    pub name: String,
    pub clip_path: String,
    pub start: f64,
    pub end: f64,
}

/// Outcome class for one carousel item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// At least one exercise was created.
    Created,
    /// The item processed cleanly but contained no exercise.
    Empty,
    /// Every exercise was already present; nothing new was written.
    DuplicateSkipped,
    /// The item failed; see `error`.
    Failed,
}

/// Per-item result within a (possibly single-item) carousel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResult {
    /// 1-based carousel position.
    pub carousel_index: u32,
    pub status: ItemStatus,
    pub created: Vec<CreatedExercise>,
    /// Exercises skipped by the idempotent fingerprint check.
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
}

impl ItemResult {
    pub(crate) fn classify(
        carousel_index: u32,
        created: Vec<CreatedExercise>,
        skipped: usize,
        error: Option<ErrorEnvelope>,
    ) -> Self {
        let status = match (&error, created.len(), skipped) {
            (Some(_), _, _) => ItemStatus::Failed,
            (None, 0, 0) => ItemStatus::Empty,
            (None, 0, _) => ItemStatus::DuplicateSkipped,
            (None, _, _) => ItemStatus::Created,
        };
        Self {
            carousel_index,
            status,
            created,
            skipped,
            error,
        }
    }
}

/// Full result of one ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    pub url: String,
    pub normalized_url: String,
    pub items: Vec<ItemResult>,
}

impl IngestResult {
    /// All created exercises across items, in carousel order.
    pub fn created(&self) -> Vec<&CreatedExercise> {
        self.items.iter().flat_map(|i| i.created.iter()).collect()
    }

    pub fn all_items_failed(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|i| i.status == ItemStatus::Failed)
    }
}

/// Orphans discovered by a reconciliation sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Clip files under the content root no live row references.
    pub orphan_clips: Vec<String>,
    /// Vector entries whose `database_id` does not resolve.
    pub orphan_vectors: Vec<Uuid>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_clips.is_empty() && self.orphan_vectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_status_classification() {
        let item = ItemResult::classify(1, vec![], 0, None);
        assert_eq!(item.status, ItemStatus::Empty);

        let item = ItemResult::classify(1, vec![], 3, None);
        assert_eq!(item.status, ItemStatus::DuplicateSkipped);

        let created = vec![CreatedExercise {
            id: Uuid::new_v4(),
            name: "push-up".into(),
            clip_path: "clips/push_up_12ab34cd.mp4".into(),
            start: 4.0,
            end: 18.5,
        }];
        let item = ItemResult::classify(1, created, 1, None);
        assert_eq!(item.status, ItemStatus::Created);

        let envelope = ErrorEnvelope {
            kind: crate::error::ErrorKind::MaterializeFailed,
            message: "boom".into(),
        };
        let item = ItemResult::classify(1, vec![], 0, Some(envelope));
        assert_eq!(item.status, ItemStatus::Failed);
    }

    #[test]
    fn test_all_items_failed() {
        let failed = ItemResult::classify(
            1,
            vec![],
            0,
            Some(ErrorEnvelope {
                kind: crate::error::ErrorKind::Internal,
                message: "x".into(),
            }),
        );
        let ok = ItemResult::classify(2, vec![], 0, None);

        let result = IngestResult {
            url: "u".into(),
            normalized_url: "n".into(),
            items: vec![failed.clone(), ok],
        };
        assert!(!result.all_items_failed());

        let result = IngestResult {
            url: "u".into(),
            normalized_url: "n".into(),
            items: vec![failed],
        };
        assert!(result.all_items_failed());
    }
}
