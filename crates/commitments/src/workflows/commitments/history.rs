//! Before/after audit trail for side-effect mutations.
//!
//! Whenever a workflow mutates a commitment or apprenticeship as part of a
//! larger operation, the recorder captures a serialized snapshot pair and
//! hands the batch to the history store inside the same transaction scope
//! as the primary write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Apprenticeship, Commitment, Party, UpdatedBy};
use super::repository::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityType {
    Commitment,
    Apprenticeship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeType {
    Created,
    Updated,
    Deleted,
    EditedApprenticeship,
    ChangeOfStatus,
}

/// One audited snapshot pair.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryItem {
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub change_type: ChangeType,
    pub original_state: serde_json::Value,
    pub updated_state: serde_json::Value,
    pub updated_by_role: Party,
    pub user_id: String,
    pub updated_by_name: String,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only audit store.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn insert_history(&self, items: Vec<HistoryItem>) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("unable to serialize history snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Collects snapshot pairs over the course of one command and flushes them
/// in a single batch.
pub struct HistoryRecorder {
    updated_by: UpdatedBy,
    items: Vec<HistoryItem>,
}

impl HistoryRecorder {
    pub fn new(updated_by: UpdatedBy) -> Self {
        Self {
            updated_by,
            items: Vec::new(),
        }
    }

    pub fn track_commitment(
        &mut self,
        change_type: ChangeType,
        before: &Commitment,
        after: &Commitment,
    ) -> Result<(), HistoryError> {
        self.push(EntityType::Commitment, before.id.0, change_type, before, after)
    }

    pub fn track_apprenticeship(
        &mut self,
        change_type: ChangeType,
        before: &Apprenticeship,
        after: &Apprenticeship,
    ) -> Result<(), HistoryError> {
        self.push(EntityType::Apprenticeship, before.id.0, change_type, before, after)
    }

    /// A freshly created entity has no pre-image; the original state is
    /// recorded as null.
    pub fn track_apprenticeship_created(
        &mut self,
        after: &Apprenticeship,
    ) -> Result<(), HistoryError> {
        self.push_states(
            EntityType::Apprenticeship,
            after.id.0,
            ChangeType::Created,
            serde_json::Value::Null,
            serde_json::to_value(after)?,
        );
        Ok(())
    }

    /// A deleted aggregate has no post-image; the updated state is recorded
    /// as null.
    pub fn track_commitment_deleted(&mut self, before: &Commitment) -> Result<(), HistoryError> {
        self.push_states(
            EntityType::Commitment,
            before.id.0,
            ChangeType::Deleted,
            serde_json::to_value(before)?,
            serde_json::Value::Null,
        );
        Ok(())
    }

    fn push<T: Serialize>(
        &mut self,
        entity_type: EntityType,
        entity_id: i64,
        change_type: ChangeType,
        before: &T,
        after: &T,
    ) -> Result<(), HistoryError> {
        self.push_states(
            entity_type,
            entity_id,
            change_type,
            serde_json::to_value(before)?,
            serde_json::to_value(after)?,
        );
        Ok(())
    }

    fn push_states(
        &mut self,
        entity_type: EntityType,
        entity_id: i64,
        change_type: ChangeType,
        original_state: serde_json::Value,
        updated_state: serde_json::Value,
    ) {
        self.items.push(HistoryItem {
            entity_type,
            entity_id,
            change_type,
            original_state,
            updated_state,
            updated_by_role: self.updated_by.role,
            user_id: self.updated_by.user_id.clone(),
            updated_by_name: self.updated_by.display_name.clone(),
            recorded_at: Utc::now(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Flush everything tracked so far. A recorder with nothing tracked is
    /// a no-op, so callers can save unconditionally.
    pub async fn save<S>(self, store: &S) -> Result<(), HistoryError>
    where
        S: HistoryStore + ?Sized,
    {
        if self.items.is_empty() {
            return Ok(());
        }
        store.insert_history(self.items).await?;
        Ok(())
    }
}
