use async_trait::async_trait;

use super::domain::{DataLockEventId, DataLockStatus, TriageStatus};
use crate::workflows::commitments::domain::ApprenticeshipId;
use crate::workflows::commitments::repository::StoreError;
use crate::workflows::updates::domain::ApprenticeshipUpdate;

/// Storage contract for externally ingested data-lock records.
#[async_trait]
pub trait DataLockStore: Send + Sync {
    async fn get_by_event_id(
        &self,
        event_id: DataLockEventId,
    ) -> Result<Option<DataLockStatus>, StoreError>;

    async fn for_apprenticeship(
        &self,
        apprenticeship_id: ApprenticeshipId,
    ) -> Result<Vec<DataLockStatus>, StoreError>;

    /// Record the triage decision and, when triaged to Change, the
    /// generated change request, atomically.
    async fn update_triage_status(
        &self,
        event_id: DataLockEventId,
        status: TriageStatus,
        generated_update: Option<ApprenticeshipUpdate>,
    ) -> Result<(), StoreError>;

    /// Mark the given events as folded into price history.
    async fn resolve(&self, event_ids: Vec<DataLockEventId>) -> Result<(), StoreError>;
}
