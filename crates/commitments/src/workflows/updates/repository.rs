use async_trait::async_trait;

use super::domain::ApprenticeshipUpdate;
use crate::workflows::commitments::domain::{Apprenticeship, ApprenticeshipId};
use crate::workflows::commitments::repository::StoreError;

/// Storage contract for pending change requests.
///
/// `create` and `approve` carry the related apprenticeship write so the
/// store can apply both inside one transaction; partial application of a
/// change request is never observable.
#[async_trait]
pub trait ApprenticeshipUpdateStore: Send + Sync {
    async fn get_pending(
        &self,
        apprenticeship_id: ApprenticeshipId,
    ) -> Result<Option<ApprenticeshipUpdate>, StoreError>;

    /// Persist the pending change and/or the immediately-applied
    /// apprenticeship atomically. The store assigns the update id and
    /// stamps the apprenticeship's pending-update originator.
    async fn create(
        &self,
        pending: Option<ApprenticeshipUpdate>,
        immediate: Option<Apprenticeship>,
    ) -> Result<(), StoreError>;

    /// Mark the update approved and write the folded apprenticeship,
    /// clearing its pending-update originator, atomically.
    async fn approve(
        &self,
        update: &ApprenticeshipUpdate,
        apprenticeship: &Apprenticeship,
        user_id: &str,
    ) -> Result<(), StoreError>;

    /// Discard the pending update as rejected by the reviewing party.
    async fn reject(&self, update: &ApprenticeshipUpdate, user_id: &str)
        -> Result<(), StoreError>;

    /// Discard the pending update as withdrawn by its originator.
    async fn undo(&self, update: &ApprenticeshipUpdate, user_id: &str) -> Result<(), StoreError>;
}
