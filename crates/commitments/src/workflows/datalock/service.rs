use std::sync::Arc;

use tracing::{info, warn};

use super::domain::{DataLockEventId, DataLockErrorCode, DataLockStatus, TriageStatus};
use super::price_history;
use super::repository::DataLockStore;
use crate::workflows::commitments::domain::ApprenticeshipId;
use crate::workflows::commitments::repository::{CommitmentStore, EventPublisher, StoreError};
use crate::workflows::commitments::validation::ValidationError;
use crate::workflows::updates::domain::{
    ApprenticeshipDiff, ApprenticeshipUpdate, UpdateOrigin, UpdateStatus,
};
use crate::workflows::updates::repository::ApprenticeshipUpdateStore;
use crate::workflows::commitments::domain::Party;

/// Error raised by the data-lock triage workflow.
#[derive(Debug, thiserror::Error)]
pub enum TriageServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Service classifying data locks and folding approved cost corrections
/// into the apprenticeship's price timeline.
pub struct DataLockTriageService<S, D, U, E> {
    commitments: Arc<S>,
    locks: Arc<D>,
    updates: Arc<U>,
    events: Arc<E>,
}

impl<S, D, U, E> DataLockTriageService<S, D, U, E>
where
    S: CommitmentStore + 'static,
    D: DataLockStore + 'static,
    U: ApprenticeshipUpdateStore + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(commitments: Arc<S>, locks: Arc<D>, updates: Arc<U>, events: Arc<E>) -> Self {
        Self {
            commitments,
            locks,
            updates,
            events,
        }
    }

    /// Record a triage decision for one data lock. Re-submitting the same
    /// decision is a warn-logged no-op, not an error.
    pub async fn update_triage_status(
        &self,
        apprenticeship_id: ApprenticeshipId,
        event_id: DataLockEventId,
        new_status: TriageStatus,
    ) -> Result<(), TriageServiceError> {
        let lock = self
            .locks
            .get_by_event_id(event_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        if lock.apprenticeship_id != apprenticeship_id {
            return Err(ValidationError::single(
                "data_lock_event_id",
                format!(
                    "data lock {} does not belong to apprenticeship {apprenticeship_id}",
                    lock.data_lock_event_id
                ),
            )
            .into());
        }

        if lock.triage_status == new_status {
            warn!(
                apprenticeship_id = %apprenticeship_id,
                event_id = %event_id,
                triage_status = %new_status,
                "data lock already carries the requested triage status"
            );
            return Ok(());
        }

        assert_valid_triage(new_status, &lock)?;

        let generated_update = if new_status == TriageStatus::Change {
            Some(self.build_correction(&lock).await?)
        } else {
            None
        };

        self.locks
            .update_triage_status(event_id, new_status, generated_update)
            .await?;
        info!(
            apprenticeship_id = %apprenticeship_id,
            event_id = %event_id,
            triage_status = %new_status,
            "data lock triaged"
        );
        Ok(())
    }

    /// Reconcile every outstanding cost correction for the apprenticeship:
    /// rebuild the price timeline from unresolved Change/Fail/Dlock07 locks
    /// and mark exactly those locks resolved. With nothing to fold in this
    /// is a true no-op.
    pub async fn approve_triage(
        &self,
        apprenticeship_id: ApprenticeshipId,
    ) -> Result<(), TriageServiceError> {
        let locks = self.locks.for_apprenticeship(apprenticeship_id).await?;
        let (entries, resolved_ids) = price_history::rebuild(apprenticeship_id, &locks);

        if entries.is_empty() {
            info!(apprenticeship_id = %apprenticeship_id, "no outstanding cost corrections to approve");
            return Ok(());
        }

        let apprenticeship = self
            .commitments
            .get_apprenticeship(apprenticeship_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        let commitment = self
            .commitments
            .get_by_id(apprenticeship.commitment_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        self.commitments
            .insert_price_history(apprenticeship_id, entries)
            .await?;
        self.locks.resolve(resolved_ids).await?;

        if let Err(err) = self
            .events
            .publish(&commitment, &apprenticeship, "APPRENTICESHIP-UPDATED")
            .await
        {
            warn!(
                apprenticeship_id = %apprenticeship_id,
                error = %err,
                "failed to publish price history event"
            );
        }

        info!(apprenticeship_id = %apprenticeship_id, "price history rebuilt from data locks");
        Ok(())
    }

    /// A Change triage turns the reported ILR values into a provider-side
    /// change request for the employer to review.
    async fn build_correction(
        &self,
        lock: &DataLockStatus,
    ) -> Result<ApprenticeshipUpdate, TriageServiceError> {
        if self
            .updates
            .get_pending(lock.apprenticeship_id)
            .await?
            .is_some()
        {
            return Err(ValidationError::single(
                "apprenticeship_update",
                format!(
                    "a pending change already exists for apprenticeship {}",
                    lock.apprenticeship_id
                ),
            )
            .into());
        }

        let apprenticeship = self
            .commitments
            .get_apprenticeship(lock.apprenticeship_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        let mut diff = ApprenticeshipDiff::default();
        if lock.error_codes.contains(DataLockErrorCode::Dlock07) {
            diff.cost = lock.ilr_total_cost;
        }
        if lock.error_codes.contains(DataLockErrorCode::Dlock09) {
            diff.start_date = lock.ilr_actual_start_date;
        }

        Ok(ApprenticeshipUpdate {
            id: None,
            apprenticeship_id: lock.apprenticeship_id,
            originator: Party::Provider,
            status: UpdateStatus::Pending,
            origin: UpdateOrigin::DataLock,
            diff,
            effective_from_date: apprenticeship.start_date,
            effective_to_date: None,
        })
    }
}

fn assert_valid_triage(
    new_status: TriageStatus,
    lock: &DataLockStatus,
) -> Result<(), ValidationError> {
    let permitted = match new_status {
        TriageStatus::Change => lock.error_codes.allows_change_triage(),
        TriageStatus::Restart => lock.error_codes.allows_restart_triage(),
        TriageStatus::Unknown | TriageStatus::FixIlr => true,
    };

    if permitted {
        Ok(())
    } else {
        Err(ValidationError::single(
            "triage_status",
            format!(
                "data lock {} with error code {} cannot be triaged as {new_status}",
                lock.data_lock_event_id, lock.error_codes
            ),
        ))
    }
}
