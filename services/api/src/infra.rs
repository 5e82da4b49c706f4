use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use commitments::workflows::commitments::{
    AccountId, AgreementStatus, Apprenticeship, ApprenticeshipId, Commitment,
    CommitmentAgreementService, CommitmentId, CommitmentReviewState, CommitmentStatus,
    CommitmentStore, EventError, EventPublisher, HistoryItem, HistoryStore, OverlapChecker,
    OverlapRequest, OverlapSummary, PaymentStatus, PriceHistoryEntry, ProviderId, StoreError,
};
use commitments::workflows::datalock::{
    DataLockEventId, DataLockStatus, DataLockStore, DataLockTriageService, TriageStatus,
};
use commitments::workflows::updates::{
    ApprenticeshipUpdate, ApprenticeshipUpdateId, ApprenticeshipUpdateService,
    ApprenticeshipUpdateStore,
};

pub(crate) type AgreementService = CommitmentAgreementService<
    InMemoryStore,
    InMemoryStore,
    InMemoryStore,
    LoggingEventPublisher,
>;
pub(crate) type UpdateService = ApprenticeshipUpdateService<
    InMemoryStore,
    InMemoryStore,
    InMemoryStore,
    InMemoryStore,
    LoggingEventPublisher,
>;
pub(crate) type TriageService =
    DataLockTriageService<InMemoryStore, InMemoryStore, InMemoryStore, LoggingEventPublisher>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) agreements: Arc<AgreementService>,
    pub(crate) updates: Arc<UpdateService>,
    pub(crate) triage: Arc<TriageService>,
}

/// Single-process store backing every persistence contract. The default
/// deployment runs against a relational store; this keeps the service
/// exercisable end to end without one.
#[derive(Default)]
pub(crate) struct InMemoryStore {
    commitments: Mutex<HashMap<CommitmentId, Commitment>>,
    pending: Mutex<HashMap<ApprenticeshipId, ApprenticeshipUpdate>>,
    locks: Mutex<Vec<DataLockStatus>>,
    price_history: Mutex<Vec<PriceHistoryEntry>>,
    history: Mutex<Vec<HistoryItem>>,
    sequence: AtomicI64,
}

impl InMemoryStore {
    fn apprenticeship_snapshot(&self, id: ApprenticeshipId) -> Option<Apprenticeship> {
        self.commitments
            .lock()
            .expect("store mutex poisoned")
            .values()
            .flat_map(|c| c.apprenticeships.iter())
            .find(|a| a.id == id)
            .cloned()
    }

    fn put_apprenticeship(&self, apprenticeship: Apprenticeship) -> Result<(), StoreError> {
        let mut guard = self.commitments.lock().expect("store mutex poisoned");
        let commitment = guard
            .get_mut(&apprenticeship.commitment_id)
            .ok_or(StoreError::NotFound)?;
        match commitment
            .apprenticeships
            .iter_mut()
            .find(|a| a.id == apprenticeship.id)
        {
            Some(existing) => *existing = apprenticeship,
            None => commitment.apprenticeships.push(apprenticeship),
        }
        Ok(())
    }

    fn discard_pending(&self, apprenticeship_id: ApprenticeshipId) -> Result<(), StoreError> {
        self.pending
            .lock()
            .expect("store mutex poisoned")
            .remove(&apprenticeship_id);
        if let Some(mut apprenticeship) = self.apprenticeship_snapshot(apprenticeship_id) {
            apprenticeship.pending_update_originator = None;
            self.put_apprenticeship(apprenticeship)?;
        }
        Ok(())
    }
}

#[async_trait]
impl CommitmentStore for InMemoryStore {
    async fn get_by_id(&self, id: CommitmentId) -> Result<Option<Commitment>, StoreError> {
        Ok(self
            .commitments
            .lock()
            .expect("store mutex poisoned")
            .get(&id)
            .cloned())
    }

    async fn create(&self, commitment: Commitment) -> Result<Commitment, StoreError> {
        let mut guard = self.commitments.lock().expect("store mutex poisoned");
        if guard.contains_key(&commitment.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(commitment.id, commitment.clone());
        Ok(commitment)
    }

    async fn by_employer(&self, account: AccountId) -> Result<Vec<Commitment>, StoreError> {
        Ok(self
            .commitments
            .lock()
            .expect("store mutex poisoned")
            .values()
            .filter(|c| c.employer_account_id == account)
            .cloned()
            .collect())
    }

    async fn by_provider(&self, provider: ProviderId) -> Result<Vec<Commitment>, StoreError> {
        Ok(self
            .commitments
            .lock()
            .expect("store mutex poisoned")
            .values()
            .filter(|c| c.provider_id == Some(provider))
            .cloned()
            .collect())
    }

    async fn get_apprenticeship(
        &self,
        id: ApprenticeshipId,
    ) -> Result<Option<Apprenticeship>, StoreError> {
        Ok(self.apprenticeship_snapshot(id))
    }

    async fn create_apprenticeship(
        &self,
        mut apprenticeship: Apprenticeship,
    ) -> Result<Apprenticeship, StoreError> {
        apprenticeship.id =
            ApprenticeshipId(self.sequence.fetch_add(1, Ordering::Relaxed) + 1);
        self.put_apprenticeship(apprenticeship.clone())?;
        Ok(apprenticeship)
    }

    async fn update_apprenticeship(
        &self,
        apprenticeship: Apprenticeship,
    ) -> Result<(), StoreError> {
        if self.apprenticeship_snapshot(apprenticeship.id).is_none() {
            return Err(StoreError::NotFound);
        }
        self.put_apprenticeship(apprenticeship)
    }

    async fn update_apprenticeship_statuses(
        &self,
        commitment_id: CommitmentId,
        apprenticeship_id: ApprenticeshipId,
        agreement_status: AgreementStatus,
        payment_status: PaymentStatus,
    ) -> Result<(), StoreError> {
        let mut guard = self.commitments.lock().expect("store mutex poisoned");
        let commitment = guard.get_mut(&commitment_id).ok_or(StoreError::NotFound)?;
        let apprenticeship = commitment
            .apprenticeships
            .iter_mut()
            .find(|a| a.id == apprenticeship_id)
            .ok_or(StoreError::NotFound)?;
        apprenticeship.agreement_status = agreement_status;
        apprenticeship.payment_status = payment_status;
        Ok(())
    }

    async fn update_review_state(
        &self,
        id: CommitmentId,
        state: CommitmentReviewState,
    ) -> Result<(), StoreError> {
        let mut guard = self.commitments.lock().expect("store mutex poisoned");
        let commitment = guard.get_mut(&id).ok_or(StoreError::NotFound)?;
        commitment.commitment_status = state.commitment_status;
        commitment.edit_status = state.edit_status;
        commitment.last_action = state.last_action;
        commitment.last_updated_by = Some(state.updated_by);
        if let Some(message) = state.message {
            commitment.messages.push(message);
        }
        Ok(())
    }

    async fn insert_price_history(
        &self,
        _apprenticeship_id: ApprenticeshipId,
        entries: Vec<PriceHistoryEntry>,
    ) -> Result<(), StoreError> {
        self.price_history
            .lock()
            .expect("store mutex poisoned")
            .extend(entries);
        Ok(())
    }

    async fn delete(&self, id: CommitmentId) -> Result<(), StoreError> {
        let mut guard = self.commitments.lock().expect("store mutex poisoned");
        let commitment = guard.get_mut(&id).ok_or(StoreError::NotFound)?;
        commitment.commitment_status = CommitmentStatus::Deleted;
        Ok(())
    }
}

#[async_trait]
impl ApprenticeshipUpdateStore for InMemoryStore {
    async fn get_pending(
        &self,
        apprenticeship_id: ApprenticeshipId,
    ) -> Result<Option<ApprenticeshipUpdate>, StoreError> {
        Ok(self
            .pending
            .lock()
            .expect("store mutex poisoned")
            .get(&apprenticeship_id)
            .cloned())
    }

    async fn create(
        &self,
        pending: Option<ApprenticeshipUpdate>,
        immediate: Option<Apprenticeship>,
    ) -> Result<(), StoreError> {
        if let Some(apprenticeship) = immediate {
            self.put_apprenticeship(apprenticeship)?;
        }
        if let Some(mut update) = pending {
            update.id = Some(ApprenticeshipUpdateId(
                self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            ));
            let mut apprenticeship = self
                .apprenticeship_snapshot(update.apprenticeship_id)
                .ok_or(StoreError::NotFound)?;
            apprenticeship.pending_update_originator = Some(update.originator);
            self.put_apprenticeship(apprenticeship)?;
            self.pending
                .lock()
                .expect("store mutex poisoned")
                .insert(update.apprenticeship_id, update);
        }
        Ok(())
    }

    async fn approve(
        &self,
        update: &ApprenticeshipUpdate,
        apprenticeship: &Apprenticeship,
        _user_id: &str,
    ) -> Result<(), StoreError> {
        self.pending
            .lock()
            .expect("store mutex poisoned")
            .remove(&update.apprenticeship_id);
        self.put_apprenticeship(apprenticeship.clone())
    }

    async fn reject(
        &self,
        update: &ApprenticeshipUpdate,
        _user_id: &str,
    ) -> Result<(), StoreError> {
        self.discard_pending(update.apprenticeship_id)
    }

    async fn undo(&self, update: &ApprenticeshipUpdate, _user_id: &str) -> Result<(), StoreError> {
        self.discard_pending(update.apprenticeship_id)
    }
}

#[async_trait]
impl DataLockStore for InMemoryStore {
    async fn get_by_event_id(
        &self,
        event_id: DataLockEventId,
    ) -> Result<Option<DataLockStatus>, StoreError> {
        Ok(self
            .locks
            .lock()
            .expect("store mutex poisoned")
            .iter()
            .find(|l| l.data_lock_event_id == event_id)
            .cloned())
    }

    async fn for_apprenticeship(
        &self,
        apprenticeship_id: ApprenticeshipId,
    ) -> Result<Vec<DataLockStatus>, StoreError> {
        Ok(self
            .locks
            .lock()
            .expect("store mutex poisoned")
            .iter()
            .filter(|l| l.apprenticeship_id == apprenticeship_id)
            .cloned()
            .collect())
    }

    async fn update_triage_status(
        &self,
        event_id: DataLockEventId,
        status: TriageStatus,
        generated_update: Option<ApprenticeshipUpdate>,
    ) -> Result<(), StoreError> {
        {
            let mut guard = self.locks.lock().expect("store mutex poisoned");
            let lock = guard
                .iter_mut()
                .find(|l| l.data_lock_event_id == event_id)
                .ok_or(StoreError::NotFound)?;
            lock.triage_status = status;
        }
        if let Some(update) = generated_update {
            ApprenticeshipUpdateStore::create(self, Some(update), None).await?;
        }
        Ok(())
    }

    async fn resolve(&self, event_ids: Vec<DataLockEventId>) -> Result<(), StoreError> {
        let mut guard = self.locks.lock().expect("store mutex poisoned");
        for lock in guard.iter_mut() {
            if event_ids.contains(&lock.data_lock_event_id) {
                lock.is_resolved = true;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn insert_history(&self, items: Vec<HistoryItem>) -> Result<(), StoreError> {
        self.history
            .lock()
            .expect("store mutex poisoned")
            .extend(items);
        Ok(())
    }
}

/// Overlap checks run against the same store: two windows for one learner
/// collide when they intersect and belong to different apprenticeships.
#[async_trait]
impl OverlapChecker for InMemoryStore {
    async fn overlapping(
        &self,
        request: OverlapRequest,
    ) -> Result<Vec<OverlapSummary>, StoreError> {
        Ok(self
            .commitments
            .lock()
            .expect("store mutex poisoned")
            .values()
            .flat_map(|c| c.apprenticeships.iter())
            .filter(|a| a.id != request.apprenticeship_id)
            .filter(|a| a.uln.as_deref() == Some(request.uln.as_str()))
            .filter_map(|a| match (a.start_date, a.end_date) {
                (Some(start), Some(end))
                    if start <= request.end_date && request.start_date <= end =>
                {
                    Some(OverlapSummary {
                        apprenticeship_id: a.id,
                        uln: request.uln.clone(),
                        start_date: start,
                        end_date: end,
                    })
                }
                _ => None,
            })
            .collect())
    }
}

/// Serving default for the outbound event seam: downstream consumers are
/// wired per deployment, so events are surfaced in the logs.
#[derive(Default)]
pub(crate) struct LoggingEventPublisher;

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(
        &self,
        commitment: &Commitment,
        apprenticeship: &Apprenticeship,
        event: &str,
    ) -> Result<(), EventError> {
        info!(
            commitment_id = %commitment.id,
            apprenticeship_id = %apprenticeship.id,
            event,
            "domain event"
        );
        Ok(())
    }
}
