use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::workflows::commitments::domain::{Apprenticeship, ApprenticeshipId, Party};
use crate::workflows::commitments::repository::StoreError;
use crate::workflows::commitments::tests::common::{
    FixedClock, MemoryCommitmentStore, MemoryEventPublisher, MemoryHistoryStore,
    MemoryOverlapChecker,
};
use crate::workflows::updates::domain::{
    ApprenticeshipDiff, ApprenticeshipUpdate, ApprenticeshipUpdateId, UpdateOrigin, UpdateStatus,
};
use crate::workflows::updates::repository::ApprenticeshipUpdateStore;
use crate::workflows::updates::service::ApprenticeshipUpdateService;

/// In-memory change-request store layered over the shared commitment store
/// so pending-originator bookkeeping stays consistent.
pub(crate) struct MemoryUpdateStore {
    commitments: Arc<MemoryCommitmentStore>,
    pending: Mutex<HashMap<ApprenticeshipId, ApprenticeshipUpdate>>,
    sequence: AtomicI64,
    create_calls: AtomicUsize,
    approve_calls: AtomicUsize,
    reject_calls: AtomicUsize,
    undo_calls: AtomicUsize,
}

impl MemoryUpdateStore {
    pub(crate) fn new(commitments: Arc<MemoryCommitmentStore>) -> Self {
        Self {
            commitments,
            pending: Mutex::new(HashMap::new()),
            sequence: AtomicI64::new(1),
            create_calls: AtomicUsize::new(0),
            approve_calls: AtomicUsize::new(0),
            reject_calls: AtomicUsize::new(0),
            undo_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn pending_for(&self, id: ApprenticeshipId) -> Option<ApprenticeshipUpdate> {
        self.pending
            .lock()
            .expect("update mutex poisoned")
            .get(&id)
            .cloned()
    }

    pub(crate) fn seed_pending(&self, mut update: ApprenticeshipUpdate) {
        if update.id.is_none() {
            update.id = Some(ApprenticeshipUpdateId(
                self.sequence.fetch_add(1, Ordering::Relaxed),
            ));
        }
        if let Some(mut apprenticeship) = self.commitments.apprenticeship(update.apprenticeship_id)
        {
            apprenticeship.pending_update_originator = Some(update.originator);
            self.commitments.put_apprenticeship(apprenticeship);
        }
        self.pending
            .lock()
            .expect("update mutex poisoned")
            .insert(update.apprenticeship_id, update);
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::Relaxed)
    }

    pub(crate) fn approve_calls(&self) -> usize {
        self.approve_calls.load(Ordering::Relaxed)
    }

    pub(crate) fn reject_calls(&self) -> usize {
        self.reject_calls.load(Ordering::Relaxed)
    }

    pub(crate) fn undo_calls(&self) -> usize {
        self.undo_calls.load(Ordering::Relaxed)
    }

    fn clear_pending(&self, apprenticeship_id: ApprenticeshipId) {
        self.pending
            .lock()
            .expect("update mutex poisoned")
            .remove(&apprenticeship_id);
        if let Some(mut apprenticeship) = self.commitments.apprenticeship(apprenticeship_id) {
            apprenticeship.pending_update_originator = None;
            self.commitments.put_apprenticeship(apprenticeship);
        }
    }
}

#[async_trait]
impl ApprenticeshipUpdateStore for MemoryUpdateStore {
    async fn get_pending(
        &self,
        apprenticeship_id: ApprenticeshipId,
    ) -> Result<Option<ApprenticeshipUpdate>, StoreError> {
        Ok(self.pending_for(apprenticeship_id))
    }

    async fn create(
        &self,
        pending: Option<ApprenticeshipUpdate>,
        immediate: Option<Apprenticeship>,
    ) -> Result<(), StoreError> {
        self.create_calls.fetch_add(1, Ordering::Relaxed);

        if let Some(apprenticeship) = immediate {
            self.commitments.put_apprenticeship(apprenticeship);
        }

        if let Some(mut update) = pending {
            update.id = Some(ApprenticeshipUpdateId(
                self.sequence.fetch_add(1, Ordering::Relaxed),
            ));
            let mut apprenticeship = self
                .commitments
                .apprenticeship(update.apprenticeship_id)
                .ok_or(StoreError::NotFound)?;
            apprenticeship.pending_update_originator = Some(update.originator);
            self.commitments.put_apprenticeship(apprenticeship);
            self.pending
                .lock()
                .expect("update mutex poisoned")
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
        self.approve_calls.fetch_add(1, Ordering::Relaxed);
        self.pending
            .lock()
            .expect("update mutex poisoned")
            .remove(&update.apprenticeship_id);
        self.commitments.put_apprenticeship(apprenticeship.clone());
        Ok(())
    }

    async fn reject(
        &self,
        update: &ApprenticeshipUpdate,
        _user_id: &str,
    ) -> Result<(), StoreError> {
        self.reject_calls.fetch_add(1, Ordering::Relaxed);
        self.clear_pending(update.apprenticeship_id);
        Ok(())
    }

    async fn undo(&self, update: &ApprenticeshipUpdate, _user_id: &str) -> Result<(), StoreError> {
        self.undo_calls.fetch_add(1, Ordering::Relaxed);
        self.clear_pending(update.apprenticeship_id);
        Ok(())
    }
}

pub(crate) struct UpdateHarness {
    pub(crate) commitments: Arc<MemoryCommitmentStore>,
    pub(crate) updates: Arc<MemoryUpdateStore>,
    pub(crate) overlaps: Arc<MemoryOverlapChecker>,
    pub(crate) history: Arc<MemoryHistoryStore>,
    pub(crate) events: Arc<MemoryEventPublisher>,
    pub(crate) service: ApprenticeshipUpdateService<
        MemoryCommitmentStore,
        MemoryUpdateStore,
        MemoryOverlapChecker,
        MemoryHistoryStore,
        MemoryEventPublisher,
    >,
}

pub(crate) fn update_harness(clock: Arc<FixedClock>) -> UpdateHarness {
    let commitments = Arc::new(MemoryCommitmentStore::default());
    let updates = Arc::new(MemoryUpdateStore::new(commitments.clone()));
    let overlaps = Arc::new(MemoryOverlapChecker::default());
    let history = Arc::new(MemoryHistoryStore::default());
    let events = Arc::new(MemoryEventPublisher::default());
    let service = ApprenticeshipUpdateService::new(
        commitments.clone(),
        updates.clone(),
        overlaps.clone(),
        history.clone(),
        events.clone(),
        clock,
    );
    UpdateHarness {
        commitments,
        updates,
        overlaps,
        history,
        events,
        service,
    }
}

pub(crate) fn pending_update(
    apprenticeship_id: ApprenticeshipId,
    originator: Party,
    origin: UpdateOrigin,
    diff: ApprenticeshipDiff,
) -> ApprenticeshipUpdate {
    ApprenticeshipUpdate {
        id: None,
        apprenticeship_id,
        originator,
        status: UpdateStatus::Pending,
        origin,
        diff,
        effective_from_date: None,
        effective_to_date: None,
    }
}
