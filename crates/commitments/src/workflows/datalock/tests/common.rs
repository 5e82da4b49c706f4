use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::workflows::commitments::domain::ApprenticeshipId;
use crate::workflows::commitments::repository::StoreError;
use crate::workflows::commitments::tests::common::{
    MemoryCommitmentStore, MemoryEventPublisher,
};
use crate::workflows::datalock::domain::{
    DataLockErrorCodes, DataLockEventId, DataLockStatus, EventStatus, TriageStatus,
};
use crate::workflows::datalock::repository::DataLockStore;
use crate::workflows::datalock::service::DataLockTriageService;
use crate::workflows::updates::domain::ApprenticeshipUpdate;
use crate::workflows::updates::tests::common::MemoryUpdateStore;

#[derive(Default)]
pub(crate) struct MemoryDataLockStore {
    locks: Mutex<Vec<DataLockStatus>>,
    triage_updates: Mutex<Vec<(DataLockEventId, TriageStatus, Option<ApprenticeshipUpdate>)>>,
    resolve_calls: Mutex<Vec<Vec<DataLockEventId>>>,
}

impl MemoryDataLockStore {
    pub(crate) fn seed(&self, lock: DataLockStatus) {
        self.locks.lock().expect("lock mutex poisoned").push(lock);
    }

    pub(crate) fn lock(&self, event_id: DataLockEventId) -> Option<DataLockStatus> {
        self.locks
            .lock()
            .expect("lock mutex poisoned")
            .iter()
            .find(|l| l.data_lock_event_id == event_id)
            .cloned()
    }

    pub(crate) fn triage_updates(
        &self,
    ) -> Vec<(DataLockEventId, TriageStatus, Option<ApprenticeshipUpdate>)> {
        self.triage_updates
            .lock()
            .expect("lock mutex poisoned")
            .clone()
    }

    pub(crate) fn resolve_calls(&self) -> Vec<Vec<DataLockEventId>> {
        self.resolve_calls
            .lock()
            .expect("lock mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl DataLockStore for MemoryDataLockStore {
    async fn get_by_event_id(
        &self,
        event_id: DataLockEventId,
    ) -> Result<Option<DataLockStatus>, StoreError> {
        Ok(self.lock(event_id))
    }

    async fn for_apprenticeship(
        &self,
        apprenticeship_id: ApprenticeshipId,
    ) -> Result<Vec<DataLockStatus>, StoreError> {
        Ok(self
            .locks
            .lock()
            .expect("lock mutex poisoned")
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
            let mut guard = self.locks.lock().expect("lock mutex poisoned");
            let lock = guard
                .iter_mut()
                .find(|l| l.data_lock_event_id == event_id)
                .ok_or(StoreError::NotFound)?;
            lock.triage_status = status;
        }
        self.triage_updates
            .lock()
            .expect("lock mutex poisoned")
            .push((event_id, status, generated_update));
        Ok(())
    }

    async fn resolve(&self, event_ids: Vec<DataLockEventId>) -> Result<(), StoreError> {
        {
            let mut guard = self.locks.lock().expect("lock mutex poisoned");
            for lock in guard.iter_mut() {
                if event_ids.contains(&lock.data_lock_event_id) {
                    lock.is_resolved = true;
                }
            }
        }
        self.resolve_calls
            .lock()
            .expect("lock mutex poisoned")
            .push(event_ids);
        Ok(())
    }
}

pub(crate) struct TriageHarness {
    pub(crate) commitments: Arc<MemoryCommitmentStore>,
    pub(crate) locks: Arc<MemoryDataLockStore>,
    pub(crate) updates: Arc<MemoryUpdateStore>,
    pub(crate) events: Arc<MemoryEventPublisher>,
    pub(crate) service: DataLockTriageService<
        MemoryCommitmentStore,
        MemoryDataLockStore,
        MemoryUpdateStore,
        MemoryEventPublisher,
    >,
}

pub(crate) fn triage_harness() -> TriageHarness {
    let commitments = Arc::new(MemoryCommitmentStore::default());
    let locks = Arc::new(MemoryDataLockStore::default());
    let updates = Arc::new(MemoryUpdateStore::new(commitments.clone()));
    let events = Arc::new(MemoryEventPublisher::default());
    let service = DataLockTriageService::new(
        commitments.clone(),
        locks.clone(),
        updates.clone(),
        events.clone(),
    );
    TriageHarness {
        commitments,
        locks,
        updates,
        events,
        service,
    }
}

pub(crate) fn failed_lock(
    event_id: i64,
    codes: DataLockErrorCodes,
    cost: Option<u32>,
    effective_from: Option<NaiveDate>,
) -> DataLockStatus {
    DataLockStatus {
        data_lock_event_id: DataLockEventId(event_id),
        apprenticeship_id: ApprenticeshipId(401),
        error_codes: codes,
        status: EventStatus::Fail,
        triage_status: TriageStatus::Unknown,
        is_resolved: false,
        ilr_total_cost: cost.map(|c| Decimal::from(c)),
        ilr_effective_from_date: effective_from,
        ilr_actual_start_date: None,
        apprenticeship_update_id: None,
    }
}
