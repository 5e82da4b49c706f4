use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::workflows::commitments::domain::{
    AccountId, AgreementStatus, Apprenticeship, ApprenticeshipId, Caller, Commitment,
    CommitmentId, CommitmentStatus, EditStatus, LastAction, PaymentStatus, PriceHistoryEntry,
    ProviderId, TrainingType, UserInfo,
};
use crate::workflows::commitments::history::{HistoryItem, HistoryStore};
use crate::workflows::commitments::repository::{
    CommitmentReviewState, CommitmentStore, EventError, EventPublisher, OverlapChecker,
    OverlapRequest, OverlapSummary, StoreError,
};
use crate::workflows::commitments::service::CommitmentAgreementService;
use crate::workflows::Clock;

pub(crate) const EMPLOYER: AccountId = AccountId(5001);
pub(crate) const PROVIDER: ProviderId = ProviderId(20001);

pub(crate) fn employer_caller() -> Caller {
    Caller::Employer(EMPLOYER)
}

pub(crate) fn provider_caller() -> Caller {
    Caller::Provider(PROVIDER)
}

pub(crate) fn user() -> UserInfo {
    UserInfo {
        user_id: "user-1".to_string(),
        display_name: "Pat Reviewer".to_string(),
    }
}

pub(crate) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(crate) fn bare_apprenticeship(id: ApprenticeshipId) -> Apprenticeship {
    Apprenticeship {
        id,
        commitment_id: CommitmentId(77),
        employer_account_id: EMPLOYER,
        provider_id: PROVIDER,
        first_name: "Jess".to_string(),
        last_name: "Morgan".to_string(),
        date_of_birth: Some(date(1999, 3, 14)),
        ni_number: Some("QQ123456C".to_string()),
        uln: Some("1000000001".to_string()),
        training_type: TrainingType::Standard,
        training_code: Some("91".to_string()),
        training_name: Some("Software Developer".to_string()),
        cost: Some(Decimal::from(12_000u32)),
        start_date: Some(date(2017, 9, 1)),
        end_date: Some(date(2019, 8, 31)),
        employer_ref: None,
        provider_ref: None,
        payment_status: PaymentStatus::PendingApproval,
        agreement_status: AgreementStatus::NotAgreed,
        pending_update_originator: None,
        data_lock_triage_status: None,
        has_had_data_lock_success: false,
    }
}

pub(crate) fn bare_commitment(id: CommitmentId) -> Commitment {
    Commitment {
        id,
        reference: format!("CMT-{}", id.0),
        employer_account_id: EMPLOYER,
        legal_entity_id: "LE-9".to_string(),
        legal_entity_name: "Morgan Fabrication Ltd".to_string(),
        provider_id: Some(PROVIDER),
        provider_name: Some("Riverside Training".to_string()),
        commitment_status: CommitmentStatus::New,
        edit_status: EditStatus::Both,
        last_action: LastAction::None,
        last_updated_by: None,
        apprenticeships: Vec::new(),
        messages: Vec::new(),
    }
}

/// A commitment holding one apprenticeship, both under the default ids.
pub(crate) fn seeded_commitment() -> Commitment {
    let mut commitment = bare_commitment(CommitmentId(77));
    commitment
        .apprenticeships
        .push(bare_apprenticeship(ApprenticeshipId(401)));
    commitment
}

pub(crate) struct FixedClock(pub(crate) NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

pub(crate) fn fixed_clock(year: i32, month: u32, day: u32) -> Arc<FixedClock> {
    Arc::new(FixedClock(date(year, month, day)))
}

#[derive(Default)]
pub(crate) struct MemoryCommitmentStore {
    commitments: Mutex<HashMap<CommitmentId, Commitment>>,
    apprenticeship_sequence: AtomicI64,
    price_history: Mutex<Vec<PriceHistoryEntry>>,
    price_history_insert_calls: AtomicUsize,
    review_states: Mutex<Vec<(CommitmentId, CommitmentReviewState)>>,
}

impl MemoryCommitmentStore {
    pub(crate) fn seed(&self, commitment: Commitment) {
        self.commitments
            .lock()
            .expect("store mutex poisoned")
            .insert(commitment.id, commitment);
    }

    pub(crate) fn commitment(&self, id: CommitmentId) -> Option<Commitment> {
        self.commitments
            .lock()
            .expect("store mutex poisoned")
            .get(&id)
            .cloned()
    }

    pub(crate) fn apprenticeship(&self, id: ApprenticeshipId) -> Option<Apprenticeship> {
        self.commitments
            .lock()
            .expect("store mutex poisoned")
            .values()
            .flat_map(|c| c.apprenticeships.iter())
            .find(|a| a.id == id)
            .cloned()
    }

    pub(crate) fn price_history(&self) -> Vec<PriceHistoryEntry> {
        self.price_history
            .lock()
            .expect("store mutex poisoned")
            .clone()
    }

    pub(crate) fn price_history_insert_calls(&self) -> usize {
        self.price_history_insert_calls.load(Ordering::Relaxed)
    }

    pub(crate) fn review_states(&self) -> Vec<(CommitmentId, CommitmentReviewState)> {
        self.review_states
            .lock()
            .expect("store mutex poisoned")
            .clone()
    }

    pub(crate) fn last_review_state(&self) -> Option<CommitmentReviewState> {
        self.review_states().last().map(|(_, state)| state.clone())
    }

    pub(crate) fn put_apprenticeship(&self, apprenticeship: Apprenticeship) {
        let mut guard = self.commitments.lock().expect("store mutex poisoned");
        let commitment = guard
            .get_mut(&apprenticeship.commitment_id)
            .expect("seeded commitment exists");
        match commitment
            .apprenticeships
            .iter_mut()
            .find(|a| a.id == apprenticeship.id)
        {
            Some(existing) => *existing = apprenticeship,
            None => commitment.apprenticeships.push(apprenticeship),
        }
    }
}

#[async_trait]
impl CommitmentStore for MemoryCommitmentStore {
    async fn get_by_id(&self, id: CommitmentId) -> Result<Option<Commitment>, StoreError> {
        Ok(self.commitment(id))
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
        Ok(self.apprenticeship(id))
    }

    async fn create_apprenticeship(
        &self,
        mut apprenticeship: Apprenticeship,
    ) -> Result<Apprenticeship, StoreError> {
        let next = 9000 + self.apprenticeship_sequence.fetch_add(1, Ordering::Relaxed);
        apprenticeship.id = ApprenticeshipId(next);
        self.put_apprenticeship(apprenticeship.clone());
        Ok(apprenticeship)
    }

    async fn update_apprenticeship(
        &self,
        apprenticeship: Apprenticeship,
    ) -> Result<(), StoreError> {
        if self.apprenticeship(apprenticeship.id).is_none() {
            return Err(StoreError::NotFound);
        }
        self.put_apprenticeship(apprenticeship);
        Ok(())
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
        commitment.last_updated_by = Some(state.updated_by.clone());
        if let Some(message) = state.message.clone() {
            commitment.messages.push(message);
        }
        drop(guard);
        self.review_states
            .lock()
            .expect("store mutex poisoned")
            .push((id, state));
        Ok(())
    }

    async fn insert_price_history(
        &self,
        _apprenticeship_id: ApprenticeshipId,
        entries: Vec<PriceHistoryEntry>,
    ) -> Result<(), StoreError> {
        self.price_history_insert_calls.fetch_add(1, Ordering::Relaxed);
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

#[derive(Default)]
pub(crate) struct MemoryHistoryStore {
    items: Mutex<Vec<HistoryItem>>,
    insert_calls: AtomicUsize,
}

impl MemoryHistoryStore {
    pub(crate) fn items(&self) -> Vec<HistoryItem> {
        self.items.lock().expect("history mutex poisoned").clone()
    }

    pub(crate) fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn insert_history(&self, items: Vec<HistoryItem>) -> Result<(), StoreError> {
        self.insert_calls.fetch_add(1, Ordering::Relaxed);
        self.items
            .lock()
            .expect("history mutex poisoned")
            .extend(items);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MemoryEventPublisher {
    events: Mutex<Vec<(String, ApprenticeshipId)>>,
}

impl MemoryEventPublisher {
    pub(crate) fn events(&self) -> Vec<(String, ApprenticeshipId)> {
        self.events.lock().expect("event mutex poisoned").clone()
    }
}

#[async_trait]
impl EventPublisher for MemoryEventPublisher {
    async fn publish(
        &self,
        _commitment: &Commitment,
        apprenticeship: &Apprenticeship,
        event: &str,
    ) -> Result<(), EventError> {
        self.events
            .lock()
            .expect("event mutex poisoned")
            .push((event.to_string(), apprenticeship.id));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MemoryOverlapChecker {
    overlaps: Mutex<Vec<OverlapSummary>>,
    requests: Mutex<Vec<OverlapRequest>>,
}

impl MemoryOverlapChecker {
    pub(crate) fn set_overlaps(&self, overlaps: Vec<OverlapSummary>) {
        *self.overlaps.lock().expect("overlap mutex poisoned") = overlaps;
    }

    pub(crate) fn requests(&self) -> Vec<OverlapRequest> {
        self.requests.lock().expect("overlap mutex poisoned").clone()
    }
}

#[async_trait]
impl OverlapChecker for MemoryOverlapChecker {
    async fn overlapping(
        &self,
        request: OverlapRequest,
    ) -> Result<Vec<OverlapSummary>, StoreError> {
        self.requests
            .lock()
            .expect("overlap mutex poisoned")
            .push(request);
        Ok(self.overlaps.lock().expect("overlap mutex poisoned").clone())
    }
}

/// Everything the agreement service needs, with handles kept for
/// assertions.
pub(crate) struct AgreementHarness {
    pub(crate) store: Arc<MemoryCommitmentStore>,
    pub(crate) overlaps: Arc<MemoryOverlapChecker>,
    pub(crate) history: Arc<MemoryHistoryStore>,
    pub(crate) events: Arc<MemoryEventPublisher>,
    pub(crate) service: CommitmentAgreementService<
        MemoryCommitmentStore,
        MemoryOverlapChecker,
        MemoryHistoryStore,
        MemoryEventPublisher,
    >,
}

pub(crate) fn agreement_harness(clock: Arc<FixedClock>) -> AgreementHarness {
    let store = Arc::new(MemoryCommitmentStore::default());
    let overlaps = Arc::new(MemoryOverlapChecker::default());
    let history = Arc::new(MemoryHistoryStore::default());
    let events = Arc::new(MemoryEventPublisher::default());
    let service = CommitmentAgreementService::new(
        store.clone(),
        overlaps.clone(),
        history.clone(),
        events.clone(),
        clock,
    );
    AgreementHarness {
        store,
        overlaps,
        history,
        events,
        service,
    }
}

pub(crate) fn colliding(id: ApprenticeshipId) -> OverlapSummary {
    OverlapSummary {
        apprenticeship_id: id,
        uln: "1000000001".to_string(),
        start_date: date(2017, 9, 1),
        end_date: date(2019, 8, 31),
    }
}
