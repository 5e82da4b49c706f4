use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    AccountId, AgreementStatus, Apprenticeship, ApprenticeshipId, Commitment, CommitmentId,
    CommitmentStatus, EditStatus, LastAction, Message, PaymentStatus, PriceHistoryEntry,
    ProviderId, UpdatedBy,
};

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    Conflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Review-cycle fields written back to a commitment in one call so the
/// store can apply them atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitmentReviewState {
    pub commitment_status: CommitmentStatus,
    pub edit_status: EditStatus,
    pub last_action: LastAction,
    pub updated_by: UpdatedBy,
    pub message: Option<Message>,
}

/// Storage contract for the commitment aggregate and its apprenticeships.
#[async_trait]
pub trait CommitmentStore: Send + Sync {
    async fn get_by_id(&self, id: CommitmentId) -> Result<Option<Commitment>, StoreError>;
    async fn create(&self, commitment: Commitment) -> Result<Commitment, StoreError>;
    async fn by_employer(&self, account: AccountId) -> Result<Vec<Commitment>, StoreError>;
    async fn by_provider(&self, provider: ProviderId) -> Result<Vec<Commitment>, StoreError>;

    async fn get_apprenticeship(
        &self,
        id: ApprenticeshipId,
    ) -> Result<Option<Apprenticeship>, StoreError>;
    async fn create_apprenticeship(
        &self,
        apprenticeship: Apprenticeship,
    ) -> Result<Apprenticeship, StoreError>;
    async fn update_apprenticeship(&self, apprenticeship: Apprenticeship)
        -> Result<(), StoreError>;
    async fn update_apprenticeship_statuses(
        &self,
        commitment_id: CommitmentId,
        apprenticeship_id: ApprenticeshipId,
        agreement_status: AgreementStatus,
        payment_status: PaymentStatus,
    ) -> Result<(), StoreError>;

    async fn update_review_state(
        &self,
        id: CommitmentId,
        state: CommitmentReviewState,
    ) -> Result<(), StoreError>;

    /// Replace the apprenticeship's reconstructed cost timeline.
    async fn insert_price_history(
        &self,
        apprenticeship_id: ApprenticeshipId,
        entries: Vec<PriceHistoryEntry>,
    ) -> Result<(), StoreError>;

    /// Deletion is an explicit, audited operation; it never happens as a
    /// side effect of another write.
    async fn delete(&self, id: CommitmentId) -> Result<(), StoreError>;
}

/// Date window checked against other apprenticeships for the same learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapRequest {
    pub apprenticeship_id: ApprenticeshipId,
    pub uln: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Another apprenticeship whose training window collides with the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapSummary {
    pub apprenticeship_id: ApprenticeshipId,
    pub uln: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Companion service answering "does this learner already train elsewhere
/// in this window".
#[async_trait]
pub trait OverlapChecker: Send + Sync {
    async fn overlapping(
        &self,
        request: OverlapRequest,
    ) -> Result<Vec<OverlapSummary>, StoreError>;
}

/// Outbound domain event dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event transport unavailable: {0}")]
    Transport(String),
}

/// Downstream consumers (funding, notifications) listen for these events.
/// Publishing is fire-and-forget; a failed publish never rolls back the
/// primary mutation.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        commitment: &Commitment,
        apprenticeship: &Apprenticeship,
        event: &str,
    ) -> Result<(), EventError>;
}
