//! Commitment aggregate and its agreement workflow: the shared domain
//! model, the rules engine both parties' actions flow through, the
//! cross-cutting guards, and the audited commitment-level operations.

pub mod authorization;
pub mod domain;
pub mod history;
pub mod repository;
pub mod rules;
pub mod service;
pub mod validation;

#[cfg(test)]
pub(crate) mod tests;

pub use authorization::{require_editable, AuthorizationError, InvalidStateError};
pub use domain::{
    AccountId, AgreementStatus, Apprenticeship, ApprenticeshipId, Caller, Commitment,
    CommitmentId, CommitmentStatus, EditStatus, LastAction, Message, Party, PaymentStatus,
    PriceHistoryEntry, ProviderId, TrainingType, UpdatedBy, UserInfo,
};
pub use history::{ChangeType, EntityType, HistoryError, HistoryItem, HistoryRecorder, HistoryStore};
pub use repository::{
    CommitmentReviewState, CommitmentStore, EventError, EventPublisher, OverlapChecker,
    OverlapRequest, OverlapSummary, StoreError,
};
pub use service::{AgreementServiceError, AgreementSubmission, CommitmentAgreementService};
pub use validation::{RuleViolation, ValidationError};
