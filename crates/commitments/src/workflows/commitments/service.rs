use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use super::authorization::{require_editable, AuthorizationError, InvalidStateError};
use super::domain::{
    AccountId, AgreementStatus, Apprenticeship, ApprenticeshipId, Caller, Commitment,
    CommitmentId, LastAction, Message, PaymentStatus, ProviderId, UpdatedBy, UserInfo,
};
use super::history::{ChangeType, HistoryError, HistoryRecorder, HistoryStore};
use super::repository::{
    CommitmentReviewState, CommitmentStore, EventPublisher, OverlapChecker, OverlapRequest,
    StoreError,
};
use super::rules;
use super::validation::{
    self, check_cost, check_date_order, check_name, check_uln, RuleViolation, ValidationError,
};
use crate::workflows::Clock;

/// Error raised by commitment-level operations.
#[derive(Debug, thiserror::Error)]
pub enum AgreementServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// One party's review verdict over the whole commitment, optionally with a
/// message to the counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgreementSubmission {
    pub action: LastAction,
    pub message: Option<String>,
}

/// Service owning the commitment aggregate: review cycles, apprenticeship
/// create/update, payment-status changes, and deletion.
pub struct CommitmentAgreementService<S, O, H, E> {
    store: Arc<S>,
    overlaps: Arc<O>,
    history: Arc<H>,
    events: Arc<E>,
    clock: Arc<dyn Clock>,
}

impl<S, O, H, E> CommitmentAgreementService<S, O, H, E>
where
    S: CommitmentStore + 'static,
    O: OverlapChecker + 'static,
    H: HistoryStore + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(
        store: Arc<S>,
        overlaps: Arc<O>,
        history: Arc<H>,
        events: Arc<E>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            overlaps,
            history,
            events,
            clock,
        }
    }

    /// Fetch a commitment the caller is entitled to see. Absence is a
    /// successful empty result, not an error.
    pub async fn get_commitment(
        &self,
        caller: Caller,
        id: CommitmentId,
    ) -> Result<Option<Commitment>, AgreementServiceError> {
        match self.store.get_by_id(id).await? {
            None => Ok(None),
            Some(commitment) => {
                caller.authorize_commitment(&commitment)?;
                Ok(Some(commitment))
            }
        }
    }

    pub async fn commitments_for_employer(
        &self,
        account: AccountId,
    ) -> Result<Vec<Commitment>, AgreementServiceError> {
        Ok(self.store.by_employer(account).await?)
    }

    pub async fn commitments_for_provider(
        &self,
        provider: ProviderId,
    ) -> Result<Vec<Commitment>, AgreementServiceError> {
        Ok(self.store.by_provider(provider).await?)
    }

    pub async fn get_apprenticeship(
        &self,
        caller: Caller,
        id: ApprenticeshipId,
    ) -> Result<Option<Apprenticeship>, AgreementServiceError> {
        match self.store.get_apprenticeship(id).await? {
            None => Ok(None),
            Some(apprenticeship) => {
                caller.authorize_apprenticeship(&apprenticeship)?;
                Ok(Some(apprenticeship))
            }
        }
    }

    /// The bulk review: one party approves, rejects, or amends the whole
    /// commitment. Every apprenticeship's statuses are recomputed through
    /// the rules engine, then the commitment's own review state follows.
    pub async fn update_agreement(
        &self,
        caller: Caller,
        user: UserInfo,
        commitment_id: CommitmentId,
        submission: AgreementSubmission,
    ) -> Result<(), AgreementServiceError> {
        info!(
            commitment_id = %commitment_id,
            role = %caller.party(),
            action = ?submission.action,
            "agreement review submitted"
        );

        if submission.action == LastAction::None {
            return Err(ValidationError::single(
                "action",
                "an agreement review must approve, reject, or amend",
            )
            .into());
        }

        let commitment = self
            .store
            .get_by_id(commitment_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        require_editable(&commitment)?;
        caller.authorize_commitment(&commitment)?;
        caller.require_edit_rights(&commitment)?;

        let mut any_pending = false;
        for apprenticeship in &commitment.apprenticeships {
            let new_agreement = match submission.action {
                LastAction::Approve => rules::agreement_status_after_approval(
                    apprenticeship.agreement_status,
                    caller.party(),
                ),
                LastAction::Reject => rules::agreement_status_after_rejection(
                    apprenticeship.agreement_status,
                    caller.party(),
                ),
                _ => rules::next_agreement_status(
                    apprenticeship.agreement_status,
                    caller.party(),
                    true,
                ),
            };
            let new_payment =
                rules::next_payment_status(apprenticeship.payment_status, new_agreement);

            if new_agreement != apprenticeship.agreement_status
                || new_payment != apprenticeship.payment_status
            {
                self.store
                    .update_apprenticeship_statuses(
                        commitment_id,
                        apprenticeship.id,
                        new_agreement,
                        new_payment,
                    )
                    .await?;

                let mut updated = apprenticeship.clone();
                updated.agreement_status = new_agreement;
                updated.payment_status = new_payment;
                self.publish(&commitment, &updated, "APPRENTICESHIP-AGREEMENT-UPDATED")
                    .await;
            }

            if !new_agreement.is_both_agreed() {
                any_pending = true;
            }
        }

        let message = submission.message.map(|text| Message {
            author: user.display_name.clone(),
            text,
            created_on: Utc::now(),
        });

        self.store
            .update_review_state(
                commitment_id,
                CommitmentReviewState {
                    commitment_status: rules::next_commitment_status(any_pending),
                    edit_status: rules::next_edit_status(caller.party(), any_pending),
                    last_action: submission.action,
                    updated_by: UpdatedBy::from_caller(&caller, &user),
                    message,
                },
            )
            .await?;
        Ok(())
    }

    /// Replace an apprenticeship's editable fields in one write. Material
    /// changes restart the agreement cycle for that record.
    pub async fn update_apprenticeship(
        &self,
        caller: Caller,
        user: UserInfo,
        commitment_id: CommitmentId,
        updated: Apprenticeship,
    ) -> Result<(), AgreementServiceError> {
        validate_apprenticeship(&updated)?;

        let commitment = self
            .store
            .get_by_id(commitment_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        require_editable(&commitment)?;
        caller.authorize_commitment(&commitment)?;
        caller.require_edit_rights(&commitment)?;

        let current = commitment
            .apprenticeship(updated.id)
            .cloned()
            .ok_or(StoreError::NotFound)?;

        if current.has_started(self.clock.today()) && updated.uln != current.uln {
            return Err(ValidationError::single(
                "uln",
                "the learner number cannot change once training has started",
            )
            .into());
        }

        self.check_overlaps(&updated).await?;

        let requires = rules::change_requires_agreement(&current, &updated);
        let new_agreement =
            rules::next_agreement_status(current.agreement_status, caller.party(), requires);
        let new_payment = rules::next_payment_status(current.payment_status, new_agreement);

        let mut stored = updated;
        // Ownership and workflow bookkeeping are never writable through the
        // update payload.
        stored.commitment_id = current.commitment_id;
        stored.employer_account_id = current.employer_account_id;
        stored.provider_id = current.provider_id;
        stored.pending_update_originator = current.pending_update_originator;
        stored.data_lock_triage_status = current.data_lock_triage_status;
        stored.has_had_data_lock_success = current.has_had_data_lock_success;
        stored.agreement_status = new_agreement;
        stored.payment_status = new_payment;

        let mut recorder = HistoryRecorder::new(UpdatedBy::from_caller(&caller, &user));
        recorder.track_commitment(ChangeType::EditedApprenticeship, &commitment, &commitment)?;
        recorder.track_apprenticeship(ChangeType::Updated, &current, &stored)?;

        self.store.update_apprenticeship(stored.clone()).await?;

        let any_pending = commitment
            .apprenticeships
            .iter()
            .map(|a| if a.id == stored.id { &stored } else { a })
            .any(Apprenticeship::pending_agreement);

        self.store
            .update_review_state(
                commitment_id,
                CommitmentReviewState {
                    commitment_status: rules::next_commitment_status(any_pending),
                    edit_status: rules::next_edit_status(caller.party(), any_pending),
                    last_action: if requires {
                        LastAction::AmendAndReply
                    } else {
                        commitment.last_action
                    },
                    updated_by: UpdatedBy::from_caller(&caller, &user),
                    message: None,
                },
            )
            .await?;

        recorder.save(self.history.as_ref()).await?;
        self.publish(&commitment, &stored, "APPRENTICESHIP-UPDATED").await;
        Ok(())
    }

    /// Add an apprenticeship to a commitment under negotiation. New records
    /// always start unagreed and unfunded.
    pub async fn create_apprenticeship(
        &self,
        caller: Caller,
        user: UserInfo,
        commitment_id: CommitmentId,
        apprenticeship: Apprenticeship,
    ) -> Result<Apprenticeship, AgreementServiceError> {
        validate_apprenticeship(&apprenticeship)?;

        let commitment = self
            .store
            .get_by_id(commitment_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        require_editable(&commitment)?;
        caller.authorize_commitment(&commitment)?;
        caller.require_edit_rights(&commitment)?;

        self.check_overlaps(&apprenticeship).await?;

        let mut record = apprenticeship;
        record.commitment_id = commitment_id;
        record.employer_account_id = commitment.employer_account_id;
        record.provider_id = commitment
            .provider_id
            .ok_or_else(|| {
                ValidationError::single(
                    "provider_id",
                    "apprenticeships cannot be added before a provider is assigned",
                )
            })?;
        record.payment_status = PaymentStatus::PendingApproval;
        record.agreement_status = AgreementStatus::NotAgreed;
        record.pending_update_originator = None;
        record.data_lock_triage_status = None;
        record.has_had_data_lock_success = false;

        let created = self.store.create_apprenticeship(record).await?;

        let mut recorder = HistoryRecorder::new(UpdatedBy::from_caller(&caller, &user));
        recorder.track_commitment(ChangeType::EditedApprenticeship, &commitment, &commitment)?;
        recorder.track_apprenticeship_created(&created)?;

        self.store
            .update_review_state(
                commitment_id,
                CommitmentReviewState {
                    commitment_status: rules::next_commitment_status(true),
                    edit_status: rules::next_edit_status(caller.party(), true),
                    last_action: LastAction::AmendAndReply,
                    updated_by: UpdatedBy::from_caller(&caller, &user),
                    message: None,
                },
            )
            .await?;

        recorder.save(self.history.as_ref()).await?;
        self.publish(&commitment, &created, "APPRENTICESHIP-CREATED").await;
        Ok(created)
    }

    /// Pause, resume, or stop a funded apprenticeship. The date of change
    /// is validated against the training window and the current date.
    pub async fn change_payment_status(
        &self,
        caller: Caller,
        user: UserInfo,
        apprenticeship_id: ApprenticeshipId,
        new_status: PaymentStatus,
        date_of_change: NaiveDate,
    ) -> Result<(), AgreementServiceError> {
        let apprenticeship = self
            .store
            .get_apprenticeship(apprenticeship_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        caller.authorize_apprenticeship(&apprenticeship)?;

        let commitment = self
            .store
            .get_by_id(apprenticeship.commitment_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        require_editable(&commitment)?;

        self.validate_status_change(&apprenticeship, new_status, date_of_change)?;

        let mut updated = apprenticeship.clone();
        updated.payment_status = new_status;

        let mut recorder = HistoryRecorder::new(UpdatedBy::from_caller(&caller, &user));
        recorder.track_apprenticeship(ChangeType::ChangeOfStatus, &apprenticeship, &updated)?;

        self.store
            .update_apprenticeship_statuses(
                commitment.id,
                apprenticeship_id,
                apprenticeship.agreement_status,
                new_status,
            )
            .await?;
        recorder.save(self.history.as_ref()).await?;

        self.publish(&commitment, &updated, "APPRENTICESHIP-STATUS-CHANGED").await;
        info!(
            apprenticeship_id = %apprenticeship_id,
            payment_status = %new_status,
            "payment status changed"
        );
        Ok(())
    }

    /// Remove a commitment that never reached funding. Deletion is audited
    /// and refused once any apprenticeship has left pending approval.
    pub async fn delete_commitment(
        &self,
        caller: Caller,
        user: UserInfo,
        commitment_id: CommitmentId,
    ) -> Result<(), AgreementServiceError> {
        let commitment = self
            .store
            .get_by_id(commitment_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        require_editable(&commitment)?;
        caller.authorize_commitment(&commitment)?;
        caller.require_edit_rights(&commitment)?;

        if commitment
            .apprenticeships
            .iter()
            .any(|a| a.payment_status != PaymentStatus::PendingApproval)
        {
            return Err(ValidationError::single(
                "commitment",
                format!(
                    "commitment {commitment_id} has funded apprenticeships and cannot be deleted"
                ),
            )
            .into());
        }

        let mut recorder = HistoryRecorder::new(UpdatedBy::from_caller(&caller, &user));
        recorder.track_commitment_deleted(&commitment)?;

        self.store.delete(commitment_id).await?;
        recorder.save(self.history.as_ref()).await?;
        info!(commitment_id = %commitment_id, role = %caller.party(), "commitment deleted");
        Ok(())
    }

    fn validate_status_change(
        &self,
        apprenticeship: &Apprenticeship,
        new_status: PaymentStatus,
        date_of_change: NaiveDate,
    ) -> Result<(), AgreementServiceError> {
        match apprenticeship.payment_status {
            PaymentStatus::PendingApproval => {
                return Err(ValidationError::single(
                    "payment_status",
                    "payment status cannot change until both parties have approved the apprenticeship",
                )
                .into());
            }
            PaymentStatus::Completed | PaymentStatus::Deleted => {
                return Err(ValidationError::single(
                    "payment_status",
                    format!(
                        "payment status can no longer change from {}",
                        apprenticeship.payment_status
                    ),
                )
                .into());
            }
            _ => {}
        }

        let today = self.clock.today();
        let mut violations = Vec::new();
        match new_status {
            PaymentStatus::Withdrawn => {
                if apprenticeship.is_waiting_to_start(today) {
                    if Some(date_of_change) != apprenticeship.start_date {
                        violations.push(RuleViolation::new(
                            "date_of_change",
                            "a stop before training starts must use the training start date",
                        ));
                    }
                } else {
                    if date_of_change > today {
                        violations.push(RuleViolation::new(
                            "date_of_change",
                            "date of change must not be in the future",
                        ));
                    }
                    if let Some(start) = apprenticeship.start_date {
                        if date_of_change < start {
                            violations.push(RuleViolation::new(
                                "date_of_change",
                                "date of change must not precede the training start date",
                            ));
                        }
                    }
                }
            }
            PaymentStatus::Active | PaymentStatus::Paused => {
                if date_of_change != today {
                    violations.push(RuleViolation::new(
                        "date_of_change",
                        "a pause or resume takes effect from today only",
                    ));
                }
            }
            other => {
                violations.push(RuleViolation::new(
                    "payment_status",
                    format!("{other} is not a valid value for a change of status"),
                ));
            }
        }

        Ok(validation::finish(violations)?)
    }

    async fn check_overlaps(
        &self,
        apprenticeship: &Apprenticeship,
    ) -> Result<(), AgreementServiceError> {
        let (Some(uln), Some(start_date), Some(end_date)) = (
            apprenticeship.uln.clone(),
            apprenticeship.start_date,
            apprenticeship.end_date,
        ) else {
            return Ok(());
        };

        let overlaps = self
            .overlaps
            .overlapping(OverlapRequest {
                apprenticeship_id: apprenticeship.id,
                uln,
                start_date,
                end_date,
            })
            .await?;

        if overlaps.is_empty() {
            return Ok(());
        }

        let ids = overlaps
            .iter()
            .map(|o| o.apprenticeship_id.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(ValidationError::single(
            "apprenticeship",
            format!("training window overlaps apprenticeship(s) {ids}"),
        )
        .into())
    }

    async fn publish(&self, commitment: &Commitment, apprenticeship: &Apprenticeship, event: &str) {
        if let Err(err) = self.events.publish(commitment, apprenticeship, event).await {
            warn!(
                apprenticeship_id = %apprenticeship.id,
                event,
                error = %err,
                "failed to publish domain event"
            );
        }
    }
}

fn validate_apprenticeship(apprenticeship: &Apprenticeship) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    check_name(&mut violations, "first_name", &apprenticeship.first_name);
    check_name(&mut violations, "last_name", &apprenticeship.last_name);
    if let Some(uln) = apprenticeship.uln.as_deref() {
        check_uln(&mut violations, uln);
    }
    if let Some(cost) = apprenticeship.cost {
        check_cost(&mut violations, cost);
    }
    check_date_order(
        &mut violations,
        apprenticeship.start_date,
        apprenticeship.end_date,
    );
    validation::finish(violations)
}
