use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use super::domain::{
    ApprenticeshipUpdate, NewApprenticeshipUpdate, UpdateOrigin, UpdateResolution, UpdateStatus,
};
use super::repository::ApprenticeshipUpdateStore;
use crate::workflows::commitments::authorization::{
    require_editable, AuthorizationError, InvalidStateError,
};
use crate::workflows::commitments::domain::{
    Apprenticeship, ApprenticeshipId, Caller, Commitment, Party, UpdatedBy, UserInfo,
};
use crate::workflows::commitments::history::{
    ChangeType, HistoryError, HistoryRecorder, HistoryStore,
};
use crate::workflows::commitments::repository::{
    CommitmentStore, EventPublisher, OverlapChecker, OverlapRequest, StoreError,
};
use crate::workflows::commitments::rules;
use crate::workflows::commitments::validation::{
    self, check_cost, check_date_order, check_name, check_uln, RuleViolation, ValidationError,
};
use crate::workflows::Clock;

/// Error raised by the change-request workflow.
#[derive(Debug, thiserror::Error)]
pub enum UpdateServiceError {
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

/// Service running the pending-change state machine: create a change
/// request, then approve, reject, or undo it.
pub struct ApprenticeshipUpdateService<S, U, O, H, E> {
    commitments: Arc<S>,
    updates: Arc<U>,
    overlaps: Arc<O>,
    history: Arc<H>,
    events: Arc<E>,
    clock: Arc<dyn Clock>,
}

impl<S, U, O, H, E> ApprenticeshipUpdateService<S, U, O, H, E>
where
    S: CommitmentStore + 'static,
    U: ApprenticeshipUpdateStore + 'static,
    O: OverlapChecker + 'static,
    H: HistoryStore + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(
        commitments: Arc<S>,
        updates: Arc<U>,
        overlaps: Arc<O>,
        history: Arc<H>,
        events: Arc<E>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            commitments,
            updates,
            overlaps,
            history,
            events,
            clock,
        }
    }

    /// Record a change request. Reference fields are applied immediately
    /// and audited; everything else becomes a pending update awaiting the
    /// counterpart's review.
    pub async fn create(
        &self,
        caller: Caller,
        user: UserInfo,
        command: NewApprenticeshipUpdate,
    ) -> Result<(), UpdateServiceError> {
        validate_new_update(&caller, &command)?;

        if self
            .updates
            .get_pending(command.apprenticeship_id)
            .await?
            .is_some()
        {
            return Err(ValidationError::single(
                "apprenticeship_update",
                format!(
                    "a pending change already exists for apprenticeship {}",
                    command.apprenticeship_id
                ),
            )
            .into());
        }

        let apprenticeship = self
            .commitments
            .get_apprenticeship(command.apprenticeship_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        caller.authorize_apprenticeship(&apprenticeship)?;

        let commitment = self
            .commitments
            .get_by_id(apprenticeship.commitment_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        require_editable(&commitment)?;
        caller.require_edit_rights(&commitment)?;

        self.check_started_rules(&apprenticeship, &command)?;
        self.check_overlaps(
            &apprenticeship,
            command.uln.as_deref(),
            command.diff.start_date,
            command.diff.end_date,
        )
        .await?;

        let mut recorder = HistoryRecorder::new(UpdatedBy::from_caller(&caller, &user));
        let immediate = self.split_immediate(&commitment, &apprenticeship, &command, &mut recorder)?;

        let pending = if command.diff.is_empty() {
            None
        } else {
            // A change only takes financial effect from the training start,
            // never earlier.
            let effective_from = apprenticeship.start_date.ok_or_else(|| {
                ValidationError::single(
                    "start_date",
                    format!(
                        "apprenticeship {} has no confirmed start date",
                        apprenticeship.id
                    ),
                )
            })?;

            Some(ApprenticeshipUpdate {
                id: None,
                apprenticeship_id: apprenticeship.id,
                originator: caller.party(),
                status: UpdateStatus::Pending,
                origin: UpdateOrigin::User,
                diff: command.diff.clone(),
                effective_from_date: Some(effective_from),
                effective_to_date: None,
            })
        };

        if pending.is_none() && immediate.is_none() {
            return Err(ValidationError::single(
                "apprenticeship_update",
                "change request contains no changes",
            )
            .into());
        }

        self.updates.create(pending, immediate).await?;
        recorder.save(self.history.as_ref()).await?;
        info!(apprenticeship_id = %apprenticeship.id, role = %caller.party(), "change request recorded");
        Ok(())
    }

    /// Settle the pending change for an apprenticeship.
    pub async fn resolve(
        &self,
        caller: Caller,
        user: UserInfo,
        apprenticeship_id: ApprenticeshipId,
        resolution: UpdateResolution,
    ) -> Result<(), UpdateServiceError> {
        let pending = self
            .updates
            .get_pending(apprenticeship_id)
            .await?
            .ok_or_else(|| {
                ValidationError::single(
                    "apprenticeship_update",
                    format!("no pending change exists for apprenticeship {apprenticeship_id}"),
                )
            })?;

        let apprenticeship = self
            .commitments
            .get_apprenticeship(apprenticeship_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        caller.authorize_apprenticeship(&apprenticeship)?;

        match resolution {
            UpdateResolution::Approve => {
                self.approve(caller, user, pending, apprenticeship).await
            }
            UpdateResolution::Reject => {
                require_reviewer(caller.party(), &pending, "reject")?;
                self.updates.reject(&pending, &user.user_id).await?;
                info!(apprenticeship_id = %apprenticeship_id, "pending change rejected");
                Ok(())
            }
            UpdateResolution::Undo => {
                require_originator(caller.party(), &pending)?;
                self.updates.undo(&pending, &user.user_id).await?;
                info!(apprenticeship_id = %apprenticeship_id, "pending change withdrawn");
                Ok(())
            }
        }
    }

    async fn approve(
        &self,
        caller: Caller,
        user: UserInfo,
        pending: ApprenticeshipUpdate,
        apprenticeship: Apprenticeship,
    ) -> Result<(), UpdateServiceError> {
        require_reviewer(caller.party(), &pending, "approve")?;

        let commitment = self
            .commitments
            .get_by_id(apprenticeship.commitment_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        require_editable(&commitment)?;

        // The window may have shifted since the change was proposed, so the
        // overlap check runs again with the pending values.
        self.check_overlaps(
            &apprenticeship,
            None,
            pending.diff.start_date,
            pending.diff.end_date,
        )
        .await?;

        let mut updated = apprenticeship.clone();
        pending.diff.apply_to(&mut updated);
        updated.agreement_status =
            rules::agreement_status_after_approval(apprenticeship.agreement_status, caller.party());
        updated.payment_status =
            rules::next_payment_status(apprenticeship.payment_status, updated.agreement_status);
        updated.pending_update_originator = None;

        let mut recorder = HistoryRecorder::new(UpdatedBy::from_caller(&caller, &user));
        recorder.track_commitment(ChangeType::EditedApprenticeship, &commitment, &commitment)?;
        recorder.track_apprenticeship(ChangeType::Updated, &apprenticeship, &updated)?;

        self.updates
            .approve(&pending, &updated, &user.user_id)
            .await?;
        recorder.save(self.history.as_ref()).await?;

        if let Err(err) = self
            .events
            .publish(&commitment, &updated, "APPRENTICESHIP-UPDATED")
            .await
        {
            warn!(apprenticeship_id = %updated.id, error = %err, "failed to publish apprenticeship update event");
        }

        info!(apprenticeship_id = %updated.id, role = %caller.party(), "pending change approved");
        Ok(())
    }

    fn split_immediate(
        &self,
        commitment: &Commitment,
        apprenticeship: &Apprenticeship,
        command: &NewApprenticeshipUpdate,
        recorder: &mut HistoryRecorder,
    ) -> Result<Option<Apprenticeship>, UpdateServiceError> {
        if !command.has_immediate_fields() {
            return Ok(None);
        }

        let mut updated = apprenticeship.clone();
        if let Some(uln) = command.uln.as_deref().filter(|v| !v.trim().is_empty()) {
            updated.uln = Some(uln.to_string());
        }
        if let Some(employer_ref) = &command.employer_ref {
            updated.employer_ref = Some(employer_ref.clone());
        }
        if let Some(provider_ref) = &command.provider_ref {
            updated.provider_ref = Some(provider_ref.clone());
        }

        recorder.track_commitment(ChangeType::EditedApprenticeship, commitment, commitment)?;
        recorder.track_apprenticeship(ChangeType::Updated, apprenticeship, &updated)?;
        Ok(Some(updated))
    }

    fn check_started_rules(
        &self,
        apprenticeship: &Apprenticeship,
        command: &NewApprenticeshipUpdate,
    ) -> Result<(), UpdateServiceError> {
        if !apprenticeship.has_started(self.clock.today()) {
            return Ok(());
        }

        let mut violations = Vec::new();

        let uln_changing = command
            .uln
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .is_some_and(|uln| Some(uln) != apprenticeship.uln.as_deref());
        if uln_changing {
            violations.push(RuleViolation::new(
                "uln",
                "the learner number cannot change once training has started",
            ));
        }

        if apprenticeship.has_had_data_lock_success
            && (command.diff.cost.is_some() || command.diff.training_code.is_some())
        {
            warn!(
                apprenticeship_id = %apprenticeship.id,
                cost = ?command.diff.cost,
                training_code = ?command.diff.training_code,
                "rejecting price/course change for a started apprenticeship with matched funding data"
            );
            violations.push(RuleViolation::new(
                "apprenticeship_update",
                "price and course cannot change once a started apprenticeship has matched funding data",
            ));
        }

        Ok(validation::finish(violations)?)
    }

    async fn check_overlaps(
        &self,
        apprenticeship: &Apprenticeship,
        uln_override: Option<&str>,
        start_override: Option<NaiveDate>,
        end_override: Option<NaiveDate>,
    ) -> Result<(), UpdateServiceError> {
        let uln = uln_override
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
            .or_else(|| apprenticeship.uln.clone());
        let start_date = start_override.or(apprenticeship.start_date);
        let end_date = end_override.or(apprenticeship.end_date);

        let (Some(uln), Some(start_date), Some(end_date)) = (uln, start_date, end_date) else {
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

        for overlap in &overlaps {
            info!(
                apprenticeship_id = %apprenticeship.id,
                overlapping = %overlap.apprenticeship_id,
                "change request overlaps an existing apprenticeship"
            );
        }

        let ids = overlaps
            .iter()
            .map(|o| o.apprenticeship_id.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(ValidationError::single(
            "apprenticeship_update",
            format!("change request overlaps apprenticeship(s) {ids}"),
        )
        .into())
    }
}

fn require_reviewer(
    party: Party,
    pending: &ApprenticeshipUpdate,
    action: &'static str,
) -> Result<(), AuthorizationError> {
    if party == pending.originator {
        Err(AuthorizationError::PendingUpdateRole {
            role: party,
            action,
            originator: pending.originator,
        })
    } else {
        Ok(())
    }
}

fn require_originator(
    party: Party,
    pending: &ApprenticeshipUpdate,
) -> Result<(), AuthorizationError> {
    if party == pending.originator {
        Ok(())
    } else {
        Err(AuthorizationError::PendingUpdateRole {
            role: party,
            action: "undo",
            originator: pending.originator,
        })
    }
}

fn validate_new_update(
    caller: &Caller,
    command: &NewApprenticeshipUpdate,
) -> Result<(), ValidationError> {
    let mut violations = Vec::new();

    if caller.id() <= 0 {
        violations.push(RuleViolation::new(
            "caller",
            "caller id must be a positive identifier",
        ));
    }
    if command.apprenticeship_id.0 <= 0 {
        violations.push(RuleViolation::new(
            "apprenticeship_id",
            "apprenticeship id must be a positive identifier",
        ));
    }
    if let Some(uln) = command.uln.as_deref().filter(|v| !v.trim().is_empty()) {
        check_uln(&mut violations, uln);
    }
    if let Some(first_name) = &command.diff.first_name {
        check_name(&mut violations, "first_name", first_name);
    }
    if let Some(last_name) = &command.diff.last_name {
        check_name(&mut violations, "last_name", last_name);
    }
    if let Some(cost) = command.diff.cost {
        check_cost(&mut violations, cost);
    }
    check_date_order(&mut violations, command.diff.start_date, command.diff.end_date);

    validation::finish(violations)
}
