//! Caller authorization and state gating.
//!
//! The caller's capability lives on the [`Caller`] enum itself, so handlers
//! ask the caller to authorize against a resource instead of branching on a
//! role discriminant.

use super::domain::{
    Apprenticeship, ApprenticeshipId, Caller, Commitment, CommitmentId, CommitmentStatus, Party,
};

/// Caller identity does not match resource ownership, or the commitment's
/// review state forbids the caller's action.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("{role} {caller_id} not authorised to update apprenticeship {apprenticeship_id}")]
    Apprenticeship {
        role: Party,
        caller_id: i64,
        apprenticeship_id: ApprenticeshipId,
    },
    #[error("{role} {caller_id} not authorised to act on commitment {commitment_id}")]
    Commitment {
        role: Party,
        caller_id: i64,
        commitment_id: CommitmentId,
    },
    #[error("{role} not currently permitted to edit commitment {commitment_id}")]
    EditStatus {
        role: Party,
        commitment_id: CommitmentId,
    },
    #[error("{role} may not {action} a change requested by the {originator}")]
    PendingUpdateRole {
        role: Party,
        action: &'static str,
        originator: Party,
    },
}

/// Mutation attempted while the commitment is in a status that forbids it.
/// This is an integrity fault, not user input.
#[derive(Debug, thiserror::Error)]
#[error("commitment {commitment_id} cannot be modified while its status is {status}")]
pub struct InvalidStateError {
    pub commitment_id: CommitmentId,
    pub status: CommitmentStatus,
}

impl Caller {
    pub fn authorize_apprenticeship(
        &self,
        apprenticeship: &Apprenticeship,
    ) -> Result<(), AuthorizationError> {
        let owned = match self {
            Caller::Employer(account) => apprenticeship.employer_account_id == *account,
            Caller::Provider(provider) => apprenticeship.provider_id == *provider,
        };

        if owned {
            Ok(())
        } else {
            Err(AuthorizationError::Apprenticeship {
                role: self.party(),
                caller_id: self.id(),
                apprenticeship_id: apprenticeship.id,
            })
        }
    }

    pub fn authorize_commitment(&self, commitment: &Commitment) -> Result<(), AuthorizationError> {
        let owned = match self {
            Caller::Employer(account) => commitment.employer_account_id == *account,
            Caller::Provider(provider) => commitment.provider_id == Some(*provider),
        };

        if owned {
            Ok(())
        } else {
            Err(AuthorizationError::Commitment {
                role: self.party(),
                caller_id: self.id(),
                commitment_id: commitment.id,
            })
        }
    }

    /// Edit-status gate: the commitment must currently accept edits from
    /// this caller's side of the agreement.
    pub fn require_edit_rights(&self, commitment: &Commitment) -> Result<(), AuthorizationError> {
        if commitment.edit_status.permits(self.party()) {
            Ok(())
        } else {
            Err(AuthorizationError::EditStatus {
                role: self.party(),
                commitment_id: commitment.id,
            })
        }
    }
}

/// Commitments accept mutations only while New or Active.
pub fn require_editable(commitment: &Commitment) -> Result<(), InvalidStateError> {
    match commitment.commitment_status {
        CommitmentStatus::New | CommitmentStatus::Active => Ok(()),
        status => Err(InvalidStateError {
            commitment_id: commitment.id,
            status,
        }),
    }
}
