//! Agreement rules engine.
//!
//! Every path that mutates an apprenticeship (the single-record update, the
//! bulk agreement review, and data-lock-generated corrections) derives its
//! new statuses from these functions, so the state machine has exactly one
//! authoritative rule set.

use super::domain::{AgreementStatus, Apprenticeship, CommitmentStatus, EditStatus, Party, PaymentStatus};

/// True when any field the counterpart must sign off on differs between the
/// two snapshots. Reference fields (ULN, employer/provider refs) are applied
/// immediately and never trigger a fresh agreement cycle.
pub fn change_requires_agreement(original: &Apprenticeship, updated: &Apprenticeship) -> bool {
    original.first_name != updated.first_name
        || original.last_name != updated.last_name
        || original.date_of_birth != updated.date_of_birth
        || original.training_type != updated.training_type
        || original.training_code != updated.training_code
        || original.training_name != updated.training_name
        || original.cost != updated.cost
        || original.start_date != updated.start_date
        || original.end_date != updated.end_date
}

/// Status after one party edits the record. A material edit sets the
/// editor's own approval and withdraws the counterpart's, forcing both
/// sides to re-approve.
pub fn next_agreement_status(
    current: AgreementStatus,
    editor: Party,
    requires_agreement: bool,
) -> AgreementStatus {
    if !requires_agreement {
        return current;
    }

    match editor {
        Party::Employer => AgreementStatus::EmployerAgreed,
        Party::Provider => AgreementStatus::ProviderAgreed,
    }
}

/// Status after one party approves the record as it stands. Approval adds
/// the approver's bit without withdrawing anything already granted.
pub fn agreement_status_after_approval(
    current: AgreementStatus,
    approver: Party,
) -> AgreementStatus {
    current.with_party_agreed(approver)
}

/// Status after one party sends the record back for rework. Rejection never
/// grants agreement; it withdraws only the rejecter's own prior approval.
pub fn agreement_status_after_rejection(
    current: AgreementStatus,
    rejecter: Party,
) -> AgreementStatus {
    current.without_party_agreed(rejecter)
}

/// Funding only starts once both parties have agreed; nothing else moves
/// the payment status here.
pub fn next_payment_status(
    current: PaymentStatus,
    new_agreement: AgreementStatus,
) -> PaymentStatus {
    match current {
        PaymentStatus::PendingApproval if new_agreement.is_both_agreed() => PaymentStatus::Active,
        other => other,
    }
}

/// While any apprenticeship awaits agreement the edit right sits with the
/// counterpart of whoever acted last; once nothing is pending both parties
/// may edit.
pub fn next_edit_status(last_editor: Party, any_pending_agreement: bool) -> EditStatus {
    if !any_pending_agreement {
        return EditStatus::Both;
    }

    match last_editor {
        Party::Employer => EditStatus::ProviderOnly,
        Party::Provider => EditStatus::EmployerOnly,
    }
}

pub fn next_commitment_status(any_pending_agreement: bool) -> CommitmentStatus {
    if any_pending_agreement {
        CommitmentStatus::New
    } else {
        CommitmentStatus::Active
    }
}
