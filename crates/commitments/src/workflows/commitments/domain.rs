use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for commitments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommitmentId(pub i64);

/// Identifier wrapper for apprenticeship records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApprenticeshipId(pub i64);

/// Employer account identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub i64);

/// Training provider identifier (UKPRN).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderId(pub i64);

impl fmt::Display for CommitmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ApprenticeshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One side of the two-party agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Party {
    Employer,
    Provider,
}

impl Party {
    pub const fn counterpart(self) -> Party {
        match self {
            Party::Employer => Party::Provider,
            Party::Provider => Party::Employer,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Party::Employer => "employer",
            Party::Provider => "provider",
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Caller identity asserted by the transport layer. Carrying the owning
/// identifier inside the variant makes "employer id claimed but provider id
/// supplied" unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Caller {
    Employer(AccountId),
    Provider(ProviderId),
}

impl Caller {
    pub const fn party(&self) -> Party {
        match self {
            Caller::Employer(_) => Party::Employer,
            Caller::Provider(_) => Party::Provider,
        }
    }

    pub const fn id(&self) -> i64 {
        match self {
            Caller::Employer(AccountId(id)) => *id,
            Caller::Provider(ProviderId(id)) => *id,
        }
    }
}

/// Identity of the user acting on behalf of a party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: String,
    pub display_name: String,
}

/// Last-updated-by metadata stamped on mutated aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedBy {
    pub role: Party,
    pub user_id: String,
    pub display_name: String,
}

impl UpdatedBy {
    pub fn from_caller(caller: &Caller, user: &UserInfo) -> Self {
        Self {
            role: caller.party(),
            user_id: user.user_id.clone(),
            display_name: user.display_name.clone(),
        }
    }
}

/// Lifecycle of the commitment as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentStatus {
    New,
    Active,
    Deleted,
}

impl CommitmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CommitmentStatus::New => "new",
            CommitmentStatus::Active => "active",
            CommitmentStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for CommitmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which party currently holds the right to submit edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditStatus {
    Both,
    EmployerOnly,
    ProviderOnly,
    Neither,
}

impl EditStatus {
    pub fn permits(self, party: Party) -> bool {
        match self {
            EditStatus::Both => true,
            EditStatus::EmployerOnly => party == Party::Employer,
            EditStatus::ProviderOnly => party == Party::Provider,
            EditStatus::Neither => false,
        }
    }
}

/// The most recent review action taken against the commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LastAction {
    None,
    Approve,
    Reject,
    AmendAndReply,
}

/// Funding lifecycle of a single apprenticeship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    PendingApproval,
    Active,
    Paused,
    Withdrawn,
    Completed,
    Deleted,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::PendingApproval => "pending_approval",
            PaymentStatus::Active => "active",
            PaymentStatus::Paused => "paused",
            PaymentStatus::Withdrawn => "withdrawn",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which parties have approved the current state of an apprenticeship.
/// EmployerAgreed and ProviderAgreed act as independent bits; BothAgreed is
/// their union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgreementStatus {
    NotAgreed,
    EmployerAgreed,
    ProviderAgreed,
    BothAgreed,
}

impl AgreementStatus {
    pub fn agreed_by(self, party: Party) -> bool {
        match (self, party) {
            (AgreementStatus::BothAgreed, _) => true,
            (AgreementStatus::EmployerAgreed, Party::Employer) => true,
            (AgreementStatus::ProviderAgreed, Party::Provider) => true,
            _ => false,
        }
    }

    /// Add a party's approval without disturbing the counterpart's.
    pub fn with_party_agreed(self, party: Party) -> AgreementStatus {
        if self.agreed_by(party.counterpart()) {
            AgreementStatus::BothAgreed
        } else {
            match party {
                Party::Employer => AgreementStatus::EmployerAgreed,
                Party::Provider => AgreementStatus::ProviderAgreed,
            }
        }
    }

    /// Withdraw a party's approval without disturbing the counterpart's.
    pub fn without_party_agreed(self, party: Party) -> AgreementStatus {
        if self.agreed_by(party.counterpart()) {
            match party.counterpart() {
                Party::Employer => AgreementStatus::EmployerAgreed,
                Party::Provider => AgreementStatus::ProviderAgreed,
            }
        } else {
            AgreementStatus::NotAgreed
        }
    }

    pub fn is_both_agreed(self) -> bool {
        self == AgreementStatus::BothAgreed
    }
}

/// Framework or standard training programme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingType {
    Framework,
    Standard,
}

/// Message exchanged between the parties on a commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub author: String,
    pub text: String,
    pub created_on: DateTime<Utc>,
}

/// One apprentice's training record within a commitment. Employer and
/// provider ids are denormalized from the parent so authorization does not
/// need the full aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Apprenticeship {
    pub id: ApprenticeshipId,
    pub commitment_id: CommitmentId,
    pub employer_account_id: AccountId,
    pub provider_id: ProviderId,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub ni_number: Option<String>,
    pub uln: Option<String>,
    pub training_type: TrainingType,
    pub training_code: Option<String>,
    pub training_name: Option<String>,
    pub cost: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub employer_ref: Option<String>,
    pub provider_ref: Option<String>,
    pub payment_status: PaymentStatus,
    pub agreement_status: AgreementStatus,
    pub pending_update_originator: Option<Party>,
    pub data_lock_triage_status: Option<crate::workflows::datalock::TriageStatus>,
    pub has_had_data_lock_success: bool,
}

impl Apprenticeship {
    /// Training counts as started once the start date falls on or before
    /// the first day of the current month.
    pub fn has_started(&self, today: NaiveDate) -> bool {
        match self.start_date {
            Some(start) => start <= first_of_month(today),
            None => false,
        }
    }

    pub fn is_waiting_to_start(&self, today: NaiveDate) -> bool {
        !self.has_started(today)
    }

    pub fn pending_agreement(&self) -> bool {
        !self.agreement_status.is_both_agreed()
    }
}

/// The aggregate root: one employer, one legal entity, optionally one
/// provider, and the apprenticeships under negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commitment {
    pub id: CommitmentId,
    pub reference: String,
    pub employer_account_id: AccountId,
    pub legal_entity_id: String,
    pub legal_entity_name: String,
    pub provider_id: Option<ProviderId>,
    pub provider_name: Option<String>,
    pub commitment_status: CommitmentStatus,
    pub edit_status: EditStatus,
    pub last_action: LastAction,
    pub last_updated_by: Option<UpdatedBy>,
    pub apprenticeships: Vec<Apprenticeship>,
    pub messages: Vec<Message>,
}

impl Commitment {
    pub fn any_apprenticeship_pending_agreement(&self) -> bool {
        self.apprenticeships.iter().any(Apprenticeship::pending_agreement)
    }

    pub fn apprenticeship(&self, id: ApprenticeshipId) -> Option<&Apprenticeship> {
        self.apprenticeships.iter().find(|a| a.id == id)
    }
}

/// One interval of an apprenticeship's cost timeline, reconstructed from
/// resolved cost-bearing data locks. Intervals are contiguous; only the last
/// one is open-ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub apprenticeship_id: ApprenticeshipId,
    pub cost: Decimal,
    pub from_date: NaiveDate,
    pub to_date: Option<NaiveDate>,
}

pub(crate) fn first_of_month(today: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
        .expect("first day of an existing month is always valid")
}
