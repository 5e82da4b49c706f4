use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::workflows::commitments::domain::{
    Apprenticeship, ApprenticeshipId, Party, TrainingType,
};

/// Identifier wrapper for change requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApprenticeshipUpdateId(pub i64);

impl fmt::Display for ApprenticeshipUpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateStatus {
    Pending,
    Approved,
    Rejected,
    Deleted,
}

/// Whether a person raised the change or it was derived from a data lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOrigin {
    User,
    DataLock,
}

/// Field-level diff against an apprenticeship. `None` always means "no
/// change"; a populated field is an actual proposed value, so "no change"
/// and "change to empty" can never be confused.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApprenticeshipDiff {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub training_type: Option<TrainingType>,
    pub training_code: Option<String>,
    pub training_name: Option<String>,
    pub cost: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl ApprenticeshipDiff {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.date_of_birth.is_none()
            && self.training_type.is_none()
            && self.training_code.is_none()
            && self.training_name.is_none()
            && self.cost.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }

    /// Fold every populated field into the apprenticeship, leaving the rest
    /// untouched.
    pub fn apply_to(&self, apprenticeship: &mut Apprenticeship) {
        if let Some(value) = &self.first_name {
            apprenticeship.first_name = value.clone();
        }
        if let Some(value) = &self.last_name {
            apprenticeship.last_name = value.clone();
        }
        if let Some(value) = self.date_of_birth {
            apprenticeship.date_of_birth = Some(value);
        }
        if let Some(value) = self.training_type {
            apprenticeship.training_type = value;
        }
        if let Some(value) = &self.training_code {
            apprenticeship.training_code = Some(value.clone());
        }
        if let Some(value) = &self.training_name {
            apprenticeship.training_name = Some(value.clone());
        }
        if let Some(value) = self.cost {
            apprenticeship.cost = Some(value);
        }
        if let Some(value) = self.start_date {
            apprenticeship.start_date = Some(value);
        }
        if let Some(value) = self.end_date {
            apprenticeship.end_date = Some(value);
        }
    }
}

/// A pending change-set against one apprenticeship. At most one may be
/// Pending per apprenticeship at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprenticeshipUpdate {
    pub id: Option<ApprenticeshipUpdateId>,
    pub apprenticeship_id: ApprenticeshipId,
    pub originator: Party,
    pub status: UpdateStatus,
    pub origin: UpdateOrigin,
    pub diff: ApprenticeshipDiff,
    pub effective_from_date: Option<NaiveDate>,
    pub effective_to_date: Option<NaiveDate>,
}

impl ApprenticeshipUpdate {
    pub fn has_changes(&self) -> bool {
        !self.diff.is_empty()
    }
}

/// Change request as submitted by one of the parties. Reference fields
/// (uln, employer_ref, provider_ref) are applied immediately; everything in
/// `diff` waits for the counterpart's review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewApprenticeshipUpdate {
    pub apprenticeship_id: ApprenticeshipId,
    pub uln: Option<String>,
    pub employer_ref: Option<String>,
    pub provider_ref: Option<String>,
    pub diff: ApprenticeshipDiff,
}

impl NewApprenticeshipUpdate {
    pub fn has_immediate_fields(&self) -> bool {
        self.uln.as_deref().is_some_and(|v| !v.trim().is_empty())
            || self.employer_ref.is_some()
            || self.provider_ref.is_some()
    }
}

/// How the reviewing (or originating) party settles a pending change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateResolution {
    Approve,
    Reject,
    Undo,
}
