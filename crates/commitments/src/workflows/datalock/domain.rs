use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::workflows::commitments::domain::ApprenticeshipId;
use crate::workflows::updates::domain::ApprenticeshipUpdateId;

/// Identifier assigned to a data-lock event by the external funding system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataLockEventId(pub i64);

impl fmt::Display for DataLockEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Discrepancy categories reported by the funding system. The numeric
/// values are the upstream bitmask and must not change: external systems
/// key off the same bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataLockErrorCode {
    Dlock03,
    Dlock04,
    Dlock05,
    Dlock06,
    Dlock07,
    Dlock08,
    Dlock09,
}

impl DataLockErrorCode {
    pub const ALL: [DataLockErrorCode; 7] = [
        DataLockErrorCode::Dlock03,
        DataLockErrorCode::Dlock04,
        DataLockErrorCode::Dlock05,
        DataLockErrorCode::Dlock06,
        DataLockErrorCode::Dlock07,
        DataLockErrorCode::Dlock08,
        DataLockErrorCode::Dlock09,
    ];

    pub const fn bit(self) -> u32 {
        match self {
            DataLockErrorCode::Dlock03 => 4,
            DataLockErrorCode::Dlock04 => 8,
            DataLockErrorCode::Dlock05 => 16,
            DataLockErrorCode::Dlock06 => 32,
            DataLockErrorCode::Dlock07 => 64,
            DataLockErrorCode::Dlock08 => 128,
            DataLockErrorCode::Dlock09 => 256,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            DataLockErrorCode::Dlock03 => "DLOCK_03",
            DataLockErrorCode::Dlock04 => "DLOCK_04",
            DataLockErrorCode::Dlock05 => "DLOCK_05",
            DataLockErrorCode::Dlock06 => "DLOCK_06",
            DataLockErrorCode::Dlock07 => "DLOCK_07",
            DataLockErrorCode::Dlock08 => "DLOCK_08",
            DataLockErrorCode::Dlock09 => "DLOCK_09",
        }
    }
}

/// Set of error codes sharing the upstream bitmask encoding. Unknown bits
/// supplied by the external system are preserved verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataLockErrorCodes(u32);

impl DataLockErrorCodes {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn with(self, code: DataLockErrorCode) -> Self {
        Self(self.0 | code.bit())
    }

    pub const fn contains(self, code: DataLockErrorCode) -> bool {
        self.0 & code.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = DataLockErrorCode> {
        DataLockErrorCode::ALL
            .into_iter()
            .filter(move |code| self.contains(*code))
    }

    /// Cost (Dlock07) and start-date (Dlock09) mismatches can be resolved
    /// by changing the stored apprenticeship.
    pub fn allows_change_triage(self) -> bool {
        self.contains(DataLockErrorCode::Dlock07) || self.contains(DataLockErrorCode::Dlock09)
    }

    /// Programme/provider/employer mismatches (Dlock03..Dlock06) need a
    /// fresh agreement cycle.
    pub fn allows_restart_triage(self) -> bool {
        self.contains(DataLockErrorCode::Dlock03)
            || self.contains(DataLockErrorCode::Dlock04)
            || self.contains(DataLockErrorCode::Dlock05)
            || self.contains(DataLockErrorCode::Dlock06)
    }
}

impl From<DataLockErrorCode> for DataLockErrorCodes {
    fn from(code: DataLockErrorCode) -> Self {
        Self::empty().with(code)
    }
}

impl fmt::Display for DataLockErrorCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.iter().map(DataLockErrorCode::label).collect();
        if labels.is_empty() {
            write!(f, "0x{:x}", self.0)
        } else {
            f.write_str(&labels.join("|"))
        }
    }
}

/// Outcome of the external funding match for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Unknown,
    Pass,
    Fail,
}

/// Decision classifying how a data lock should be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriageStatus {
    Unknown,
    Change,
    Restart,
    FixIlr,
}

impl TriageStatus {
    pub const fn label(self) -> &'static str {
        match self {
            TriageStatus::Unknown => "unknown",
            TriageStatus::Change => "change",
            TriageStatus::Restart => "restart",
            TriageStatus::FixIlr => "fix_ilr",
        }
    }
}

impl fmt::Display for TriageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Externally supplied record of a discrepancy between provider-reported
/// training data and the stored apprenticeship. Created and refreshed by
/// the ingestion process; triaged and resolved here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataLockStatus {
    pub data_lock_event_id: DataLockEventId,
    pub apprenticeship_id: ApprenticeshipId,
    pub error_codes: DataLockErrorCodes,
    pub status: EventStatus,
    pub triage_status: TriageStatus,
    pub is_resolved: bool,
    pub ilr_total_cost: Option<Decimal>,
    pub ilr_effective_from_date: Option<NaiveDate>,
    pub ilr_actual_start_date: Option<NaiveDate>,
    pub apprenticeship_update_id: Option<ApprenticeshipUpdateId>,
}

impl DataLockStatus {
    /// A lock feeds the cost timeline once it failed the funding match,
    /// was triaged as a change, carries the cost mismatch code, and has
    /// not already been folded in.
    pub fn qualifies_for_price_history(&self) -> bool {
        !self.is_resolved
            && self.triage_status == TriageStatus::Change
            && self.status == EventStatus::Fail
            && self.error_codes.contains(DataLockErrorCode::Dlock07)
    }
}
