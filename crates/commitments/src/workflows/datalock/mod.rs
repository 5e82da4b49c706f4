//! Data-lock triage workflow: classify externally reported funding
//! discrepancies and fold approved cost corrections into the
//! apprenticeship's price timeline.

pub mod domain;
mod price_history;
pub mod repository;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    DataLockErrorCode, DataLockErrorCodes, DataLockEventId, DataLockStatus, EventStatus,
    TriageStatus,
};
pub use repository::DataLockStore;
pub use service::{DataLockTriageService, TriageServiceError};
