//! Change-request workflow: one party proposes an edit to an
//! apprenticeship, the counterpart approves or rejects it, or the
//! originator withdraws it.

pub mod domain;
pub mod repository;
pub mod service;

#[cfg(test)]
pub(crate) mod tests;

pub use domain::{
    ApprenticeshipDiff, ApprenticeshipUpdate, ApprenticeshipUpdateId, NewApprenticeshipUpdate,
    UpdateOrigin, UpdateResolution, UpdateStatus,
};
pub use repository::ApprenticeshipUpdateStore;
pub use service::{ApprenticeshipUpdateService, UpdateServiceError};
