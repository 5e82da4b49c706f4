//! Core workflow library for the commitments service.
//!
//! A commitment is a training agreement jointly owned by an employer and a
//! training provider. Both parties must approve the apprenticeships it
//! contains before funding starts, every later change goes through a
//! two-party review cycle, and externally reported funding discrepancies
//! ("data locks") feed corrections back into the same review machinery.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
