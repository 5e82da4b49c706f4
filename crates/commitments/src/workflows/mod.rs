pub mod commitments;
pub mod datalock;
pub mod updates;

use chrono::NaiveDate;

/// Source of the current date for "has training started" checks. Injected
/// so tests can pin the month the rules are evaluated against.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}
