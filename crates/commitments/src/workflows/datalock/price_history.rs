//! Cost timeline reconstruction.
//!
//! The chronologically ordered set of unresolved, cost-bearing, Change-triaged
//! data locks is the authoritative record of what training actually cost over
//! time. Rebuilding produces contiguous intervals: each entry runs up to the
//! day before the next one starts, and the final entry is open-ended.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::domain::{DataLockEventId, DataLockStatus};
use crate::workflows::commitments::domain::{ApprenticeshipId, PriceHistoryEntry};

/// Build the price timeline for an apprenticeship from its data locks,
/// returning the entries plus the event ids that were folded in. Locks that
/// do not qualify (resolved, passing, non-Change, or without the cost code)
/// are ignored and never resolved by the caller.
pub(crate) fn rebuild(
    apprenticeship_id: ApprenticeshipId,
    locks: &[DataLockStatus],
) -> (Vec<PriceHistoryEntry>, Vec<DataLockEventId>) {
    let mut qualifying: Vec<(DataLockEventId, Decimal, NaiveDate)> = locks
        .iter()
        .filter(|lock| lock.qualifies_for_price_history())
        .filter_map(|lock| {
            match (lock.ilr_total_cost, lock.ilr_effective_from_date) {
                (Some(cost), Some(from)) => Some((lock.data_lock_event_id, cost, from)),
                _ => None,
            }
        })
        .collect();

    qualifying.sort_by_key(|(_, _, from)| *from);

    let ids: Vec<DataLockEventId> = qualifying.iter().map(|(id, _, _)| *id).collect();
    let mut entries = Vec::with_capacity(qualifying.len());

    for (index, (_, cost, from_date)) in qualifying.iter().enumerate() {
        let to_date = qualifying.get(index + 1).map(|(_, _, next_from)| {
            next_from
                .pred_opt()
                .expect("effective-from dates have a predecessor")
        });
        entries.push(PriceHistoryEntry {
            apprenticeship_id,
            cost: *cost,
            from_date: *from_date,
            to_date,
        });
    }

    (entries, ids)
}
