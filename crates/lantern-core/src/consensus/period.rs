//! Slot / epoch / sync-committee-period arithmetic.

use crate::types::beacon::*;

/// Epoch containing `slot`.
pub const fn compute_epoch_at_slot(slot: Slot) -> u64 {
    slot / SLOTS_PER_EPOCH
}

/// Sync committee period containing `slot`. Monotonic non-decreasing in `slot`.
pub const fn compute_sync_committee_period(slot: Slot) -> u64 {
    slot / SLOTS_PER_SYNC_COMMITTEE_PERIOD
}

/// First slot of `period`.
pub const fn period_start_slot(period: u64) -> Slot {
    period * SLOTS_PER_SYNC_COMMITTEE_PERIOD
}
