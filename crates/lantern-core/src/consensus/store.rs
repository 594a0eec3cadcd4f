//! The light client's trusted state and its single update rule.

use crate::consensus::light_client::Accepted;
use crate::consensus::period::compute_sync_committee_period;
use crate::types::beacon::*;

/// What applying an [`Accepted`] transition did to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The finalized header moved forward within the same period.
    Advanced,
    /// The finalized header crossed into the next period and committees rotated.
    Rotated,
    /// Only the pending next sync committee was learned.
    CommitteeLearned,
    /// Nothing new; the store is unchanged.
    Redundant,
    /// The transition cannot be applied to this store (it skips a period, or
    /// rotates without a known next committee). The store is unchanged.
    Discarded,
}

/// The client's entire trusted state.
///
/// Fields are only reachable through accessors: the one way to change a store is
/// [`LightClientStore::apply`] with a transition produced by validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LightClientStore {
    finalized_header: BeaconBlockHeader,
    current_sync_committee: SyncCommittee,
    next_sync_committee: Option<SyncCommittee>,
}

impl LightClientStore {
    pub(crate) fn new(
        finalized_header: BeaconBlockHeader,
        current_sync_committee: SyncCommittee,
        next_sync_committee: Option<SyncCommittee>,
    ) -> Self {
        Self {
            finalized_header,
            current_sync_committee,
            next_sync_committee,
        }
    }

    /// The latest finalized beacon block header we have verified.
    pub fn finalized_header(&self) -> &BeaconBlockHeader {
        &self.finalized_header
    }

    /// The committee signing headers in [`Self::current_period`].
    pub fn current_sync_committee(&self) -> &SyncCommittee {
        &self.current_sync_committee
    }

    /// The committee for the following period, once an update has proven it.
    pub fn next_sync_committee(&self) -> Option<&SyncCommittee> {
        self.next_sync_committee.as_ref()
    }

    pub fn has_next_sync_committee(&self) -> bool {
        self.next_sync_committee.is_some()
    }

    /// Sync committee period of the finalized header.
    pub fn current_period(&self) -> u64 {
        compute_sync_committee_period(self.finalized_header.slot)
    }

    /// Apply a validated transition, returning the successor store.
    ///
    /// Total and idempotent: applying the same transition twice yields the same store.
    /// A pending next committee is only taken from transitions whose finalized
    /// header lies in this store's period.
    pub fn apply(&self, accepted: &Accepted) -> (LightClientStore, ApplyOutcome) {
        let store_period = self.current_period();
        let finalized = accepted.finalized_header();
        let finalized_period = compute_sync_committee_period(finalized.slot);

        if finalized_period > store_period {
            let promoted = match (&self.next_sync_committee, finalized_period == store_period + 1) {
                (Some(next), true) => next.clone(),
                _ => return (self.clone(), ApplyOutcome::Discarded),
            };
            let rotated = LightClientStore {
                finalized_header: finalized.clone(),
                current_sync_committee: promoted,
                next_sync_committee: accepted.next_sync_committee().cloned(),
            };
            return (rotated, ApplyOutcome::Rotated);
        }

        let mut updated = self.clone();
        let mut outcome = ApplyOutcome::Redundant;

        if finalized.slot > self.finalized_header.slot {
            updated.finalized_header = finalized.clone();
            outcome = ApplyOutcome::Advanced;
        }

        if finalized_period == store_period {
            if let Some(committee) = accepted.next_sync_committee() {
                if self.next_sync_committee.as_ref() != Some(committee) {
                    updated.next_sync_committee = Some(committee.clone());
                    if outcome == ApplyOutcome::Redundant {
                        outcome = ApplyOutcome::CommitteeLearned;
                    }
                }
            }
        }

        (updated, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::period::period_start_slot;
    use crate::test_utils::{header, plain_committee};

    fn store_at(slot: Slot, next: Option<SyncCommittee>) -> LightClientStore {
        LightClientStore::new(header(slot, [0u8; 32]), plain_committee(1), next)
    }

    /// A transition validated against a period-10 store.
    fn transition(
        finalized_slot: Slot,
        next: Option<SyncCommittee>,
        attested_period: u64,
    ) -> Accepted {
        Accepted::new(header(finalized_slot, [1u8; 32]), next, attested_period, 10, 400)
    }

    #[test]
    fn test_advance_within_period() {
        let store = store_at(period_start_slot(10) + 5, None);
        let accepted = transition(period_start_slot(10) + 64, None, 10);

        let (updated, outcome) = store.apply(&accepted);
        assert_eq!(outcome, ApplyOutcome::Advanced);
        assert_eq!(updated.finalized_header().slot, period_start_slot(10) + 64);
        assert_eq!(updated.current_sync_committee(), store.current_sync_committee());
        assert!(!updated.has_next_sync_committee());
    }

    #[test]
    fn test_learn_next_committee_without_advancing() {
        let store = store_at(period_start_slot(10) + 5, None);
        let accepted = Accepted::new(
            store.finalized_header().clone(),
            Some(plain_committee(2)),
            10,
            10,
            400,
        );

        let (updated, outcome) = store.apply(&accepted);
        assert_eq!(outcome, ApplyOutcome::CommitteeLearned);
        assert_eq!(updated.next_sync_committee(), Some(&plain_committee(2)));
        assert_eq!(updated.finalized_header(), store.finalized_header());
    }

    #[test]
    fn test_rotation_promotes_next_committee() {
        let store = store_at(period_start_slot(10) + 5, Some(plain_committee(2)));
        let accepted = transition(period_start_slot(11) + 32, Some(plain_committee(3)), 11);

        let (updated, outcome) = store.apply(&accepted);
        assert_eq!(outcome, ApplyOutcome::Rotated);
        assert_eq!(updated.current_period(), 11);
        assert_eq!(updated.current_sync_committee(), &plain_committee(2));
        assert_eq!(updated.next_sync_committee(), Some(&plain_committee(3)));
    }

    #[test]
    fn test_rotation_without_next_committee_is_discarded() {
        let store = store_at(period_start_slot(10) + 5, None);
        let accepted = transition(period_start_slot(11), None, 11);

        let (updated, outcome) = store.apply(&accepted);
        assert_eq!(outcome, ApplyOutcome::Discarded);
        assert_eq!(updated, store);
    }

    #[test]
    fn test_skipping_a_period_is_discarded() {
        let store = store_at(period_start_slot(10), Some(plain_committee(2)));
        let accepted = transition(period_start_slot(12), None, 12);

        let (updated, outcome) = store.apply(&accepted);
        assert_eq!(outcome, ApplyOutcome::Discarded);
        assert_eq!(updated, store);
    }

    #[test]
    fn test_older_finalized_header_does_not_overwrite_next_committee() {
        let store = store_at(period_start_slot(10) + 100, Some(plain_committee(2)));
        // Finalized in the previous period: its next committee is our current one.
        let accepted = transition(period_start_slot(9) + 100, Some(plain_committee(1)), 10);

        let (updated, outcome) = store.apply(&accepted);
        assert_eq!(outcome, ApplyOutcome::Redundant);
        assert_eq!(updated, store);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let store = store_at(period_start_slot(10) + 5, Some(plain_committee(2)));
        let transitions = [
            transition(period_start_slot(10) + 9, Some(plain_committee(2)), 10),
            transition(period_start_slot(11) + 9, Some(plain_committee(3)), 11),
            transition(period_start_slot(10) + 1, None, 10),
        ];

        for accepted in &transitions {
            let (once, _) = store.apply(accepted);
            let (twice, outcome) = once.apply(accepted);
            assert_eq!(once, twice);
            assert_eq!(outcome, ApplyOutcome::Redundant);
        }
    }
}
