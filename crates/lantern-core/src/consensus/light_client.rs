use thiserror::Error;
use tracing::debug;

use crate::consensus::merkle::{verify_merkle_branch, MerkleError};
use crate::consensus::period::compute_sync_committee_period;
use crate::consensus::store::LightClientStore;
use crate::consensus::sync_committee::{
    verify_sync_committee_signature, BlsVerifier, BlstVerifier, SignatureError,
};
use crate::types::beacon::*;

/// Why an update was rejected. The store is never touched when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateError {
    #[error("Signature slot {signature_slot} is not after attested header slot {attested_slot}")]
    InvalidSlotOrder {
        signature_slot: Slot,
        attested_slot: Slot,
    },

    #[error("Attested header slot {attested_slot} is before finalized header slot {finalized_slot}")]
    InvalidFinalityOrder {
        attested_slot: Slot,
        finalized_slot: Slot,
    },

    #[error("Update signed at slot {signature_slot} is not newer than finalized slot {store_slot}")]
    Stale {
        signature_slot: Slot,
        store_slot: Slot,
    },

    #[error("Update period {update_period} is outside {{{store_period}, {store_period} + 1}}")]
    PeriodDiscontinuity { update_period: u64, store_period: u64 },

    #[error("Update is in period {period} but the next sync committee is not known yet")]
    NextSyncCommitteeUnknown { period: u64 },

    #[error("Invalid Merkle branch for finalized header: {0}")]
    InvalidFinalityBranch(MerkleError),

    #[error("Update in period {period} does not carry the next sync committee")]
    MissingNextSyncCommittee { period: u64 },

    #[error("Invalid Merkle branch for next sync committee: {0}")]
    InvalidNextSyncCommitteeBranch(MerkleError),

    #[error("Insufficient sync committee participation: {participants}/512 (need at least {required})")]
    InsufficientParticipation { participants: usize, required: usize },

    #[error("Sync committee signature check failed: {0}")]
    InvalidSignature(SignatureError),
}

/// Coarse category of an [`UpdateError`], for callers deciding how to treat a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionKind {
    Staleness,
    PeriodDiscontinuity,
    MerkleProof,
    InsufficientParticipation,
    Signature,
}

impl UpdateError {
    pub fn kind(&self) -> RejectionKind {
        match self {
            UpdateError::InvalidSlotOrder { .. }
            | UpdateError::InvalidFinalityOrder { .. }
            | UpdateError::Stale { .. } => RejectionKind::Staleness,
            UpdateError::PeriodDiscontinuity { .. }
            | UpdateError::NextSyncCommitteeUnknown { .. } => RejectionKind::PeriodDiscontinuity,
            UpdateError::InvalidFinalityBranch(_)
            | UpdateError::MissingNextSyncCommittee { .. }
            | UpdateError::InvalidNextSyncCommitteeBranch(_) => RejectionKind::MerkleProof,
            UpdateError::InsufficientParticipation { .. } => {
                RejectionKind::InsufficientParticipation
            }
            UpdateError::InvalidSignature(_) => RejectionKind::Signature,
        }
    }
}

impl From<SignatureError> for UpdateError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::InsufficientParticipation {
                participants,
                required,
            } => UpdateError::InsufficientParticipation {
                participants,
                required,
            },
            other => UpdateError::InvalidSignature(other),
        }
    }
}

/// A validated state transition, ready to be applied to the store it was checked against.
///
/// Only validation can produce one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Accepted {
    finalized_header: BeaconBlockHeader,
    next_sync_committee: Option<SyncCommittee>,
    attested_period: u64,
    store_period: u64,
    participants: usize,
}

impl Accepted {
    pub(crate) fn new(
        finalized_header: BeaconBlockHeader,
        next_sync_committee: Option<SyncCommittee>,
        attested_period: u64,
        store_period: u64,
        participants: usize,
    ) -> Self {
        Self {
            finalized_header,
            next_sync_committee,
            attested_period,
            store_period,
            participants,
        }
    }

    pub fn finalized_header(&self) -> &BeaconBlockHeader {
        &self.finalized_header
    }

    /// The next sync committee proven against the finalized state, if the update carried one.
    pub fn next_sync_committee(&self) -> Option<&SyncCommittee> {
        self.next_sync_committee.as_ref()
    }

    pub fn attested_period(&self) -> u64 {
        self.attested_period
    }

    /// Period of the store snapshot this transition was validated against.
    pub fn store_period(&self) -> u64 {
        self.store_period
    }

    /// Number of committee members that signed the attested header.
    pub fn participants(&self) -> usize {
        self.participants
    }
}

/// Validates incoming updates against a store snapshot. Read-only; never mutates a store.
#[derive(Clone, Debug)]
pub struct LightClientUpdateValidator<V = BlstVerifier> {
    genesis_validators_root: Root,
    verifier: V,
}

impl LightClientUpdateValidator<BlstVerifier> {
    pub fn new(genesis_validators_root: Root) -> Self {
        Self::with_verifier(genesis_validators_root, BlstVerifier)
    }
}

impl<V: BlsVerifier> LightClientUpdateValidator<V> {
    pub fn with_verifier(genesis_validators_root: Root, verifier: V) -> Self {
        Self {
            genesis_validators_root,
            verifier,
        }
    }

    pub fn genesis_validators_root(&self) -> &Root {
        &self.genesis_validators_root
    }

    /// Run every check against `store`, short-circuiting on the first failure:
    /// 1. Freshness: `signature_slot > attested.slot >= finalized.slot` and the
    ///    signature is newer than the store's finalized header
    /// 2. Period continuity: the attested period is the store's period or the next one
    /// 3. Finality branch against the attested state root
    /// 4. Next sync committee branch against the finalized state root
    /// 5. Participation threshold and the aggregate signature
    pub fn validate(
        &self,
        store: &LightClientStore,
        update: &LightClientUpdate,
    ) -> Result<Accepted, UpdateError> {
        let attested = &update.attested_header;
        let finalized = &update.finalized_header;
        let store_slot = store.finalized_header().slot;

        // 1. Freshness
        if update.signature_slot <= attested.slot {
            return Err(UpdateError::InvalidSlotOrder {
                signature_slot: update.signature_slot,
                attested_slot: attested.slot,
            });
        }
        if attested.slot < finalized.slot {
            return Err(UpdateError::InvalidFinalityOrder {
                attested_slot: attested.slot,
                finalized_slot: finalized.slot,
            });
        }
        if update.signature_slot <= store_slot {
            return Err(UpdateError::Stale {
                signature_slot: update.signature_slot,
                store_slot,
            });
        }

        // 2. Period continuity, which also fixes the committee that must have signed
        let update_period = compute_sync_committee_period(attested.slot);
        let store_period = store.current_period();
        let same_period = update_period == store_period;

        let signing_committee = if same_period {
            store.current_sync_committee()
        } else if update_period == store_period + 1 {
            store
                .next_sync_committee()
                .ok_or(UpdateError::NextSyncCommitteeUnknown {
                    period: update_period,
                })?
        } else {
            return Err(UpdateError::PeriodDiscontinuity {
                update_period,
                store_period,
            });
        };

        // 3. The finalized header is committed to in the attested state
        verify_merkle_branch(
            &finalized.hash_tree_root(),
            &update.finality_branch,
            FINALIZED_ROOT_INDEX,
            &attested.state_root,
        )
        .map_err(UpdateError::InvalidFinalityBranch)?;
        debug!(finalized_slot = finalized.slot, "finality branch verified");

        // 4. The next committee is committed to in the finalized state
        match &update.next_sync_committee {
            Some(next_committee) => {
                verify_merkle_branch(
                    &next_committee.hash_tree_root(),
                    &update.next_sync_committee_branch,
                    NEXT_SYNC_COMMITTEE_INDEX,
                    &finalized.state_root,
                )
                .map_err(UpdateError::InvalidNextSyncCommitteeBranch)?;
                debug!(period = update_period, "next sync committee branch verified");
            }
            None if same_period => {
                return Err(UpdateError::MissingNextSyncCommittee {
                    period: update_period,
                });
            }
            None => {}
        }

        // 5. Participation threshold, then the signature itself
        let participants = verify_sync_committee_signature(
            &self.verifier,
            signing_committee,
            &update.sync_aggregate,
            attested,
            &update.fork_version,
            &self.genesis_validators_root,
        )?;

        Ok(Accepted::new(
            finalized.clone(),
            update.next_sync_committee.clone(),
            update_period,
            store_period,
            participants,
        ))
    }
}

/// Validate `update` against `store` with the `blst` backend.
pub fn validate_light_client_update(
    store: &LightClientStore,
    update: &LightClientUpdate,
    genesis_validators_root: Root,
) -> Result<Accepted, UpdateError> {
    LightClientUpdateValidator::new(genesis_validators_root).validate(store, update)
}
