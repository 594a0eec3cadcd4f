use thiserror::Error;
use tracing::info;

use crate::consensus::merkle::{verify_merkle_branch, MerkleError};
use crate::consensus::store::LightClientStore;
use crate::types::beacon::*;

/// Failure to anchor the client to a trusted checkpoint. Always fatal: without
/// an anchor there is nothing to verify later updates against.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrustAnchorError {
    #[error("Bootstrap header root 0x{} does not match trusted checkpoint 0x{}", hex::encode(computed), hex::encode(expected))]
    CheckpointMismatch { expected: Root, computed: Root },

    #[error("Invalid Merkle branch for current sync committee: {0}")]
    InvalidCommitteeBranch(MerkleError),

    #[error("Invalid sync committee: {0}")]
    InvalidCommittee(String),
}

/// Initialize a store from a header the caller trusts out of band.
///
/// The header must hash to `trusted_checkpoint_root`, and `committee` must be
/// proven against its state root at the current sync committee index. The
/// pending next committee starts unset.
pub fn bootstrap(
    trusted_checkpoint_root: &Root,
    header: &BeaconBlockHeader,
    committee: &SyncCommittee,
    committee_branch: &[Root],
) -> Result<LightClientStore, TrustAnchorError> {
    let computed = header.hash_tree_root();
    if &computed != trusted_checkpoint_root {
        return Err(TrustAnchorError::CheckpointMismatch {
            expected: *trusted_checkpoint_root,
            computed,
        });
    }

    committee
        .validate()
        .map_err(|e| TrustAnchorError::InvalidCommittee(e.to_string()))?;

    verify_merkle_branch(
        &committee.hash_tree_root(),
        committee_branch,
        CURRENT_SYNC_COMMITTEE_INDEX,
        &header.state_root,
    )
    .map_err(TrustAnchorError::InvalidCommitteeBranch)?;

    info!(
        slot = header.slot,
        root = %hex::encode(computed),
        "light client bootstrapped from trusted checkpoint"
    );

    Ok(LightClientStore::new(header.clone(), committee.clone(), None))
}

/// [`bootstrap`] from a beacon node's bootstrap response.
pub fn initialize_from_bootstrap(
    trusted_checkpoint_root: &Root,
    bootstrap_data: &LightClientBootstrap,
) -> Result<LightClientStore, TrustAnchorError> {
    bootstrap(
        trusted_checkpoint_root,
        &bootstrap_data.header,
        &bootstrap_data.current_sync_committee,
        &bootstrap_data.current_sync_committee_branch,
    )
}
