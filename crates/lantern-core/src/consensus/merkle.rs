//! SSZ Merkle primitives.
//!
//! Generalized-index branch verification plus the minimal SSZ merkleization
//! needed to turn headers and sync committees into the leaves those branches
//! authenticate. Everything here is a pure function over immutable inputs.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::types::beacon::*;

/// Errors from Merkle branch verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    #[error("Generalized index 0 does not address a tree node")]
    InvalidIndex,

    #[error("Branch length {got} doesn't match depth {expected} of generalized index {gindex}")]
    BranchLengthMismatch {
        expected: usize,
        got: usize,
        gindex: GeneralizedIndex,
    },

    #[error("Branch for generalized index {gindex} does not lead to the expected root")]
    RootMismatch { gindex: GeneralizedIndex },
}

/// Smallest power of two `>= x`; 0 and 1 both map to 1.
pub fn ceil_pow2(x: u64) -> u64 {
    if x <= 1 {
        1
    } else {
        x.next_power_of_two()
    }
}

/// Largest power of two `<= x`; 0 and 1 both map to 1.
pub fn floor_pow2(x: u64) -> u64 {
    if x <= 1 {
        1
    } else {
        1 << (63 - x.leading_zeros())
    }
}

/// Depth of a generalized index below the root: `floor(log2(index))`.
/// Returns `None` for index 0, which is not a node.
pub fn gindex_depth(index: GeneralizedIndex) -> Option<usize> {
    if index == 0 {
        None
    } else {
        Some(floor_pow2(index).trailing_zeros() as usize)
    }
}

/// Turn taken at level `i` above the leaf (bit 0 is the deepest level): `true` = right child.
pub fn gindex_bit(index: GeneralizedIndex, i: usize) -> bool {
    (index >> i) & 1 == 1
}

/// Verify a Merkle branch for `leaf` at generalized `index` against `root`.
///
/// Fails without panicking on a branch whose length differs from the depth of `index`.
pub fn verify_branch(leaf: &Root, branch: &[Root], index: GeneralizedIndex, root: &Root) -> bool {
    verify_merkle_branch(leaf, branch, index, root).is_ok()
}

/// Like [`verify_branch`] but reports which part of the proof was wrong.
pub fn verify_merkle_branch(
    leaf: &Root,
    branch: &[Root],
    index: GeneralizedIndex,
    root: &Root,
) -> Result<(), MerkleError> {
    let depth = gindex_depth(index).ok_or(MerkleError::InvalidIndex)?;
    if branch.len() != depth {
        return Err(MerkleError::BranchLengthMismatch {
            expected: depth,
            got: branch.len(),
            gindex: index,
        });
    }

    if compute_branch_root(leaf, branch, index) != *root {
        return Err(MerkleError::RootMismatch { gindex: index });
    }
    Ok(())
}

/// Fold a branch bottom-up into the root it implies. Does not check the branch length.
pub fn compute_branch_root(leaf: &Root, branch: &[Root], index: GeneralizedIndex) -> Root {
    let mut current = *leaf;
    for (i, sibling) in branch.iter().enumerate() {
        current = if gindex_bit(index, i) {
            sha256_pair(sibling, &current)
        } else {
            sha256_pair(&current, sibling)
        };
    }
    current
}

/// SSZ merkleization: pad `chunks` with zero chunks to `ceil_pow2(limit)` leaves and fold pairwise.
pub fn merkleize(chunks: &[Root], limit: usize) -> Root {
    let width = ceil_pow2(limit.max(chunks.len()) as u64) as usize;
    let mut layer: Vec<Root> = Vec::with_capacity(width);
    layer.extend_from_slice(chunks);
    layer.resize(width, [0u8; 32]);

    while layer.len() > 1 {
        layer = layer
            .chunks(2)
            .map(|pair| sha256_pair(&pair[0], &pair[1]))
            .collect();
    }
    layer[0]
}

/// Hash a beacon block header using SSZ hash_tree_root.
/// The header has 5 fields, each one 32-byte chunk, padded to 8 leaves.
pub fn hash_beacon_block_header(header: &BeaconBlockHeader) -> Root {
    merkleize(
        &[
            uint64_to_leaf(header.slot),
            uint64_to_leaf(header.proposer_index),
            header.parent_root,
            header.state_root,
            header.body_root,
        ],
        5,
    )
}

/// Hash a sync committee using SSZ hash_tree_root:
/// `hash(merkleize(pubkey roots) || aggregate pubkey root)`.
pub fn hash_sync_committee(committee: &SyncCommittee) -> Root {
    let pubkey_roots: Vec<Root> = committee.pubkeys.iter().map(hash_pubkey).collect();
    let pubkeys_root = merkleize(&pubkey_roots, SYNC_COMMITTEE_SIZE);
    sha256_pair(&pubkeys_root, &hash_pubkey(&committee.aggregate_pubkey))
}

/// A 48-byte key packs into two chunks, the second zero-padded.
fn hash_pubkey(pubkey: &BlsPublicKey) -> Root {
    let mut first = [0u8; 32];
    let mut second = [0u8; 32];
    first.copy_from_slice(&pubkey.0[..32]);
    second[..16].copy_from_slice(&pubkey.0[32..]);
    sha256_pair(&first, &second)
}

// --- Helper functions ---

/// SHA256 hash of arbitrary data.
pub fn sha256_hash(data: &[u8]) -> Root {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA256 hash of two 32-byte values concatenated.
pub fn sha256_pair(a: &Root, b: &Root) -> Root {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(a);
    data[32..].copy_from_slice(b);
    sha256_hash(&data)
}

/// Encode a u64 as a 32-byte SSZ leaf (little-endian, zero-padded).
pub fn uint64_to_leaf(value: u64) -> Root {
    let mut leaf = [0u8; 32];
    leaf[..8].copy_from_slice(&value.to_le_bytes());
    leaf
}
