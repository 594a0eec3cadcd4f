use thiserror::Error;
use tracing::{debug, warn};

use crate::consensus::merkle::sha256_pair;
use crate::types::beacon::*;

/// Domain separation tag for Ethereum BLS signatures (proof-of-possession scheme).
pub const ETH_BLS_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Errors that can occur during sync committee signature verification.
/// Each variant names a specific failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Insufficient sync committee participation: {participants}/512 (need at least {required})")]
    InsufficientParticipation {
        participants: usize,
        required: usize,
    },

    #[error("Invalid BLS signature: the aggregate signature does not verify against the participating committee members")]
    InvalidSignature,

    #[error("Invalid BLS public key at index {index}: {reason}")]
    InvalidPublicKey { index: usize, reason: String },

    #[error("Malformed BLS signature: {0}")]
    MalformedSignature(String),

    #[error("BLS aggregation error: {0}")]
    Aggregation(String),
}

/// The pairing-crypto capability the core delegates to.
///
/// Implementations check one aggregate signature over `message` from the given
/// public keys; they never see committees, bits or thresholds.
pub trait BlsVerifier {
    fn fast_aggregate_verify(
        &self,
        pubkeys: &[&BlsPublicKey],
        message: &Root,
        signature: &BlsSignature,
    ) -> Result<(), SignatureError>;
}

/// BLS12-381 verification backed by `blst` (min-pk: 48-byte keys, 96-byte signatures).
#[derive(Clone, Copy, Debug, Default)]
pub struct BlstVerifier;

impl BlsVerifier for BlstVerifier {
    fn fast_aggregate_verify(
        &self,
        pubkeys: &[&BlsPublicKey],
        message: &Root,
        signature: &BlsSignature,
    ) -> Result<(), SignatureError> {
        use blst::min_pk::{AggregatePublicKey, PublicKey, Signature};
        use blst::BLST_ERROR;

        if pubkeys.is_empty() {
            return Err(SignatureError::InsufficientParticipation {
                participants: 0,
                required: MIN_SYNC_COMMITTEE_PARTICIPANTS,
            });
        }

        let sig = Signature::from_bytes(&signature.0)
            .map_err(|e| SignatureError::MalformedSignature(format!("{:?}", e)))?;

        let pks: Vec<PublicKey> = pubkeys
            .iter()
            .enumerate()
            .map(|(i, pk)| {
                PublicKey::from_bytes(&pk.0).map_err(|e| SignatureError::InvalidPublicKey {
                    index: i,
                    reason: format!("{:?}", e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pk_refs: Vec<&PublicKey> = pks.iter().collect();
        let agg_pk = AggregatePublicKey::aggregate(&pk_refs, true)
            .map_err(|e| SignatureError::Aggregation(format!("{:?}", e)))?
            .to_public_key();

        let result = sig.verify(true, message, ETH_BLS_DST, &[], &agg_pk, false);
        if result != BLST_ERROR::BLST_SUCCESS {
            warn!(error = ?result, "BLS aggregate signature verification failed");
            return Err(SignatureError::InvalidSignature);
        }

        Ok(())
    }
}

/// Compute the fork data root: SSZ container `(current_version, genesis_validators_root)`.
pub fn compute_fork_data_root(fork_version: &Version, genesis_validators_root: &Root) -> Root {
    let mut version_leaf = [0u8; 32];
    version_leaf[..4].copy_from_slice(fork_version);
    sha256_pair(&version_leaf, genesis_validators_root)
}

/// Compute the signing domain: `domain_type || fork_data_root[..28]`.
pub fn compute_domain(
    domain_type: &[u8; 4],
    fork_version: &Version,
    genesis_validators_root: &Root,
) -> Root {
    let fork_data_root = compute_fork_data_root(fork_version, genesis_validators_root);
    let mut domain = [0u8; 32];
    domain[..4].copy_from_slice(domain_type);
    domain[4..].copy_from_slice(&fork_data_root[..28]);
    domain
}

/// Compute the signing root: SSZ container `(object_root, domain)`.
pub fn compute_signing_root(object_root: &Root, domain: &Root) -> Root {
    sha256_pair(object_root, domain)
}

/// The root a sync committee signs for `header` on the chain identified by
/// `fork_version` and `genesis_validators_root`.
pub fn sync_committee_signing_root(
    header: &BeaconBlockHeader,
    fork_version: &Version,
    genesis_validators_root: &Root,
) -> Root {
    let domain = compute_domain(&DOMAIN_SYNC_COMMITTEE, fork_version, genesis_validators_root);
    compute_signing_root(&header.hash_tree_root(), &domain)
}

/// Verify a sync aggregate over `signing_root` against `committee`.
///
/// Requires >= 2/3 of the 512 members to have signed before any cryptography runs.
/// Returns the participant count on success.
pub fn verify_aggregate<V: BlsVerifier + ?Sized>(
    verifier: &V,
    committee: &SyncCommittee,
    aggregate: &SyncAggregate,
    signing_root: &Root,
) -> Result<usize, SignatureError> {
    let participants = aggregate.num_participants();
    if participants < MIN_SYNC_COMMITTEE_PARTICIPANTS {
        return Err(SignatureError::InsufficientParticipation {
            participants,
            required: MIN_SYNC_COMMITTEE_PARTICIPANTS,
        });
    }

    let participant_pubkeys: Vec<&BlsPublicKey> = aggregate
        .participant_indices()
        .into_iter()
        .map(|i| {
            committee
                .pubkeys
                .get(i)
                .ok_or_else(|| SignatureError::InvalidPublicKey {
                    index: i,
                    reason: format!("committee has only {} members", committee.pubkeys.len()),
                })
        })
        .collect::<Result<_, _>>()?;

    debug!(participants, "verifying sync committee aggregate signature");
    verifier.fast_aggregate_verify(
        &participant_pubkeys,
        signing_root,
        &aggregate.sync_committee_signature,
    )?;

    Ok(participants)
}

/// Verify that `committee` signed `attested_header` on the given fork.
pub fn verify_sync_committee_signature<V: BlsVerifier + ?Sized>(
    verifier: &V,
    committee: &SyncCommittee,
    aggregate: &SyncAggregate,
    attested_header: &BeaconBlockHeader,
    fork_version: &Version,
    genesis_validators_root: &Root,
) -> Result<usize, SignatureError> {
    let signing_root =
        sync_committee_signing_root(attested_header, fork_version, genesis_validators_root);
    verify_aggregate(verifier, committee, aggregate, &signing_root)
}
