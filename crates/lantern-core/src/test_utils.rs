//! Builders for committees, signed updates and bootstraps with consistent state roots.
//!
//! Not part of the stable API. Keys are derived deterministically from a seed;
//! a committee reuses a small pool of distinct keys across its 512 seats so
//! that signing an update stays cheap.

use blst::min_pk::{AggregatePublicKey, AggregateSignature, SecretKey, Signature};

use crate::consensus::bootstrap::initialize_from_bootstrap;
use crate::consensus::light_client::validate_light_client_update;
use crate::consensus::period::period_start_slot;
use crate::consensus::merkle::{
    ceil_pow2, compute_branch_root, gindex_depth, sha256_hash, sha256_pair,
};
use crate::consensus::store::LightClientStore;
use crate::consensus::sync_committee::{sync_committee_signing_root, ETH_BLS_DST};
use crate::types::beacon::*;

pub const TEST_GENESIS_VALIDATORS_ROOT: Root = [0x4b; 32];
pub const TEST_FORK_VERSION: Version = [0x04, 0x00, 0x00, 0x00];
pub const DEFAULT_PARTICIPANTS: usize = 400;

/// Distinct keys per committee; seat `i` uses key `i % KEY_POOL_SIZE`.
const KEY_POOL_SIZE: usize = 32;

/// A sync committee together with the secret keys behind its seats.
pub struct TestCommittee {
    secret_keys: Vec<SecretKey>,
    pub committee: SyncCommittee,
}

impl TestCommittee {
    pub fn new(seed: u8) -> Self {
        let secret_keys: Vec<SecretKey> = (0..KEY_POOL_SIZE)
            .map(|i| {
                let mut ikm = [0u8; 32];
                ikm[0] = seed;
                ikm[1] = i as u8;
                ikm[31] = 0x5a;
                SecretKey::key_gen(&ikm, &[]).expect("32-byte ikm is always accepted")
            })
            .collect();

        let pool: Vec<_> = secret_keys.iter().map(|sk| sk.sk_to_pk()).collect();
        let seats: Vec<_> = (0..SYNC_COMMITTEE_SIZE).map(|i| &pool[i % KEY_POOL_SIZE]).collect();
        let aggregate = AggregatePublicKey::aggregate(&seats, false)
            .expect("pool keys are valid")
            .to_public_key();

        let committee = SyncCommittee {
            pubkeys: seats.iter().map(|pk| BlsPublicKey(pk.compress())).collect(),
            aggregate_pubkey: BlsPublicKey(aggregate.compress()),
        };

        Self {
            secret_keys,
            committee,
        }
    }

    fn secret_key(&self, seat: usize) -> &SecretKey {
        &self.secret_keys[seat % KEY_POOL_SIZE]
    }
}

/// Members `0..participants` sign `message`.
pub fn signed_aggregate(
    signer: &TestCommittee,
    participants: usize,
    message: &Root,
) -> SyncAggregate {
    let mut bits = ParticipationBits::ZERO;
    for seat in 0..participants {
        bits.set(seat, true);
    }

    let pool: Vec<Signature> = (0..KEY_POOL_SIZE.min(participants))
        .map(|seat| signer.secret_key(seat).sign(message, ETH_BLS_DST, &[]))
        .collect();
    let signature = if participants == 0 {
        BlsSignature([0u8; 96])
    } else {
        let sigs: Vec<&Signature> = (0..participants)
            .map(|seat| &pool[seat % KEY_POOL_SIZE])
            .collect();
        let aggregate = AggregateSignature::aggregate(&sigs, false).expect("signatures are valid");
        BlsSignature(aggregate.to_signature().compress())
    };

    SyncAggregate {
        sync_committee_bits: bits,
        sync_committee_signature: signature,
    }
}

/// A committee of placeholder keys; fine wherever no signature is checked.
pub fn plain_committee(seed: u8) -> SyncCommittee {
    SyncCommittee {
        pubkeys: vec![BlsPublicKey([seed; 48]); SYNC_COMMITTEE_SIZE],
        aggregate_pubkey: BlsPublicKey([seed; 48]),
    }
}

pub fn header(slot: Slot, state_root: Root) -> BeaconBlockHeader {
    BeaconBlockHeader {
        slot,
        proposer_index: slot % 1000,
        parent_root: sha256_hash(&slot.to_le_bytes()),
        state_root,
        body_root: [0xbb; 32],
    }
}

/// A state root in which `leaf` sits at `gindex`, with filler siblings derived from `salt`.
pub fn state_with_leaf(leaf: &Root, gindex: GeneralizedIndex, salt: u64) -> (Root, Vec<Root>) {
    let depth = gindex_depth(gindex).expect("gindex is non-zero");
    let branch: Vec<Root> = (0..depth)
        .map(|level| {
            let mut seed = [0u8; 9];
            seed[..8].copy_from_slice(&salt.to_le_bytes());
            seed[8] = level as u8;
            sha256_hash(&seed)
        })
        .collect();
    (compute_branch_root(leaf, &branch, gindex), branch)
}

/// A bootstrap at `slot` for `committee`, plus the checkpoint root that anchors it.
pub fn make_bootstrap(committee: &SyncCommittee, slot: Slot) -> (Root, LightClientBootstrap) {
    let (state_root, branch) =
        state_with_leaf(&committee.hash_tree_root(), CURRENT_SYNC_COMMITTEE_INDEX, slot);
    let header = header(slot, state_root);
    let bootstrap = LightClientBootstrap {
        header,
        current_sync_committee: committee.clone(),
        current_sync_committee_branch: branch,
    };
    (bootstrap.header.hash_tree_root(), bootstrap)
}

pub fn store_from_bootstrap(current: &TestCommittee, slot: Slot) -> LightClientStore {
    let (root, bootstrap) = make_bootstrap(&current.committee, slot);
    initialize_from_bootstrap(&root, &bootstrap).expect("fixture bootstrap is consistent")
}

/// Advance `store` by two slots with an update that proves `next`.
pub fn learn_next_committee(
    store: &LightClientStore,
    signer: &TestCommittee,
    next: &SyncCommittee,
) -> LightClientStore {
    let slot = store.finalized_header().slot;
    let update = UpdateSpec::new(signer, slot + 2, slot + 1)
        .next_committee(next)
        .build();
    let accepted = validate_light_client_update(store, &update, TEST_GENESIS_VALIDATORS_ROOT)
        .expect("fixture update is valid");
    store.apply(&accepted).0
}

/// Builder for a self-consistent, signed [`LightClientUpdate`].
pub struct UpdateSpec<'a> {
    signer: &'a TestCommittee,
    attested_slot: Slot,
    finalized_slot: Slot,
    next_committee: Option<&'a SyncCommittee>,
    participants: usize,
    fork_version: Version,
    genesis_validators_root: Root,
}

impl<'a> UpdateSpec<'a> {
    pub fn new(signer: &'a TestCommittee, attested_slot: Slot, finalized_slot: Slot) -> Self {
        Self {
            signer,
            attested_slot,
            finalized_slot,
            next_committee: None,
            participants: DEFAULT_PARTICIPANTS,
            fork_version: TEST_FORK_VERSION,
            genesis_validators_root: TEST_GENESIS_VALIDATORS_ROOT,
        }
    }

    /// Slots given as offsets from the start of `period`.
    pub fn in_period(
        signer: &'a TestCommittee,
        period: u64,
        attested_offset: Slot,
        finalized_offset: Slot,
    ) -> Self {
        let start = period_start_slot(period);
        Self::new(signer, start + attested_offset, start + finalized_offset)
    }

    pub fn next_committee(mut self, committee: &'a SyncCommittee) -> Self {
        self.next_committee = Some(committee);
        self
    }

    pub fn participants(mut self, participants: usize) -> Self {
        self.participants = participants;
        self
    }

    pub fn fork_version(mut self, fork_version: Version) -> Self {
        self.fork_version = fork_version;
        self
    }

    pub fn genesis_validators_root(mut self, root: Root) -> Self {
        self.genesis_validators_root = root;
        self
    }

    pub fn build(self) -> LightClientUpdate {
        let (finalized_state_root, next_sync_committee_branch) = match self.next_committee {
            Some(committee) => state_with_leaf(
                &committee.hash_tree_root(),
                NEXT_SYNC_COMMITTEE_INDEX,
                self.finalized_slot,
            ),
            None => (sha256_hash(&self.finalized_slot.to_be_bytes()), Vec::new()),
        };
        let finalized_header = header(self.finalized_slot, finalized_state_root);

        let (attested_state_root, finality_branch) = state_with_leaf(
            &finalized_header.hash_tree_root(),
            FINALIZED_ROOT_INDEX,
            self.attested_slot,
        );
        let attested_header = header(self.attested_slot, attested_state_root);

        let signing_root = sync_committee_signing_root(
            &attested_header,
            &self.fork_version,
            &self.genesis_validators_root,
        );
        let sync_aggregate = signed_aggregate(self.signer, self.participants, &signing_root);

        LightClientUpdate {
            attested_header,
            next_sync_committee: self.next_committee.cloned(),
            next_sync_committee_branch,
            finalized_header,
            finality_branch,
            sync_aggregate,
            fork_version: self.fork_version,
            signature_slot: self.attested_slot + 1,
        }
    }
}

/// A fully materialized binary Merkle tree over `ceil_pow2(n)` leaves.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// `layers[0]` is the padded leaf layer, the last layer holds only the root.
    layers: Vec<Vec<Root>>,
    leaf_count: usize,
}

impl MerkleTree {
    pub fn new(leaves: &[Root]) -> Self {
        let width = ceil_pow2(leaves.len() as u64) as usize;
        let mut bottom = leaves.to_vec();
        bottom.resize(width, [0u8; 32]);

        let mut layers = vec![bottom];
        while layers[layers.len() - 1].len() > 1 {
            let next = layers[layers.len() - 1]
                .chunks(2)
                .map(|pair| sha256_pair(&pair[0], &pair[1]))
                .collect();
            layers.push(next);
        }

        Self {
            layers,
            leaf_count: leaves.len(),
        }
    }

    pub fn root(&self) -> Root {
        self.layers[self.layers.len() - 1][0]
    }

    pub fn depth(&self) -> usize {
        self.layers.len() - 1
    }

    /// Generalized index of leaf `i`.
    pub fn generalized_index(&self, i: usize) -> GeneralizedIndex {
        (1u64 << self.depth()) + i as u64
    }

    /// Sibling hashes from leaf `i` up to (not including) the root.
    pub fn branch(&self, i: usize) -> Option<Vec<Root>> {
        if i >= self.leaf_count {
            return None;
        }
        let mut position = i;
        let mut branch = Vec::with_capacity(self.depth());
        for layer in &self.layers[..self.depth()] {
            branch.push(layer[position ^ 1]);
            position /= 2;
        }
        Some(branch)
    }
}
