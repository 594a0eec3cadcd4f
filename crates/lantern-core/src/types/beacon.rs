use bitvec::prelude::{BitArray, Lsb0};
use serde::{Deserialize, Serialize};

use crate::consensus::merkle::{hash_beacon_block_header, hash_sync_committee};

/// Number of validators in the Ethereum beacon chain sync committee.
pub const SYNC_COMMITTEE_SIZE: usize = 512;

/// Number of bytes in a BLS12-381 public key (compressed).
pub const BLS_PUBKEY_LEN: usize = 48;

/// Number of bytes in a BLS12-381 signature (compressed).
pub const BLS_SIGNATURE_LEN: usize = 96;

/// Slots per epoch.
pub const SLOTS_PER_EPOCH: u64 = 32;

/// Epochs per sync committee period.
pub const EPOCHS_PER_SYNC_COMMITTEE_PERIOD: u64 = 256;

/// Slots per sync committee period (256 epochs * 32 slots/epoch = 8192).
pub const SLOTS_PER_SYNC_COMMITTEE_PERIOD: u64 = SLOTS_PER_EPOCH * EPOCHS_PER_SYNC_COMMITTEE_PERIOD;

/// Domain type for sync committee signatures.
pub const DOMAIN_SYNC_COMMITTEE: [u8; 4] = [0x07, 0x00, 0x00, 0x00];

/// Minimum number of sync committee participants required: ceil(2/3 * 512).
pub const MIN_SYNC_COMMITTEE_PARTICIPANTS: usize = (SYNC_COMMITTEE_SIZE * 2 + 2) / 3;

/// Generalized index of `BeaconState.current_sync_committee`.
pub const CURRENT_SYNC_COMMITTEE_INDEX: u64 = 54;

/// Generalized index of `BeaconState.next_sync_committee`.
pub const NEXT_SYNC_COMMITTEE_INDEX: u64 = 55;

/// Generalized index of `BeaconState.finalized_checkpoint.root`.
pub const FINALIZED_ROOT_INDEX: u64 = 105;

/// Upper bound on updates a beacon node returns for one range request.
pub const MAX_REQUEST_LIGHT_CLIENT_UPDATES: u64 = 128;

/// A 32-byte SSZ root (tree top or any internal node).
pub type Root = [u8; 32];

/// A 4-byte fork version.
pub type Version = [u8; 4];

pub type Slot = u64;

/// Position of a node in a binary Merkle tree: 1 is the root, `2k`/`2k+1` are the children of `k`.
pub type GeneralizedIndex = u64;

/// The 512-bit participation vector of a sync aggregate (bit `i` = member `i` signed).
/// Bit order matches SSZ `Bitvector`: byte `i / 8`, least significant bit first.
pub type ParticipationBits = BitArray<[u8; SYNC_COMMITTEE_SIZE / 8], Lsb0>;

/// A BLS12-381 public key (48 bytes, compressed G1 point).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlsPublicKey(pub [u8; BLS_PUBKEY_LEN]);

impl Serialize for BlsPublicKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_hex::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for BlsPublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_hex::deserialize(deserializer).map(Self)
    }
}

/// A BLS12-381 signature (96 bytes, compressed G2 point).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlsSignature(pub [u8; BLS_SIGNATURE_LEN]);

impl Serialize for BlsSignature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_hex::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for BlsSignature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_hex::deserialize(deserializer).map(Self)
    }
}

/// A beacon chain block header.
/// Enough to verify the chain without storing full blocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconBlockHeader {
    /// Slot number of this block.
    pub slot: Slot,
    /// Index of the validator who proposed this block.
    pub proposer_index: u64,
    /// Root hash of the parent beacon block.
    #[serde(with = "serde_hex")]
    pub parent_root: Root,
    /// Root hash of the beacon state after processing this block.
    #[serde(with = "serde_hex")]
    pub state_root: Root,
    /// Root hash of the block body.
    #[serde(with = "serde_hex")]
    pub body_root: Root,
}

impl BeaconBlockHeader {
    /// SSZ `hash_tree_root` of the header, i.e. the beacon block root.
    pub fn hash_tree_root(&self) -> Root {
        hash_beacon_block_header(self)
    }
}

/// The sync committee: 512 validators that sign off on the chain head.
/// Rotates every ~27 hours (256 epochs).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCommittee {
    /// 512 BLS public keys of committee members.
    pub pubkeys: Vec<BlsPublicKey>,
    /// Aggregated public key of the full committee.
    pub aggregate_pubkey: BlsPublicKey,
}

impl SyncCommittee {
    /// Validate the sync committee has the correct number of members.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.pubkeys.len() != SYNC_COMMITTEE_SIZE {
            return Err("Sync committee must have exactly 512 members");
        }
        Ok(())
    }

    /// SSZ `hash_tree_root` of the committee, the leaf proven inside a beacon state.
    pub fn hash_tree_root(&self) -> Root {
        hash_sync_committee(self)
    }
}

/// The aggregate BLS signature from the sync committee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAggregate {
    /// Which of the 512 committee members signed.
    #[serde(with = "serde_bits")]
    pub sync_committee_bits: ParticipationBits,
    /// The aggregated BLS signature from all participating members.
    pub sync_committee_signature: BlsSignature,
}

impl SyncAggregate {
    /// Build an aggregate from the raw 64-byte SSZ bitvector.
    pub fn from_raw_bits(bits: [u8; SYNC_COMMITTEE_SIZE / 8], signature: BlsSignature) -> Self {
        Self {
            sync_committee_bits: ParticipationBits::new(bits),
            sync_committee_signature: signature,
        }
    }

    /// Count how many sync committee members participated (set bits).
    pub fn num_participants(&self) -> usize {
        self.sync_committee_bits.count_ones()
    }

    /// Get the indices of all participating committee members.
    pub fn participant_indices(&self) -> Vec<usize> {
        self.sync_committee_bits.iter_ones().collect()
    }
}

/// A light client update from the beacon chain.
///
/// A claim that at `attested_header.slot` the sync committee attested to the header,
/// and that inside its state both the next committee and a more recent finalized
/// header can be proven. Every field must be verified before anything is trusted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightClientUpdate {
    /// The header that the sync committee is attesting to.
    pub attested_header: BeaconBlockHeader,
    /// The next sync committee (absent in finality-only updates).
    pub next_sync_committee: Option<SyncCommittee>,
    /// Merkle branch proving next_sync_committee against the finalized state.
    pub next_sync_committee_branch: Vec<Root>,
    /// The latest finalized header that this update references.
    pub finalized_header: BeaconBlockHeader,
    /// Merkle branch proving finalized_header against the attested state.
    pub finality_branch: Vec<Root>,
    /// The aggregate signature from the sync committee.
    pub sync_aggregate: SyncAggregate,
    /// Fork version the aggregate signature was produced under.
    #[serde(with = "serde_hex")]
    pub fork_version: Version,
    /// The slot at which the signature was produced.
    pub signature_slot: Slot,
}

/// A light client bootstrap, the initial data needed to start syncing.
/// Contains the trusted checkpoint header and the current sync committee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightClientBootstrap {
    /// The beacon block header at the checkpoint.
    pub header: BeaconBlockHeader,
    /// The current sync committee at the checkpoint.
    pub current_sync_committee: SyncCommittee,
    /// Merkle branch proving current_sync_committee against the beacon state.
    pub current_sync_committee_branch: Vec<Root>,
}

/// `0x`-prefixed hex for fixed-width byte arrays.
pub(crate) mod serde_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
            serde::de::Error::custom(format!("expected {} bytes, got {}", N, bytes.len()))
        })
    }
}

mod serde_bits {
    use super::{serde_hex, ParticipationBits};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bits: &ParticipationBits,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bits.as_raw_slice())))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<ParticipationBits, D::Error> {
        serde_hex::deserialize(deserializer).map(ParticipationBits::new)
    }
}
