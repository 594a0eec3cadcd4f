//! # Lantern Core
//!
//! Trust-minimized Ethereum beacon chain light client logic.
//!
//! This crate contains **no networking code**. Every header, committee and
//! signature handed to it is treated as adversarial until proven otherwise;
//! the only thing trusted is the checkpoint root supplied at bootstrap.
//!
//! ## Trust Model
//!
//! - **Bootstrap** (`consensus::bootstrap`): the bootstrap header must hash to
//!   a checkpoint root the caller obtained out of band, and the sync committee
//!   must be Merkle-proven against that header's state root.
//!
//! - **Updates** (`consensus::light_client`): an update is accepted only if it
//!   is fresh, stays within one sync committee period of the store, proves its
//!   finalized header (and next committee) by Merkle branch, and carries a BLS
//!   aggregate signature from at least 342 of the 512 committee members.
//!
//! - **Store** (`consensus::store`): changes only by applying a validated
//!   [`Accepted`] transition.
//!
//! ## Usage
//!
//! ```ignore
//! use lantern_core::{LightClient, NetworkConfig};
//!
//! let client = LightClient::bootstrap(NetworkConfig::mainnet(), &checkpoint_root, &bootstrap)?;
//! client.process_update(&update)?;
//! ```

pub mod client;
pub mod config;
pub mod consensus;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::{ClientError, CommitOutcome, LightClient, SharedStore, SyncReport, UpdateSource};
pub use config::{ConfigError, Fork, NetworkConfig};
pub use consensus::{
    bootstrap::{bootstrap, initialize_from_bootstrap, TrustAnchorError},
    checkpoint::{
        parse_checkpoint_hash, verify_checkpoint_consensus, CheckpointError, CheckpointReport,
        VerifiedCheckpoint,
    },
    light_client::{
        validate_light_client_update, Accepted, LightClientUpdateValidator, RejectionKind,
        UpdateError,
    },
    merkle::{verify_branch, MerkleError},
    store::{ApplyOutcome, LightClientStore},
    sync_committee::{BlsVerifier, BlstVerifier, SignatureError},
};
pub use types::beacon::*;
