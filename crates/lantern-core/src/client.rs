//! The long-lived client: a shared store, a validator and the sync loop that feeds it.
//!
//! Validation runs against an [`Arc`] snapshot without holding any lock. Only
//! the final [`SharedStore::commit`] takes the write lock, so readers never
//! wait on signature checks.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::consensus::bootstrap::{initialize_from_bootstrap, TrustAnchorError};
use crate::consensus::light_client::{Accepted, LightClientUpdateValidator, UpdateError};
use crate::consensus::period::compute_sync_committee_period;
use crate::consensus::store::{ApplyOutcome, LightClientStore};
use crate::consensus::sync_committee::{BlsVerifier, BlstVerifier};
use crate::types::beacon::*;

/// Where bootstraps and updates come from. Nothing it returns is trusted.
pub trait UpdateSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The bootstrap for the block with root `block_root`.
    fn bootstrap(&self, block_root: &Root) -> Result<LightClientBootstrap, Self::Error>;

    /// Up to `count` updates, one per period, starting at `start_period`.
    fn updates(
        &self,
        start_period: u64,
        count: u64,
    ) -> Result<Vec<LightClientUpdate>, Self::Error>;
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Bootstrap failed: {0}")]
    TrustAnchor(#[from] TrustAnchorError),

    #[error("Update rejected: {0}")]
    Update(#[from] UpdateError),

    #[error("Update source failed: {0}")]
    Source(Box<dyn std::error::Error + Send + Sync>),
}

/// Result of committing an [`Accepted`] transition to a [`SharedStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied(ApplyOutcome),
    /// The store rotated past the period the transition was signed in; nothing was applied.
    Stale,
}

/// The store behind a single-writer lock. Readers get cheap immutable snapshots.
#[derive(Debug)]
pub struct SharedStore {
    inner: RwLock<Arc<LightClientStore>>,
}

impl SharedStore {
    pub fn new(store: LightClientStore) -> Self {
        Self {
            inner: RwLock::new(Arc::new(store)),
        }
    }

    pub fn snapshot(&self) -> Arc<LightClientStore> {
        self.inner.read().clone()
    }

    /// Apply `accepted` unless the store has already rotated past its attested period.
    ///
    /// A transition validated before a concurrent rotation still applies when it
    /// attests to the period the store rotated into; [`LightClientStore::apply`]
    /// keeps the later finalized header.
    pub fn commit(&self, accepted: &Accepted) -> CommitOutcome {
        let mut guard = self.inner.write();
        if accepted.attested_period() < guard.current_period() {
            debug!(
                attested_period = accepted.attested_period(),
                validated_against = accepted.store_period(),
                current = guard.current_period(),
                "discarding transition signed in an earlier period"
            );
            return CommitOutcome::Stale;
        }

        let (next, outcome) = guard.apply(accepted);
        if !matches!(outcome, ApplyOutcome::Redundant | ApplyOutcome::Discarded) {
            *guard = Arc::new(next);
        }
        CommitOutcome::Applied(outcome)
    }
}

/// Tally of one [`LightClient::sync`] run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub requests: usize,
    pub fetched: usize,
    /// Updates that changed the store, rotations included.
    pub applied: usize,
    pub rotations: usize,
    /// Valid updates that changed nothing.
    pub ignored: usize,
    pub rejected: usize,
    pub final_period: u64,
}

impl SyncReport {
    fn record(&mut self, outcome: CommitOutcome) {
        match outcome {
            CommitOutcome::Applied(ApplyOutcome::Rotated) => {
                self.applied += 1;
                self.rotations += 1;
            }
            CommitOutcome::Applied(ApplyOutcome::Advanced | ApplyOutcome::CommitteeLearned) => {
                self.applied += 1
            }
            CommitOutcome::Applied(ApplyOutcome::Redundant | ApplyOutcome::Discarded)
            | CommitOutcome::Stale => self.ignored += 1,
        }
    }
}

/// A bootstrapped light client for one network.
pub struct LightClient<V = BlstVerifier> {
    config: NetworkConfig,
    validator: LightClientUpdateValidator<V>,
    store: SharedStore,
}

impl LightClient<BlstVerifier> {
    /// Anchor a client to `trusted_root`. Any failure here is fatal.
    pub fn bootstrap(
        config: NetworkConfig,
        trusted_root: &Root,
        bootstrap: &LightClientBootstrap,
    ) -> Result<Self, TrustAnchorError> {
        Self::bootstrap_with_verifier(config, trusted_root, bootstrap, BlstVerifier)
    }

    /// Fetch the bootstrap for `trusted_root` from `source` and anchor to it.
    pub fn bootstrap_from_source<S: UpdateSource>(
        config: NetworkConfig,
        trusted_root: &Root,
        source: &S,
    ) -> Result<Self, ClientError> {
        let bootstrap = source
            .bootstrap(trusted_root)
            .map_err(|e| ClientError::Source(Box::new(e)))?;
        Ok(Self::bootstrap(config, trusted_root, &bootstrap)?)
    }
}

impl<V: BlsVerifier> LightClient<V> {
    pub fn bootstrap_with_verifier(
        config: NetworkConfig,
        trusted_root: &Root,
        bootstrap: &LightClientBootstrap,
        verifier: V,
    ) -> Result<Self, TrustAnchorError> {
        let store = initialize_from_bootstrap(trusted_root, bootstrap)?;
        let validator =
            LightClientUpdateValidator::with_verifier(config.genesis_validators_root, verifier);
        Ok(Self {
            config,
            validator,
            store: SharedStore::new(store),
        })
    }

    /// Validate `update` against the current snapshot and commit it.
    pub fn process_update(
        &self,
        update: &LightClientUpdate,
    ) -> Result<CommitOutcome, UpdateError> {
        let snapshot = self.store.snapshot();
        let accepted = self.validator.validate(&snapshot, update).map_err(|err| {
            warn!(
                attested_slot = update.attested_header.slot,
                kind = ?err.kind(),
                error = %err,
                "rejected light client update"
            );
            err
        })?;

        let outcome = self.store.commit(&accepted);
        match outcome {
            CommitOutcome::Applied(ApplyOutcome::Rotated) => info!(
                period = compute_sync_committee_period(accepted.finalized_header().slot),
                slot = accepted.finalized_header().slot,
                "sync committee rotated"
            ),
            CommitOutcome::Applied(ApplyOutcome::Advanced) => info!(
                slot = accepted.finalized_header().slot,
                participants = accepted.participants(),
                "finalized header advanced"
            ),
            CommitOutcome::Applied(ApplyOutcome::CommitteeLearned) => info!(
                period = compute_sync_committee_period(accepted.finalized_header().slot) + 1,
                "learned next sync committee"
            ),
            other => debug!(outcome = ?other, "update changed nothing"),
        }
        Ok(outcome)
    }

    /// Fetch and apply updates until the store reaches `target_period` or the
    /// source stops making progress. Rejected updates are skipped; a source
    /// error aborts and leaves the store at its last committed state.
    pub fn sync<S: UpdateSource>(
        &self,
        source: &S,
        target_period: u64,
    ) -> Result<SyncReport, ClientError> {
        let mut report = SyncReport::default();

        loop {
            let start_period = self.current_period();
            if start_period >= target_period {
                break;
            }
            let count = (target_period - start_period)
                .saturating_add(1)
                .min(MAX_REQUEST_LIGHT_CLIENT_UPDATES);

            debug!(start_period, count, "requesting light client updates");
            let updates = source
                .updates(start_period, count)
                .map_err(|e| ClientError::Source(Box::new(e)))?;
            report.requests += 1;
            report.fetched += updates.len();

            for update in &updates {
                match self.process_update(update) {
                    Ok(outcome) => report.record(outcome),
                    Err(_) => report.rejected += 1,
                }
            }

            if self.current_period() == start_period {
                break;
            }
        }

        report.final_period = self.current_period();
        info!(
            final_period = report.final_period,
            target_period,
            applied = report.applied,
            rejected = report.rejected,
            "sync finished"
        );
        Ok(report)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<LightClientStore> {
        self.store.snapshot()
    }

    pub fn finalized_header(&self) -> BeaconBlockHeader {
        self.store.snapshot().finalized_header().clone()
    }

    pub fn current_period(&self) -> u64 {
        self.store.snapshot().current_period()
    }

    /// Slots between the wall clock at `unix_seconds` and the finalized header.
    pub fn head_lag(&self, unix_seconds: u64) -> u64 {
        self.config
            .slot_at(unix_seconds)
            .saturating_sub(self.store.snapshot().finalized_header().slot)
    }
}
