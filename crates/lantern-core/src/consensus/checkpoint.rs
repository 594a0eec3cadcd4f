//! Choosing the trusted checkpoint root handed to [`bootstrap`](crate::consensus::bootstrap::bootstrap).
//!
//! This is the only step that leans on social consensus: several independent
//! operators report the finalized block root they see, and a root is only
//! accepted when enough of them agree. Everything after it is cryptographic.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::types::beacon::{Root, Slot};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckpointError {
    #[error("Insufficient checkpoint source agreement: {agreeing}/{total} sources agree (need {required})")]
    InsufficientAgreement {
        agreeing: usize,
        total: usize,
        required: usize,
    },

    #[error("Checkpoint sources are split: {roots} different roots each reported by {agreeing} sources")]
    Conflicting { roots: usize, agreeing: usize },

    #[error("Required agreement must be at least 1")]
    InvalidThreshold,

    #[error("No checkpoint sources available")]
    NoSources,

    #[error("Checkpoint hash format invalid: {reason}")]
    InvalidFormat { reason: String },
}

/// One source's view of the latest finalized checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckpointReport {
    pub block_root: Root,
    pub slot: Slot,
}

/// A checkpoint root enough sources agreed on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedCheckpoint {
    pub block_root: Root,
    /// The slot reported alongside the root by the first agreeing source.
    pub slot: Slot,
    pub source_agreement: usize,
    pub total_sources: usize,
}

/// Pick the root reported by the most sources, requiring at least
/// `required_agreement` of them. A tie for the top count is rejected rather
/// than broken arbitrarily.
pub fn verify_checkpoint_consensus(
    reports: &[CheckpointReport],
    required_agreement: usize,
) -> Result<VerifiedCheckpoint, CheckpointError> {
    if reports.is_empty() {
        return Err(CheckpointError::NoSources);
    }
    if required_agreement == 0 {
        return Err(CheckpointError::InvalidThreshold);
    }

    // root -> (first reported slot, count)
    let mut tally: HashMap<Root, (Slot, usize)> = HashMap::new();
    for report in reports {
        tally
            .entry(report.block_root)
            .or_insert((report.slot, 0))
            .1 += 1;
    }

    let agreeing = tally.values().map(|entry| entry.1).max().unwrap_or(0);
    let leaders: Vec<(&Root, &(Slot, usize))> = tally
        .iter()
        .filter(|(_, entry)| entry.1 == agreeing)
        .collect();
    debug!(
        distinct_roots = tally.len(),
        agreeing,
        total = reports.len(),
        "tallied checkpoint reports"
    );

    if agreeing < required_agreement {
        warn!(agreeing, required = required_agreement, "checkpoint sources do not agree");
        return Err(CheckpointError::InsufficientAgreement {
            agreeing,
            total: reports.len(),
            required: required_agreement,
        });
    }

    match leaders.as_slice() {
        [(root, (slot, _))] => Ok(VerifiedCheckpoint {
            block_root: **root,
            slot: *slot,
            source_agreement: agreeing,
            total_sources: reports.len(),
        }),
        _ => Err(CheckpointError::Conflicting {
            roots: leaders.len(),
            agreeing,
        }),
    }
}

/// Parse a `0x`-prefixed or bare 64-character hex block root.
pub fn parse_checkpoint_hash(hex_str: &str) -> Result<Root, CheckpointError> {
    let trimmed = hex_str.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    if digits.len() != 64 {
        return Err(CheckpointError::InvalidFormat {
            reason: format!("Expected 64 hex characters, got {}", digits.len()),
        });
    }

    let mut root = [0u8; 32];
    hex::decode_to_slice(digits, &mut root).map_err(|e| CheckpointError::InvalidFormat {
        reason: format!("Invalid hex: {}", e),
    })?;
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(byte: u8, slot: Slot) -> CheckpointReport {
        CheckpointReport {
            block_root: [byte; 32],
            slot,
        }
    }

    #[test]
    fn test_checkpoint_consensus_succeeds() {
        let reports = [
            report(0xaa, 1000),
            report(0xaa, 1000),
            report(0xaa, 1000),
            report(0xbb, 999),
        ];

        let checkpoint = verify_checkpoint_consensus(&reports, 3).unwrap();
        assert_eq!(checkpoint.block_root, [0xaa; 32]);
        assert_eq!(checkpoint.source_agreement, 3);
        assert_eq!(checkpoint.total_sources, 4);
        assert_eq!(checkpoint.slot, 1000);
    }

    #[test]
    fn test_checkpoint_consensus_fails_insufficient() {
        let reports = [
            report(0xaa, 1000),
            report(0xaa, 1000),
            report(0xbb, 999),
            report(0xcc, 999),
        ];

        let result = verify_checkpoint_consensus(&reports, 3);
        assert_eq!(
            result,
            Err(CheckpointError::InsufficientAgreement {
                agreeing: 2,
                total: 4,
                required: 3,
            })
        );
    }

    #[test]
    fn test_tied_sources_are_rejected() {
        let reports = [
            report(0xaa, 1000),
            report(0xaa, 1000),
            report(0xbb, 1000),
            report(0xbb, 1000),
        ];

        let result = verify_checkpoint_consensus(&reports, 2);
        assert_eq!(result, Err(CheckpointError::Conflicting { roots: 2, agreeing: 2 }));
    }

    #[test]
    fn test_checkpoint_consensus_fails_empty() {
        assert_eq!(verify_checkpoint_consensus(&[], 3), Err(CheckpointError::NoSources));
    }

    #[test]
    fn test_zero_threshold_is_rejected() {
        let result = verify_checkpoint_consensus(&[report(0xaa, 1)], 0);
        assert_eq!(result, Err(CheckpointError::InvalidThreshold));
    }

    #[test]
    fn test_parse_checkpoint_hash() {
        let prefixed = format!("0x{}", "aa".repeat(32));
        assert_eq!(parse_checkpoint_hash(&prefixed).unwrap(), [0xaa; 32]);

        let bare = "bb".repeat(32);
        assert_eq!(parse_checkpoint_hash(&bare).unwrap(), [0xbb; 32]);
    }

    #[test]
    fn test_parse_checkpoint_hash_invalid() {
        assert!(matches!(
            parse_checkpoint_hash("0xaabb"),
            Err(CheckpointError::InvalidFormat { .. })
        ));
        assert!(matches!(
            parse_checkpoint_hash(&"zz".repeat(32)),
            Err(CheckpointError::InvalidFormat { .. })
        ));
    }
}
