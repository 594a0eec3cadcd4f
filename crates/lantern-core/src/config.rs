//! Per-network parameters: the chain identity signatures are bound to, and the fork schedule.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consensus::period::compute_epoch_at_slot;
use crate::types::beacon::{serde_hex, Root, Slot, Version};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid network config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Network {0} has an empty fork schedule")]
    EmptyForkSchedule(String),

    #[error("Fork {name} at epoch {epoch} activates before the preceding fork at epoch {previous}")]
    UnorderedForks { name: String, epoch: u64, previous: u64 },

    #[error("seconds_per_slot must be non-zero")]
    ZeroSlotDuration,
}

/// One entry of a fork schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fork {
    pub name: String,
    #[serde(with = "serde_hex")]
    pub version: Version,
    pub epoch: u64,
}

impl Fork {
    fn new(name: &str, version: Version, epoch: u64) -> Self {
        Self {
            name: name.to_string(),
            version,
            epoch,
        }
    }
}

/// Identity and timing of a beacon chain network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    #[serde(with = "serde_hex")]
    pub genesis_validators_root: Root,
    /// Unix time of slot 0.
    pub genesis_time: u64,
    pub seconds_per_slot: u64,
    /// Forks in activation order, starting with genesis.
    pub forks: Vec<Fork>,
}

impl NetworkConfig {
    pub fn mainnet() -> Self {
        Self {
            name: "mainnet".to_string(),
            genesis_validators_root: [
                0x4b, 0x36, 0x3d, 0xb9, 0x4e, 0x28, 0x61, 0x20, 0xd7, 0x6e, 0xb9, 0x05, 0x34, 0x0f,
                0xdd, 0x4e, 0x54, 0xbf, 0xe9, 0xf0, 0x6b, 0xf3, 0x3f, 0xf6, 0xcf, 0x5a, 0xd2, 0x7f,
                0x51, 0x1b, 0xfe, 0x95,
            ],
            genesis_time: 1606824023,
            seconds_per_slot: 12,
            forks: vec![
                Fork::new("phase0", [0x00, 0x00, 0x00, 0x00], 0),
                Fork::new("altair", [0x01, 0x00, 0x00, 0x00], 74240),
                Fork::new("bellatrix", [0x02, 0x00, 0x00, 0x00], 144896),
                Fork::new("capella", [0x03, 0x00, 0x00, 0x00], 194048),
                Fork::new("deneb", [0x04, 0x00, 0x00, 0x00], 269568),
                Fork::new("electra", [0x05, 0x00, 0x00, 0x00], 364032),
            ],
        }
    }

    pub fn sepolia() -> Self {
        Self {
            name: "sepolia".to_string(),
            genesis_validators_root: [
                0xd8, 0xea, 0x17, 0x1f, 0x3c, 0x94, 0xae, 0xa2, 0x1e, 0xbc, 0x42, 0xa1, 0xed, 0x61,
                0x05, 0x2a, 0xcf, 0x3f, 0x92, 0x09, 0xc0, 0x0e, 0x4e, 0xfb, 0xaa, 0xdd, 0xac, 0x09,
                0xed, 0x9b, 0x80, 0x78,
            ],
            genesis_time: 1655733600,
            seconds_per_slot: 12,
            forks: vec![
                Fork::new("phase0", [0x90, 0x00, 0x00, 0x69], 0),
                Fork::new("altair", [0x90, 0x00, 0x00, 0x70], 50),
                Fork::new("bellatrix", [0x90, 0x00, 0x00, 0x71], 100),
                Fork::new("capella", [0x90, 0x00, 0x00, 0x72], 56832),
                Fork::new("deneb", [0x90, 0x00, 0x00, 0x73], 132608),
                Fork::new("electra", [0x90, 0x00, 0x00, 0x74], 222464),
            ],
        }
    }

    /// Parse and validate a custom network description.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: NetworkConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seconds_per_slot == 0 {
            return Err(ConfigError::ZeroSlotDuration);
        }
        if self.forks.is_empty() {
            return Err(ConfigError::EmptyForkSchedule(self.name.clone()));
        }
        for pair in self.forks.windows(2) {
            if pair[1].epoch < pair[0].epoch {
                return Err(ConfigError::UnorderedForks {
                    name: pair[1].name.clone(),
                    epoch: pair[1].epoch,
                    previous: pair[0].epoch,
                });
            }
        }
        Ok(())
    }

    /// Current slot at `unix_seconds`; 0 before genesis.
    pub fn slot_at(&self, unix_seconds: u64) -> Slot {
        unix_seconds.saturating_sub(self.genesis_time) / self.seconds_per_slot.max(1)
    }

    /// The latest fork active at `epoch`.
    pub fn fork_at_epoch(&self, epoch: u64) -> Option<&Fork> {
        self.forks.iter().rev().find(|fork| fork.epoch <= epoch)
    }

    pub fn fork_version_at_epoch(&self, epoch: u64) -> Option<Version> {
        self.fork_at_epoch(epoch).map(|fork| fork.version)
    }

    pub fn fork_version_at_slot(&self, slot: Slot) -> Option<Version> {
        self.fork_version_at_epoch(compute_epoch_at_slot(slot))
    }

    /// Resolve a fork name as reported by a beacon node (case-insensitive).
    pub fn fork_version_by_name(&self, name: &str) -> Option<Version> {
        self.forks
            .iter()
            .find(|fork| fork.name.eq_ignore_ascii_case(name))
            .map(|fork| fork.version)
    }
}
