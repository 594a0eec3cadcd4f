//! Serde models of the beacon REST light client responses and their conversion to core types.

use lantern_core::types::beacon::*;
use lantern_core::NetworkConfig;
use serde::Deserialize;

use crate::BeaconApiError;

// ---------------------------------------------------------------------------
// Hex and integer helpers
// ---------------------------------------------------------------------------

pub fn hex_to_bytes(field: &str, s: &str) -> Result<Vec<u8>, BeaconApiError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|source| BeaconApiError::Hex {
        field: field.to_string(),
        source,
    })
}

pub fn hex_to_array<const N: usize>(field: &str, s: &str) -> Result<[u8; N], BeaconApiError> {
    let bytes = hex_to_bytes(field, s)?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| BeaconApiError::Length {
        field: field.to_string(),
        expected: N,
        got: bytes.len(),
    })
}

pub fn hex_to_bytes32(field: &str, s: &str) -> Result<Root, BeaconApiError> {
    hex_to_array::<32>(field, s)
}

fn parse_u64_string(field: &str, s: &str) -> Result<u64, BeaconApiError> {
    s.parse::<u64>().map_err(|_| BeaconApiError::Integer {
        field: field.to_string(),
        value: s.to_string(),
    })
}

fn branch_to_core(field: &str, branch: &[String]) -> Result<Vec<Root>, BeaconApiError> {
    branch
        .iter()
        .enumerate()
        .map(|(i, node)| hex_to_bytes32(&format!("{}[{}]", field, i), node))
        .collect()
}

// ---------------------------------------------------------------------------
// Bootstrap: GET /eth/v1/beacon/light_client/bootstrap/{block_root}
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
pub struct ApiBootstrapResponse {
    #[serde(default)]
    pub version: Option<String>,
    pub data: ApiBootstrapData,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApiBootstrapData {
    pub header: ApiLightClientHeader,
    pub current_sync_committee: ApiSyncCommittee,
    pub current_sync_committee_branch: Vec<String>,
}

impl ApiBootstrapData {
    pub fn to_core_bootstrap(&self) -> Result<LightClientBootstrap, BeaconApiError> {
        Ok(LightClientBootstrap {
            header: self.header.beacon().to_core()?,
            current_sync_committee: self
                .current_sync_committee
                .to_core("current_sync_committee")?,
            current_sync_committee_branch: branch_to_core(
                "current_sync_committee_branch",
                &self.current_sync_committee_branch,
            )?,
        })
    }
}

// ---------------------------------------------------------------------------
// Updates: GET /eth/v1/beacon/light_client/updates?start_period={p}&count={n}
// ---------------------------------------------------------------------------

/// Nodes answer either with a bare array of `{version, data}` objects or with
/// a `{"data": [...]}` envelope.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiUpdatesResponse {
    Versioned(Vec<ApiVersionedUpdate>),
    Wrapped { data: Vec<ApiLightClientUpdateData> },
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApiVersionedUpdate {
    #[serde(default)]
    pub version: Option<String>,
    pub data: ApiLightClientUpdateData,
}

impl ApiUpdatesResponse {
    /// Convert every update, resolving fork versions against `config`.
    pub fn to_core_updates(
        &self,
        config: &NetworkConfig,
    ) -> Result<Vec<LightClientUpdate>, BeaconApiError> {
        match self {
            ApiUpdatesResponse::Versioned(updates) => updates
                .iter()
                .map(|u| u.data.to_core_update(u.version.as_deref(), config))
                .collect(),
            ApiUpdatesResponse::Wrapped { data } => data
                .iter()
                .map(|u| u.to_core_update(None, config))
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApiLightClientUpdateData {
    pub attested_header: ApiLightClientHeader,
    #[serde(default)]
    pub next_sync_committee: Option<ApiSyncCommittee>,
    #[serde(default)]
    pub next_sync_committee_branch: Vec<String>,
    pub finalized_header: ApiLightClientHeader,
    pub finality_branch: Vec<String>,
    pub sync_aggregate: ApiSyncAggregate,
    pub signature_slot: String,
    /// Not part of the standard response; honoured when a relay includes it.
    #[serde(default)]
    pub fork_version: Option<String>,
}

impl ApiLightClientUpdateData {
    /// Convert to a core update.
    ///
    /// The signing fork version is, in order of preference: the explicit
    /// `fork_version` field, the response's `version` name looked up in the
    /// network's fork schedule, or the fork active at `signature_slot - 1`.
    pub fn to_core_update(
        &self,
        version: Option<&str>,
        config: &NetworkConfig,
    ) -> Result<LightClientUpdate, BeaconApiError> {
        let signature_slot = parse_u64_string("signature_slot", &self.signature_slot)?;

        let fork_version = match (&self.fork_version, version) {
            (Some(explicit), _) => hex_to_array::<4>("fork_version", explicit)?,
            (None, Some(name)) => match config.fork_version_by_name(name) {
                Some(v) => v,
                None => fork_at_signature(config, signature_slot)?,
            },
            (None, None) => fork_at_signature(config, signature_slot)?,
        };

        let next_sync_committee = self
            .next_sync_committee
            .as_ref()
            .map(|c| c.to_core("next_sync_committee"))
            .transpose()?;

        Ok(LightClientUpdate {
            attested_header: self.attested_header.beacon().to_core()?,
            next_sync_committee,
            next_sync_committee_branch: branch_to_core(
                "next_sync_committee_branch",
                &self.next_sync_committee_branch,
            )?,
            finalized_header: self.finalized_header.beacon().to_core()?,
            finality_branch: branch_to_core("finality_branch", &self.finality_branch)?,
            sync_aggregate: self.sync_aggregate.to_core()?,
            fork_version,
            signature_slot,
        })
    }
}

fn fork_at_signature(
    config: &NetworkConfig,
    signature_slot: Slot,
) -> Result<Version, BeaconApiError> {
    config
        .fork_version_at_slot(signature_slot.saturating_sub(1))
        .ok_or(BeaconApiError::Missing("fork version for signature slot"))
}

// ---------------------------------------------------------------------------
// Shared sub-structures
// ---------------------------------------------------------------------------

/// Post-Capella nodes wrap the beacon header next to execution data; older
/// ones return the header itself.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiLightClientHeader {
    Wrapped { beacon: ApiBeaconBlockHeader },
    Bare(ApiBeaconBlockHeader),
}

impl ApiLightClientHeader {
    pub fn beacon(&self) -> &ApiBeaconBlockHeader {
        match self {
            ApiLightClientHeader::Wrapped { beacon } => beacon,
            ApiLightClientHeader::Bare(header) => header,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApiBeaconBlockHeader {
    pub slot: String,
    pub proposer_index: String,
    pub parent_root: String,
    pub state_root: String,
    pub body_root: String,
}

impl ApiBeaconBlockHeader {
    pub fn to_core(&self) -> Result<BeaconBlockHeader, BeaconApiError> {
        Ok(BeaconBlockHeader {
            slot: parse_u64_string("slot", &self.slot)?,
            proposer_index: parse_u64_string("proposer_index", &self.proposer_index)?,
            parent_root: hex_to_bytes32("parent_root", &self.parent_root)?,
            state_root: hex_to_bytes32("state_root", &self.state_root)?,
            body_root: hex_to_bytes32("body_root", &self.body_root)?,
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApiSyncAggregate {
    pub sync_committee_bits: String,
    pub sync_committee_signature: String,
}

impl ApiSyncAggregate {
    pub fn to_core(&self) -> Result<SyncAggregate, BeaconApiError> {
        let bits = hex_to_array::<{ SYNC_COMMITTEE_SIZE / 8 }>(
            "sync_committee_bits",
            &self.sync_committee_bits,
        )?;
        let signature = hex_to_array::<BLS_SIGNATURE_LEN>(
            "sync_committee_signature",
            &self.sync_committee_signature,
        )?;
        Ok(SyncAggregate::from_raw_bits(bits, BlsSignature(signature)))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApiSyncCommittee {
    pub pubkeys: Vec<String>,
    pub aggregate_pubkey: String,
}

impl ApiSyncCommittee {
    pub fn to_core(&self, field: &str) -> Result<SyncCommittee, BeaconApiError> {
        if self.pubkeys.len() != SYNC_COMMITTEE_SIZE {
            return Err(BeaconApiError::Length {
                field: format!("{}.pubkeys", field),
                expected: SYNC_COMMITTEE_SIZE,
                got: self.pubkeys.len(),
            });
        }

        let pubkeys = self
            .pubkeys
            .iter()
            .enumerate()
            .map(|(i, pk)| {
                hex_to_array::<BLS_PUBKEY_LEN>(&format!("{}.pubkeys[{}]", field, i), pk)
                    .map(BlsPublicKey)
            })
            .collect::<Result<_, _>>()?;

        let aggregate_pubkey = hex_to_array::<BLS_PUBKEY_LEN>(
            &format!("{}.aggregate_pubkey", field),
            &self.aggregate_pubkey,
        )
        .map(BlsPublicKey)?;

        Ok(SyncCommittee {
            pubkeys,
            aggregate_pubkey,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn api_header(slot: &str) -> ApiBeaconBlockHeader {
        ApiBeaconBlockHeader {
            slot: slot.into(),
            proposer_index: "42".into(),
            parent_root: "0x0000000000000000000000000000000000000000000000000000000000000001".into(),
            state_root: "0x0000000000000000000000000000000000000000000000000000000000000002".into(),
            body_root: "0000000000000000000000000000000000000000000000000000000000000003".into(),
        }
    }

    #[test]
    fn test_hex_to_bytes32() {
        let encoded = format!("0x{}01", "00".repeat(31));
        let root = hex_to_bytes32("root", &encoded).unwrap();
        assert_eq!(root[31], 1);
        assert_eq!(root[0], 0);
    }

    #[test]
    fn test_hex_wrong_length() {
        let err = hex_to_bytes32("state_root", "0xaabb").unwrap_err();
        assert!(matches!(
            err,
            BeaconApiError::Length { expected: 32, got: 2, ref field } if field == "state_root"
        ));
        assert!(matches!(hex_to_bytes32("x", "0xzz"), Err(BeaconApiError::Hex { .. })));
    }

    #[test]
    fn test_parse_u64_string() {
        assert_eq!(parse_u64_string("slot", "12345").unwrap(), 12345);
        assert!(matches!(
            parse_u64_string("slot", "-1"),
            Err(BeaconApiError::Integer { .. })
        ));
    }

    #[test]
    fn test_api_beacon_header_conversion() {
        let core = api_header("100").to_core().unwrap();
        assert_eq!(core.slot, 100);
        assert_eq!(core.proposer_index, 42);
        assert_eq!(
            core.parent_root,
            hex!("0000000000000000000000000000000000000000000000000000000000000001")
        );
        assert_eq!(
            core.body_root,
            hex!("0000000000000000000000000000000000000000000000000000000000000003")
        );
    }

    #[test]
    fn test_light_client_header_forms() {
        let wrapped: ApiLightClientHeader = serde_json::from_str(
            r#"{"beacon": {"slot": "7", "proposer_index": "1",
                "parent_root": "0x0000000000000000000000000000000000000000000000000000000000000000",
                "state_root": "0x0000000000000000000000000000000000000000000000000000000000000000",
                "body_root": "0x0000000000000000000000000000000000000000000000000000000000000000"},
               "execution": {"block_number": "1"}, "execution_branch": []}"#,
        )
        .unwrap();
        assert_eq!(wrapped.beacon().slot, "7");

        let bare: ApiLightClientHeader = serde_json::from_str(
            r#"{"slot": "8", "proposer_index": "1",
                "parent_root": "0x0000000000000000000000000000000000000000000000000000000000000000",
                "state_root": "0x0000000000000000000000000000000000000000000000000000000000000000",
                "body_root": "0x0000000000000000000000000000000000000000000000000000000000000000"}"#,
        )
        .unwrap();
        assert_eq!(bare.beacon().slot, "8");
    }

    #[test]
    fn test_sync_aggregate_requires_full_bitvector() {
        let aggregate = ApiSyncAggregate {
            sync_committee_bits: format!("0x{}", "ff".repeat(63)),
            sync_committee_signature: format!("0x{}", "00".repeat(96)),
        };
        assert!(matches!(
            aggregate.to_core(),
            Err(BeaconApiError::Length { expected: 64, got: 63, .. })
        ));

        let aggregate = ApiSyncAggregate {
            sync_committee_bits: format!("0x{}{}", "ff".repeat(48), "00".repeat(16)),
            sync_committee_signature: format!("0x{}", "00".repeat(96)),
        };
        assert_eq!(aggregate.to_core().unwrap().num_participants(), 384);
    }

    #[test]
    fn test_short_committee_is_rejected() {
        let committee = ApiSyncCommittee {
            pubkeys: vec![format!("0x{}", "11".repeat(48)); 10],
            aggregate_pubkey: format!("0x{}", "11".repeat(48)),
        };
        assert!(matches!(
            committee.to_core("current_sync_committee"),
            Err(BeaconApiError::Length { expected: 512, got: 10, .. })
        ));
    }
}
