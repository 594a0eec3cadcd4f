//! [`UpdateSource`] over the beacon REST API.

use lantern_core::types::beacon::*;
use lantern_core::{NetworkConfig, UpdateSource};
use tracing::{debug, warn};

use crate::api::{ApiBootstrapResponse, ApiUpdatesResponse};
use crate::BeaconApiError;

/// Fetches a path (e.g. `/eth/v1/beacon/light_client/bootstrap/0x..`) from one
/// beacon node and returns the response body.
pub trait Transport {
    fn get(&self, path: &str) -> Result<String, BeaconApiError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, path: &str) -> Result<String, BeaconApiError> {
        (**self).get(path)
    }
}

/// A beacon node as a source of (unverified) bootstraps and updates.
pub struct BeaconApiSource<T> {
    transport: T,
    config: NetworkConfig,
}

impl<T: Transport> BeaconApiSource<T> {
    pub fn new(transport: T, config: NetworkConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    fn fetch(&self, path: &str) -> Result<String, BeaconApiError> {
        debug!(path, "beacon API request");
        self.transport.get(path).map_err(|err| {
            warn!(path, error = %err, "beacon API request failed");
            err
        })
    }
}

impl<T: Transport> UpdateSource for BeaconApiSource<T> {
    type Error = BeaconApiError;

    fn bootstrap(&self, block_root: &Root) -> Result<LightClientBootstrap, BeaconApiError> {
        let path = format!("/eth/v1/beacon/light_client/bootstrap/0x{}", hex::encode(block_root));
        let body = self.fetch(&path)?;
        let response: ApiBootstrapResponse = serde_json::from_str(&body)?;
        response.data.to_core_bootstrap()
    }

    fn updates(
        &self,
        start_period: u64,
        count: u64,
    ) -> Result<Vec<LightClientUpdate>, BeaconApiError> {
        let count = count.clamp(1, MAX_REQUEST_LIGHT_CLIENT_UPDATES);
        let path = format!(
            "/eth/v1/beacon/light_client/updates?start_period={}&count={}",
            start_period, count
        );
        let body = self.fetch(&path)?;
        let response: ApiUpdatesResponse = serde_json::from_str(&body)?;
        response.to_core_updates(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records requested paths and answers every request with the same body.
    struct Recorder {
        paths: RefCell<Vec<String>>,
        body: String,
    }

    impl Transport for Recorder {
        fn get(&self, path: &str) -> Result<String, BeaconApiError> {
            self.paths.borrow_mut().push(path.to_string());
            Ok(self.body.clone())
        }
    }

    fn recorder(body: &str) -> Recorder {
        Recorder {
            paths: Default::default(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_updates_request_is_clamped() {
        let transport = recorder("[]");
        let source = BeaconApiSource::new(&transport, NetworkConfig::mainnet());

        assert!(source.updates(900, 1000).unwrap().is_empty());
        assert!(source.updates(900, 0).unwrap().is_empty());
        assert_eq!(
            *transport.paths.borrow(),
            vec![
                "/eth/v1/beacon/light_client/updates?start_period=900&count=128".to_string(),
                "/eth/v1/beacon/light_client/updates?start_period=900&count=1".to_string(),
            ]
        );
    }

    #[test]
    fn test_bootstrap_path_uses_hex_root() {
        let transport = recorder("{}");
        let source = BeaconApiSource::new(&transport, NetworkConfig::mainnet());

        let err = source.bootstrap(&[0xab; 32]).unwrap_err();
        assert!(matches!(err, BeaconApiError::Json(_)));
        assert_eq!(
            transport.paths.borrow()[0],
            format!("/eth/v1/beacon/light_client/bootstrap/0x{}", "ab".repeat(32))
        );
    }

    #[test]
    fn test_wrapped_empty_updates() {
        let source = BeaconApiSource::new(recorder(r#"{"data": []}"#), NetworkConfig::sepolia());
        assert!(source.updates(1, 2).unwrap().is_empty());
    }
}
