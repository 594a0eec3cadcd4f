//! # Lantern Beacon API
//!
//! Glue between a beacon node's REST light client endpoints and `lantern-core`.
//!
//! The beacon node is a data transport only. Nothing decoded here is trusted:
//! every bootstrap and update is handed to the core, which verifies it against
//! the checkpoint root and the sync committee signatures.
//!
//! The REST JSON differs from the core types in a few ways:
//! - integers are decimal strings (`"12345"`)
//! - byte strings are `0x`-prefixed hex
//! - headers are nested as `{ beacon: {...}, execution: {...} }`
//! - responses are wrapped in `{ data: ... }`
//!
//! HTTP itself is left to the embedder through the [`Transport`] trait.

pub mod api;
pub mod source;

use thiserror::Error;

pub use api::*;
pub use source::{BeaconApiSource, Transport};

/// Errors turning beacon API responses into core types.
#[derive(Debug, Error)]
pub enum BeaconApiError {
    #[error("Invalid hex in {field}: {source}")]
    Hex {
        field: String,
        #[source]
        source: hex::FromHexError,
    },

    #[error("{field}: expected {expected} bytes, got {got}")]
    Length {
        field: String,
        expected: usize,
        got: usize,
    },

    #[error("{field}: invalid integer {value:?}")]
    Integer { field: String, value: String },

    #[error("Invalid response JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Transport failed: {0}")]
    Transport(String),

    #[error("Missing {0}")]
    Missing(&'static str),
}
