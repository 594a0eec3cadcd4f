pub mod bootstrap;
pub mod checkpoint;
pub mod light_client;
pub mod merkle;
pub mod period;
pub mod store;
pub mod sync_committee;

pub use bootstrap::*;
pub use checkpoint::*;
pub use light_client::*;
pub use merkle::{verify_branch, verify_merkle_branch, MerkleError};
pub use period::*;
pub use store::*;
pub use sync_committee::*;
