//! Hyperdrive protocol model: fixed-point pricing formulas, asset ids,
//! pool state snapshots, event decoding and the on-chain client.

pub mod asset_id;
pub mod calculator;
pub mod client;
pub mod events;
pub mod scaled;
pub mod state;

pub use asset_id::{decode_asset_id, encode_asset_id, AssetIdPrefix};
pub use client::HyperdriveClient;
pub use events::{HyperdriveLog, TokenDelta, TokenKind};
pub use scaled::convert_scaled_value;
pub use state::{BlockInfo, Checkpoint, PoolConfig, PoolInfo, PoolState};
