//! Hyperdrive Asset Ids
//!
//! Hyperdrive's multi-token ids pack a one-byte prefix (position kind) into
//! the top 8 bits and the maturity timestamp into the low 248 bits.

use alloy::primitives::U256;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bit offset of the prefix byte
const PREFIX_SHIFT: usize = 248;

/// Position kind encoded in an asset id's top byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetIdPrefix {
    Lp = 0,
    Long = 1,
    Short = 2,
    WithdrawalShare = 3,
}

impl TryFrom<u8> for AssetIdPrefix {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(AssetIdPrefix::Lp),
            1 => Ok(AssetIdPrefix::Long),
            2 => Ok(AssetIdPrefix::Short),
            3 => Ok(AssetIdPrefix::WithdrawalShare),
            other => bail!("Unknown asset id prefix: {}", other),
        }
    }
}

impl fmt::Display for AssetIdPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AssetIdPrefix::Lp => write!(f, "LP"),
            AssetIdPrefix::Long => write!(f, "LONG"),
            AssetIdPrefix::Short => write!(f, "SHORT"),
            AssetIdPrefix::WithdrawalShare => write!(f, "WITHDRAWAL_SHARE"),
        }
    }
}

/// prefix << 248 | timestamp
pub fn encode_asset_id(prefix: AssetIdPrefix, timestamp: u64) -> U256 {
    (U256::from(prefix as u8) << PREFIX_SHIFT) | U256::from(timestamp)
}

/// Split an asset id back into its prefix and timestamp.
pub fn decode_asset_id(asset_id: U256) -> Result<(AssetIdPrefix, u64)> {
    let prefix: u8 = (asset_id >> PREFIX_SHIFT).saturating_to();
    let mask = (U256::from(1) << PREFIX_SHIFT) - U256::from(1);
    let timestamp = asset_id & mask;
    if timestamp > U256::from(u64::MAX) {
        bail!("Asset id timestamp does not fit in u64: {}", timestamp);
    }
    Ok((AssetIdPrefix::try_from(prefix)?, timestamp.saturating_to()))
}
