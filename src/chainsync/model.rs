//! Chainsync Rows
//!
//! One struct per Postgres table. Scaled on-chain integers are stored as
//! NUMERIC via `convert_scaled_value`; timestamps are UTC.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Tables written by acquire-data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainsyncTable {
    PoolConfig,
    PoolInfo,
    CheckpointInfo,
    Transactions,
    WalletDeltas,
    WalletInfo,
    UserMap,
}

impl ChainsyncTable {
    pub const ALL: [ChainsyncTable; 7] = [
        ChainsyncTable::PoolConfig,
        ChainsyncTable::PoolInfo,
        ChainsyncTable::CheckpointInfo,
        ChainsyncTable::Transactions,
        ChainsyncTable::WalletDeltas,
        ChainsyncTable::WalletInfo,
        ChainsyncTable::UserMap,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ChainsyncTable::PoolConfig => "pool_config",
            ChainsyncTable::PoolInfo => "pool_info",
            ChainsyncTable::CheckpointInfo => "checkpoint_info",
            ChainsyncTable::Transactions => "transactions",
            ChainsyncTable::WalletDeltas => "wallet_deltas",
            ChainsyncTable::WalletInfo => "wallet_info",
            ChainsyncTable::UserMap => "user_map",
        }
    }

    /// Whether the table carries a `block_number` column
    pub fn has_block_number(&self) -> bool {
        !matches!(self, ChainsyncTable::PoolConfig | ChainsyncTable::UserMap)
    }
}

impl fmt::Display for ChainsyncTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PoolConfigRow {
    pub contract_address: String,
    pub base_token: String,
    pub initial_share_price: Option<Decimal>,
    pub minimum_share_reserves: Option<Decimal>,
    pub minimum_transaction_amount: Option<Decimal>,
    pub position_duration: i64,
    pub checkpoint_duration: i64,
    pub time_stretch: Option<Decimal>,
    pub governance: String,
    pub fee_collector: String,
    pub curve_fee: Option<Decimal>,
    pub flat_fee: Option<Decimal>,
    pub governance_fee: Option<Decimal>,
    pub oracle_size: Option<Decimal>,
    pub update_gap: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PoolInfoRow {
    pub block_number: i64,
    pub timestamp: DateTime<Utc>,
    pub share_reserves: Option<Decimal>,
    pub share_adjustment: Option<Decimal>,
    pub bond_reserves: Option<Decimal>,
    pub lp_total_supply: Option<Decimal>,
    pub share_price: Option<Decimal>,
    pub longs_outstanding: Option<Decimal>,
    pub long_average_maturity_time: Option<Decimal>,
    pub shorts_outstanding: Option<Decimal>,
    pub short_average_maturity_time: Option<Decimal>,
    pub withdrawal_shares_ready_to_withdraw: Option<Decimal>,
    pub withdrawal_shares_proceeds: Option<Decimal>,
    pub lp_share_price: Option<Decimal>,
    pub long_exposure: Option<Decimal>,
    pub spot_price: Option<Decimal>,
    pub fixed_rate: Option<Decimal>,
    pub variable_rate: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CheckpointInfoRow {
    pub block_number: i64,
    pub checkpoint_time: i64,
    pub share_price: Option<Decimal>,
    pub long_exposure: Option<Decimal>,
}

/// One decoded Hyperdrive event
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct TransactionRow {
    pub block_number: i64,
    pub transaction_index: i64,
    pub log_index: i64,
    pub transaction_hash: String,
    pub event_name: String,
    pub trader: Option<String>,
    /// Decimal string; asset ids exceed NUMERIC's decimal mapping
    pub asset_id: Option<String>,
    pub maturity_time: Option<i64>,
    pub base_amount: Option<Decimal>,
    pub bond_amount: Option<Decimal>,
    pub lp_amount: Option<Decimal>,
    pub withdrawal_share_amount: Option<Decimal>,
    pub share_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct WalletDeltaRow {
    pub block_number: i64,
    pub transaction_hash: String,
    pub wallet_address: String,
    /// BASE, LP, WITHDRAWAL_SHARE, LONG or SHORT
    pub base_token_type: String,
    /// `base_token_type` with `-<maturity>` for longs and shorts
    pub token_type: String,
    pub maturity_time: Option<i64>,
    pub delta: Decimal,
}

/// Current balance per wallet and token
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct WalletInfoRow {
    pub wallet_address: String,
    pub base_token_type: String,
    pub token_type: String,
    pub maturity_time: Option<i64>,
    pub balance: Decimal,
    pub block_number: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct UserMapRow {
    pub address: String,
    pub username: String,
}
