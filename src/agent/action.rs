//! Trade Actions
//!
//! What a policy asks for (`Trade`), what execution returns (`TradeReceipt`)
//! and how it fails (`TradeError`).

use super::wallet::{WalletDeltas, WalletError};
use crate::chain::RevertedTransaction;
use alloy::primitives::{B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    OpenLong { base: U256 },
    CloseLong { maturity_time: u64, bonds: U256 },
    OpenShort { bonds: U256 },
    CloseShort { maturity_time: u64, bonds: U256 },
    AddLiquidity { base: U256 },
    RemoveLiquidity { lp_shares: U256 },
    RedeemWithdrawalShares { shares: U256 },
}

impl TradeAction {
    pub fn name(&self) -> &'static str {
        match self {
            TradeAction::OpenLong { .. } => "open_long",
            TradeAction::CloseLong { .. } => "close_long",
            TradeAction::OpenShort { .. } => "open_short",
            TradeAction::CloseShort { .. } => "close_short",
            TradeAction::AddLiquidity { .. } => "add_liquidity",
            TradeAction::RemoveLiquidity { .. } => "remove_liquidity",
            TradeAction::RedeemWithdrawalShares { .. } => "redeem_withdrawal_shares",
        }
    }

    /// Amount traded, in base or bonds/shares depending on the action
    pub fn amount(&self) -> U256 {
        match *self {
            TradeAction::OpenLong { base } | TradeAction::AddLiquidity { base } => base,
            TradeAction::CloseLong { bonds, .. }
            | TradeAction::OpenShort { bonds }
            | TradeAction::CloseShort { bonds, .. } => bonds,
            TradeAction::RemoveLiquidity { lp_shares } => lp_shares,
            TradeAction::RedeemWithdrawalShares { shares } => shares,
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TradeAction::CloseLong { maturity_time, .. }
            | TradeAction::CloseShort { maturity_time, .. } => {
                write!(f, "{}({} @ {})", self.name(), self.amount(), maturity_time)
            }
            _ => write!(f, "{}({})", self.name(), self.amount()),
        }
    }
}

/// An action plus its slippage guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub action: TradeAction,
    /// Fraction of the previewed output (18 decimals); `None` disables the guard
    pub slippage_tolerance: Option<U256>,
}

impl Trade {
    pub fn new(action: TradeAction) -> Self {
        Self {
            action,
            slippage_tolerance: None,
        }
    }

    pub fn with_slippage(mut self, tolerance: Option<U256>) -> Self {
        self.slippage_tolerance = tolerance;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub deltas: WalletDeltas,
}

#[derive(Debug, Error)]
pub enum TradeError {
    #[error("slippage: {0}")]
    Slippage(String),

    #[error("reverted: {reason}")]
    Reverted {
        tx_hash: Option<B256>,
        reason: String,
    },

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Other(anyhow::Error),
}

impl TradeError {
    pub fn is_slippage(&self) -> bool {
        matches!(self, TradeError::Slippage(_))
    }
}

impl From<anyhow::Error> for TradeError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<RevertedTransaction>() {
            Ok(reverted) => TradeError::Reverted {
                tx_hash: Some(reverted.tx_hash),
                reason: reverted.to_string(),
            },
            Err(other) => TradeError::Other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_action_amounts_and_names() {
        let close = TradeAction::CloseShort { maturity_time: 99, bonds: U256::from(5) };
        assert_eq!(close.amount(), U256::from(5));
        assert_eq!(close.to_string(), "close_short(5 @ 99)");
        assert_eq!(TradeAction::AddLiquidity { base: U256::from(1) }.name(), "add_liquidity");
    }

    #[test]
    fn test_reverted_transaction_maps_to_reverted() {
        let err = anyhow::Error::from(RevertedTransaction {
            tx_hash: B256::repeat_byte(1),
            block_number: Some(3),
        });
        match TradeError::from(err) {
            TradeError::Reverted { tx_hash, .. } => assert_eq!(tx_hash, Some(B256::repeat_byte(1))),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(TradeError::from(anyhow!("rpc down")), TradeError::Other(_)));
    }
}
