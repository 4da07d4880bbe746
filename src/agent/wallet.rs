//! Agent Wallet
//!
//! In-memory view of an agent's Hyperdrive holdings: base, LP tokens,
//! withdrawal shares, and long/short positions keyed by maturity. The wallet
//! is updated from the token deltas decoded out of each trade receipt.

use crate::fixed_point::FixedPointError;
use crate::hyperdrive::calculator::update_weighted_average;
use crate::hyperdrive::events::{TokenDelta, TokenKind};
use alloy::primitives::{Address, I256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("{token} balance {balance} cannot absorb delta {delta}")]
    NegativeBalance {
        token: String,
        balance: U256,
        delta: I256,
    },

    #[error("wallet math failed: {0}")]
    Math(#[from] FixedPointError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Long {
    pub balance: U256,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Short {
    pub balance: U256,
    /// Weighted average share price at which the position was opened
    pub open_share_price: U256,
}

/// Signed change to a short, with the share price of the trade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortDelta {
    pub balance: I256,
    pub open_share_price: U256,
}

/// Balance changes produced by one trade
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletDeltas {
    pub base: I256,
    pub lp_tokens: I256,
    pub withdraw_shares: I256,
    pub longs: BTreeMap<u64, I256>,
    pub shorts: BTreeMap<u64, ShortDelta>,
}

impl WalletDeltas {
    /// Collect the deltas belonging to `wallet`; other wallets' deltas are ignored.
    pub fn from_token_deltas(wallet: Address, deltas: &[TokenDelta]) -> Self {
        let mut out = Self::default();
        for d in deltas.iter().filter(|d| d.wallet == wallet) {
            match d.token {
                TokenKind::Base => out.base += d.delta,
                TokenKind::Lp => out.lp_tokens += d.delta,
                TokenKind::WithdrawalShare => out.withdraw_shares += d.delta,
                TokenKind::Long(maturity) => {
                    *out.longs.entry(maturity).or_insert(I256::ZERO) += d.delta;
                }
                TokenKind::Short(maturity) => {
                    let short = out.shorts.entry(maturity).or_default();
                    short.balance += d.delta;
                    if let Some(price) = d.share_price {
                        short.open_share_price = price;
                    }
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Holdings of one agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HyperdriveWallet {
    pub address: Address,
    pub base: U256,
    pub lp_tokens: U256,
    pub withdraw_shares: U256,
    pub longs: BTreeMap<u64, Long>,
    pub shorts: BTreeMap<u64, Short>,
}

impl HyperdriveWallet {
    pub fn new(address: Address, base: U256) -> Self {
        Self {
            address,
            base,
            ..Default::default()
        }
    }

    /// Apply a trade's deltas. On error the wallet is left unchanged.
    pub fn apply_deltas(&mut self, deltas: &WalletDeltas) -> Result<(), WalletError> {
        let mut next = self.clone();

        next.base = add_signed(next.base, deltas.base, "BASE")?;
        next.lp_tokens = add_signed(next.lp_tokens, deltas.lp_tokens, "LP")?;
        next.withdraw_shares =
            add_signed(next.withdraw_shares, deltas.withdraw_shares, "WITHDRAWAL_SHARE")?;

        for (&maturity, &delta) in &deltas.longs {
            let current = next.longs.get(&maturity).copied().unwrap_or_default();
            let balance = add_signed(current.balance, delta, TokenKind::Long(maturity))?;
            if balance.is_zero() {
                next.longs.remove(&maturity);
            } else {
                next.longs.insert(maturity, Long { balance });
            }
        }

        for (&maturity, delta) in &deltas.shorts {
            let current = next.shorts.get(&maturity).copied().unwrap_or_default();
            let balance = add_signed(current.balance, delta.balance, TokenKind::Short(maturity))?;
            if balance.is_zero() {
                next.shorts.remove(&maturity);
                continue;
            }
            let open_share_price = if delta.balance.is_positive() {
                update_weighted_average(
                    current.open_share_price,
                    current.balance,
                    delta.open_share_price,
                    delta.balance.unsigned_abs(),
                    true,
                )?
            } else {
                current.open_share_price
            };
            next.shorts.insert(maturity, Short { balance, open_share_price });
        }

        *self = next;
        Ok(())
    }

    pub fn has_positions(&self) -> bool {
        !self.longs.is_empty()
            || !self.shorts.is_empty()
            || !self.lp_tokens.is_zero()
            || !self.withdraw_shares.is_zero()
    }
}

fn add_signed(balance: U256, delta: I256, token: impl fmt::Display) -> Result<U256, WalletError> {
    let magnitude = delta.unsigned_abs();
    let result = if delta.is_negative() {
        balance.checked_sub(magnitude)
    } else {
        balance.checked_add(magnitude)
    };
    result.ok_or_else(|| WalletError::NegativeBalance {
        token: token.to_string(),
        balance,
        delta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::ONE_18;

    fn units(n: u64) -> U256 {
        U256::from(n) * ONE_18
    }

    fn signed(n: i64) -> I256 {
        let magnitude = I256::from_raw(units(n.unsigned_abs()));
        if n < 0 { -magnitude } else { magnitude }
    }

    fn wallet() -> HyperdriveWallet {
        HyperdriveWallet::new(Address::repeat_byte(0xaa), units(1_000))
    }

    #[test]
    fn test_open_and_close_long() {
        let mut w = wallet();
        let open = WalletDeltas {
            base: signed(-95),
            longs: BTreeMap::from([(1_000, signed(100))]),
            ..Default::default()
        };
        w.apply_deltas(&open).unwrap();
        assert_eq!(w.base, units(905));
        assert_eq!(w.longs[&1_000].balance, units(100));

        let close = WalletDeltas {
            base: signed(99),
            longs: BTreeMap::from([(1_000, signed(-100))]),
            ..Default::default()
        };
        w.apply_deltas(&close).unwrap();
        assert_eq!(w.base, units(1_004));
        assert!(w.longs.is_empty(), "zero balance position must be removed");
    }

    #[test]
    fn test_negative_balance_leaves_wallet_unchanged() {
        let mut w = wallet();
        let before = w.clone();
        let overdraw = WalletDeltas {
            base: signed(-10),
            longs: BTreeMap::from([(1_000, signed(-1))]),
            ..Default::default()
        };
        let err = w.apply_deltas(&overdraw).unwrap_err();
        assert!(matches!(err, WalletError::NegativeBalance { .. }));
        assert_eq!(w, before);
    }

    #[test]
    fn test_short_open_share_price_is_weighted() {
        let mut w = wallet();
        let first = WalletDeltas {
            base: signed(-5),
            shorts: BTreeMap::from([(2_000, ShortDelta { balance: signed(100), open_share_price: ONE_18 })]),
            ..Default::default()
        };
        w.apply_deltas(&first).unwrap();
        assert_eq!(w.shorts[&2_000].open_share_price, ONE_18);

        let second = WalletDeltas {
            base: signed(-5),
            shorts: BTreeMap::from([(2_000, ShortDelta { balance: signed(100), open_share_price: ONE_18 * U256::from(2) })]),
            ..Default::default()
        };
        w.apply_deltas(&second).unwrap();
        assert_eq!(w.shorts[&2_000].balance, units(200));
        assert_eq!(w.shorts[&2_000].open_share_price, ONE_18 * U256::from(3) / U256::from(2));

        let partial_close = WalletDeltas {
            base: signed(50),
            shorts: BTreeMap::from([(2_000, ShortDelta { balance: signed(-50), open_share_price: ONE_18 })]),
            ..Default::default()
        };
        w.apply_deltas(&partial_close).unwrap();
        assert_eq!(w.shorts[&2_000].open_share_price, ONE_18 * U256::from(3) / U256::from(2));
    }

    #[test]
    fn test_deltas_from_tokens_filters_wallet() {
        let me = Address::repeat_byte(0xaa);
        let other = Address::repeat_byte(0xbb);
        let tokens = vec![
            TokenDelta { wallet: me, token: TokenKind::Short(7), delta: signed(10), share_price: Some(ONE_18) },
            TokenDelta { wallet: me, token: TokenKind::Base, delta: signed(-1), share_price: None },
            TokenDelta { wallet: other, token: TokenKind::Base, delta: signed(-99), share_price: None },
        ];
        let deltas = WalletDeltas::from_token_deltas(me, &tokens);
        assert_eq!(deltas.base, signed(-1));
        assert_eq!(deltas.shorts[&7].balance, signed(10));
        assert_eq!(deltas.shorts[&7].open_share_price, ONE_18);
        assert!(WalletDeltas::from_token_deltas(Address::ZERO, &tokens).is_empty());
    }
}
