//! Hyperdrive Event Decoding
//!
//! Decodes Hyperdrive logs (from receipts or `eth_getLogs`) and turns each
//! trade event into the per-token balance changes it caused. The same
//! token deltas update bot wallets in memory and become `wallet_deltas`
//! rows in chainsync.

use super::asset_id::{decode_asset_id, AssetIdPrefix};
use crate::contracts::IHyperdrive::{self, IHyperdriveEvents};
use alloy::primitives::{Address, B256, I256, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEventInterface;
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// A decoded Hyperdrive event with its chain position
#[derive(Debug, Clone)]
pub struct HyperdriveLog {
    pub block_number: u64,
    pub transaction_hash: B256,
    pub transaction_index: u64,
    pub log_index: u64,
    pub event: IHyperdriveEvents,
}

/// Token a wallet delta applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TokenKind {
    Base,
    Lp,
    WithdrawalShare,
    Long(u64),
    Short(u64),
}

impl TokenKind {
    /// Token family without the maturity suffix
    pub fn base_token_type(&self) -> &'static str {
        match self {
            TokenKind::Base => "BASE",
            TokenKind::Lp => "LP",
            TokenKind::WithdrawalShare => "WITHDRAWAL_SHARE",
            TokenKind::Long(_) => "LONG",
            TokenKind::Short(_) => "SHORT",
        }
    }

    pub fn maturity_time(&self) -> Option<u64> {
        match self {
            TokenKind::Long(m) | TokenKind::Short(m) => Some(*m),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenKind::Long(m) => write!(f, "LONG-{}", m),
            TokenKind::Short(m) => write!(f, "SHORT-{}", m),
            other => write!(f, "{}", other.base_token_type()),
        }
    }
}

/// Signed change to one token balance of one wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDelta {
    pub wallet: Address,
    pub token: TokenKind,
    pub delta: I256,
    /// Share price at the time of the trade (shorts track their open price)
    pub share_price: Option<U256>,
}

fn positive(v: U256) -> I256 {
    I256::from_raw(v)
}

fn negative(v: U256) -> I256 {
    -I256::from_raw(v)
}

fn delta(wallet: Address, token: TokenKind, amount: I256, share_price: Option<U256>) -> TokenDelta {
    TokenDelta { wallet, token, delta: amount, share_price }
}

/// Decode every Hyperdrive event in `logs`; unrelated logs are skipped.
///
/// Decoded logs must carry their chain position (mined logs always do).
pub fn decode_logs(logs: &[Log]) -> Result<Vec<HyperdriveLog>> {
    let mut decoded = Vec::new();
    for log in logs {
        let event = match IHyperdriveEvents::decode_log(&log.inner) {
            Ok(event) => event.data,
            Err(e) => {
                debug!("Skipping non-Hyperdrive log at {:?}: {}", log.transaction_hash, e);
                continue;
            }
        };
        let missing = |field: &str| anyhow!("{} log is missing its {}", event_name(&event), field);
        decoded.push(HyperdriveLog {
            block_number: log.block_number.ok_or_else(|| missing("block number"))?,
            transaction_hash: log.transaction_hash.ok_or_else(|| missing("transaction hash"))?,
            transaction_index: log.transaction_index.ok_or_else(|| missing("transaction index"))?,
            log_index: log.log_index.ok_or_else(|| missing("log index"))?,
            event,
        });
    }
    Ok(decoded)
}

/// Name of the event, as stored in `transactions.event_name`.
pub fn event_name(event: &IHyperdriveEvents) -> &'static str {
    match event {
        IHyperdriveEvents::Initialize(_) => "Initialize",
        IHyperdriveEvents::AddLiquidity(_) => "AddLiquidity",
        IHyperdriveEvents::RemoveLiquidity(_) => "RemoveLiquidity",
        IHyperdriveEvents::RedeemWithdrawalShares(_) => "RedeemWithdrawalShares",
        IHyperdriveEvents::OpenLong(_) => "OpenLong",
        IHyperdriveEvents::OpenShort(_) => "OpenShort",
        IHyperdriveEvents::CloseLong(_) => "CloseLong",
        IHyperdriveEvents::CloseShort(_) => "CloseShort",
        IHyperdriveEvents::CreateCheckpoint(_) => "CreateCheckpoint",
        IHyperdriveEvents::TransferSingle(_) => "TransferSingle",
    }
}

/// Wallet balance changes caused by a trade event.
///
/// Trades yield two deltas (position and base); RemoveLiquidity yields
/// three. Non-trade events yield none.
pub fn token_deltas(event: &IHyperdriveEvents) -> Vec<TokenDelta> {
    match event {
        IHyperdriveEvents::Initialize(e) => vec![
            delta(e.provider, TokenKind::Lp, positive(e.lpAmount), None),
            delta(e.provider, TokenKind::Base, negative(e.baseAmount), None),
        ],
        IHyperdriveEvents::AddLiquidity(e) => vec![
            delta(e.provider, TokenKind::Lp, positive(e.lpAmount), None),
            delta(e.provider, TokenKind::Base, negative(e.baseAmount), None),
        ],
        IHyperdriveEvents::RemoveLiquidity(e) => vec![
            delta(e.provider, TokenKind::Lp, negative(e.lpAmount), None),
            delta(
                e.provider,
                TokenKind::WithdrawalShare,
                positive(e.withdrawalShareAmount),
                None,
            ),
            delta(e.provider, TokenKind::Base, positive(e.baseAmount), None),
        ],
        IHyperdriveEvents::RedeemWithdrawalShares(e) => vec![
            delta(
                e.provider,
                TokenKind::WithdrawalShare,
                negative(e.withdrawalShareAmount),
                None,
            ),
            delta(e.provider, TokenKind::Base, positive(e.baseAmount), None),
        ],
        IHyperdriveEvents::OpenLong(e) => trade_deltas(
            e.trader,
            TokenKind::Long(e.maturityTime.saturating_to()),
            positive(e.bondAmount),
            negative(e.baseAmount),
            e.sharePrice,
        ),
        IHyperdriveEvents::OpenShort(e) => trade_deltas(
            e.trader,
            TokenKind::Short(e.maturityTime.saturating_to()),
            positive(e.bondAmount),
            negative(e.baseAmount),
            e.sharePrice,
        ),
        IHyperdriveEvents::CloseLong(e) => trade_deltas(
            e.trader,
            TokenKind::Long(e.maturityTime.saturating_to()),
            negative(e.bondAmount),
            positive(e.baseAmount),
            e.sharePrice,
        ),
        IHyperdriveEvents::CloseShort(e) => trade_deltas(
            e.trader,
            TokenKind::Short(e.maturityTime.saturating_to()),
            negative(e.bondAmount),
            positive(e.baseAmount),
            e.sharePrice,
        ),
        IHyperdriveEvents::CreateCheckpoint(_) | IHyperdriveEvents::TransferSingle(_) => vec![],
    }
}

fn trade_deltas(
    trader: Address,
    position: TokenKind,
    bonds: I256,
    base: I256,
    share_price: U256,
) -> Vec<TokenDelta> {
    vec![
        delta(trader, position, bonds, Some(share_price)),
        delta(trader, TokenKind::Base, base, None),
    ]
}

/// The account that initiated a trade event, if any.
pub fn event_trader(event: &IHyperdriveEvents) -> Option<Address> {
    match event {
        IHyperdriveEvents::Initialize(e) => Some(e.provider),
        IHyperdriveEvents::AddLiquidity(e) => Some(e.provider),
        IHyperdriveEvents::RemoveLiquidity(e) => Some(e.provider),
        IHyperdriveEvents::RedeemWithdrawalShares(e) => Some(e.provider),
        IHyperdriveEvents::OpenLong(e) => Some(e.trader),
        IHyperdriveEvents::OpenShort(e) => Some(e.trader),
        IHyperdriveEvents::CloseLong(e) => Some(e.trader),
        IHyperdriveEvents::CloseShort(e) => Some(e.trader),
        IHyperdriveEvents::CreateCheckpoint(_) | IHyperdriveEvents::TransferSingle(_) => None,
    }
}

/// Long and short balances held by `wallet`, rebuilt from the pool's
/// `TransferSingle` history. Fully closed positions are left out.
pub fn transfer_balances(wallet: Address, logs: &[HyperdriveLog]) -> Result<BTreeMap<TokenKind, U256>> {
    let mut balances: BTreeMap<TokenKind, I256> = BTreeMap::new();
    for log in logs {
        let IHyperdriveEvents::TransferSingle(transfer) = &log.event else {
            continue;
        };
        let sign = match (transfer.to == wallet, transfer.from == wallet) {
            (true, false) => I256::ONE,
            (false, true) => I256::MINUS_ONE,
            _ => continue,
        };
        let token = match decode_asset_id(transfer.id)? {
            (AssetIdPrefix::Long, maturity) => TokenKind::Long(maturity),
            (AssetIdPrefix::Short, maturity) => TokenKind::Short(maturity),
            _ => continue,
        };
        *balances.entry(token).or_insert(I256::ZERO) += sign * I256::from_raw(transfer.value);
    }

    let mut positions = BTreeMap::new();
    for (token, balance) in balances {
        if balance.is_negative() {
            bail!("Transfers of {} for {} net to {}", token, wallet, balance);
        }
        if !balance.is_zero() {
            positions.insert(token, balance.unsigned_abs());
        }
    }
    Ok(positions)
}

/// Build an OpenLong event for mocks.
#[cfg(test)]
pub(crate) fn open_long_event(
    trader: Address,
    maturity_time: u64,
    base_amount: U256,
    bond_amount: U256,
    share_price: U256,
) -> IHyperdriveEvents {
    IHyperdriveEvents::OpenLong(IHyperdrive::OpenLong {
        trader,
        assetId: super::asset_id::encode_asset_id(AssetIdPrefix::Long, maturity_time),
        maturityTime: U256::from(maturity_time),
        baseAmount: base_amount,
        sharePrice: share_price,
        bondAmount: bond_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::ONE_18;
    use crate::hyperdrive::asset_id::encode_asset_id;
    use alloy::primitives::IntoLogData;

    fn trader() -> Address {
        Address::repeat_byte(0x11)
    }

    #[test]
    fn test_open_long_deltas() {
        let event = open_long_event(trader(), 1_000, ONE_18 * U256::from(95), ONE_18 * U256::from(100), ONE_18);
        let deltas = token_deltas(&event);
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].token, TokenKind::Long(1_000));
        assert_eq!(deltas[0].delta, I256::from_raw(ONE_18 * U256::from(100)));
        assert_eq!(deltas[1].token, TokenKind::Base);
        assert!(deltas[1].delta.is_negative());
        assert_eq!(event_name(&event), "OpenLong");
        assert_eq!(event_trader(&event), Some(trader()));
    }

    #[test]
    fn test_remove_liquidity_has_three_deltas() {
        let event = IHyperdriveEvents::RemoveLiquidity(IHyperdrive::RemoveLiquidity {
            provider: trader(),
            lpAmount: ONE_18 * U256::from(10),
            baseAmount: ONE_18 * U256::from(8),
            sharePrice: ONE_18,
            withdrawalShareAmount: ONE_18 * U256::from(2),
            lpSharePrice: ONE_18,
        });
        let deltas = token_deltas(&event);
        let tokens: Vec<TokenKind> = deltas.iter().map(|d| d.token).collect();
        assert_eq!(tokens, vec![TokenKind::Lp, TokenKind::WithdrawalShare, TokenKind::Base]);
        assert!(deltas[0].delta.is_negative());
    }

    #[test]
    fn test_checkpoint_event_has_no_deltas() {
        let event = IHyperdriveEvents::CreateCheckpoint(IHyperdrive::CreateCheckpoint {
            checkpointTime: U256::from(86_400),
            sharePrice: ONE_18,
            maturedShorts: U256::ZERO,
            maturedLongs: U256::ZERO,
            lpSharePrice: ONE_18,
        });
        assert!(token_deltas(&event).is_empty());
        assert_eq!(event_trader(&event), None);
    }

    fn mined(event: IHyperdriveEvents, log_index: u64) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: Address::repeat_byte(0xdd),
                data: event.to_log_data(),
            },
            block_number: Some(12),
            transaction_hash: Some(B256::repeat_byte(0x33)),
            transaction_index: Some(1),
            log_index: Some(log_index),
            ..Default::default()
        }
    }

    fn transfer(from: Address, to: Address, prefix: AssetIdPrefix, maturity: u64, units: u64) -> HyperdriveLog {
        HyperdriveLog {
            block_number: 1,
            transaction_hash: B256::ZERO,
            transaction_index: 0,
            log_index: 0,
            event: IHyperdriveEvents::TransferSingle(IHyperdrive::TransferSingle {
                operator: from,
                from,
                to,
                id: encode_asset_id(prefix, maturity),
                value: ONE_18 * U256::from(units),
            }),
        }
    }

    #[test]
    fn test_decode_logs_keeps_chain_position() {
        let event = open_long_event(trader(), 1_000, ONE_18, ONE_18, ONE_18);
        let mut foreign = mined(event.clone(), 0);
        foreign.inner.data = alloy::primitives::LogData::new_unchecked(vec![B256::repeat_byte(1)], Default::default());

        let decoded = decode_logs(&[foreign, mined(event, 4)]).unwrap();
        assert_eq!(decoded.len(), 1, "foreign log skipped");
        assert_eq!(decoded[0].block_number, 12);
        assert_eq!(decoded[0].transaction_index, 1);
        assert_eq!(decoded[0].log_index, 4);
    }

    #[test]
    fn test_decode_logs_rejects_pending_logs() {
        let event = open_long_event(trader(), 1_000, ONE_18, ONE_18, ONE_18);
        let mut pending = mined(event.clone(), 0);
        pending.block_number = None;
        let err = decode_logs(&[pending]).unwrap_err();
        assert!(err.to_string().contains("block number"));

        let mut unindexed = mined(event, 0);
        unindexed.log_index = None;
        assert!(decode_logs(&[unindexed]).unwrap_err().to_string().contains("log index"));
    }

    #[test]
    fn test_transfer_balances_net_per_position() {
        let me = trader();
        let pool = Address::ZERO;
        let other = Address::repeat_byte(0x99);
        let logs = vec![
            transfer(pool, me, AssetIdPrefix::Long, 1_000, 100),
            transfer(me, other, AssetIdPrefix::Long, 1_000, 40),
            transfer(pool, me, AssetIdPrefix::Short, 2_000, 5),
            transfer(me, pool, AssetIdPrefix::Short, 2_000, 5),
            transfer(pool, me, AssetIdPrefix::Lp, 0, 7),
            transfer(pool, other, AssetIdPrefix::Long, 3_000, 9),
        ];
        let positions = transfer_balances(me, &logs).unwrap();
        assert_eq!(positions.len(), 1, "closed short, LP and other wallets left out");
        assert_eq!(positions[&TokenKind::Long(1_000)], ONE_18 * U256::from(60));

        let overdrawn = vec![transfer(me, other, AssetIdPrefix::Long, 1_000, 1)];
        assert!(transfer_balances(me, &overdrawn).is_err());
    }

    #[test]
    fn test_token_kind_labels() {
        assert_eq!(TokenKind::Long(42).to_string(), "LONG-42");
        assert_eq!(TokenKind::Short(7).base_token_type(), "SHORT");
        assert_eq!(TokenKind::WithdrawalShare.to_string(), "WITHDRAWAL_SHARE");
        assert_eq!(TokenKind::Base.maturity_time(), None);
    }
}
