//! Row Conversion
//!
//! Turns decoded pool state and events into chainsync rows. Scaled
//! integers pass through `convert_scaled_value`; addresses are stored
//! checksummed.

use super::model::{
    CheckpointInfoRow, PoolConfigRow, PoolInfoRow, TransactionRow, WalletDeltaRow, WalletInfoRow,
};
use crate::contracts::IHyperdrive::IHyperdriveEvents;
use crate::hyperdrive::events::{event_name, event_trader, token_deltas};
use crate::hyperdrive::scaled::{convert_scaled_signed_value, signed_scaled_to_decimal};
use crate::hyperdrive::{convert_scaled_value, HyperdriveLog, PoolConfig, PoolState, TokenDelta};
use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub fn pool_config_row(contract_address: Address, config: &PoolConfig) -> Result<PoolConfigRow> {
    Ok(PoolConfigRow {
        contract_address: contract_address.to_string(),
        base_token: config.base_token.to_string(),
        initial_share_price: convert_scaled_value(Some(config.initial_share_price))?,
        minimum_share_reserves: convert_scaled_value(Some(config.minimum_share_reserves))?,
        minimum_transaction_amount: convert_scaled_value(Some(config.minimum_transaction_amount))?,
        position_duration: i64::try_from(config.position_duration)?,
        checkpoint_duration: i64::try_from(config.checkpoint_duration)?,
        time_stretch: convert_scaled_value(Some(config.time_stretch))?,
        governance: config.governance.to_string(),
        fee_collector: config.fee_collector.to_string(),
        curve_fee: convert_scaled_value(Some(config.fees.curve))?,
        flat_fee: convert_scaled_value(Some(config.fees.flat))?,
        governance_fee: convert_scaled_value(Some(config.fees.governance))?,
        // Unscaled integers in the contract; stored as-is.
        oracle_size: Some(config.oracle_size.to_string().parse()?),
        update_gap: Some(config.update_gap.to_string().parse()?),
    })
}

fn block_timestamp(timestamp: u64) -> Result<DateTime<Utc>> {
    let secs = i64::try_from(timestamp)?;
    DateTime::from_timestamp(secs, 0).with_context(|| format!("Invalid block timestamp {}", timestamp))
}

/// Pool info for one block. Spot price and fixed rate are left empty when
/// the pool has no reserves to price against.
pub fn pool_info_row(state: &PoolState) -> Result<PoolInfoRow> {
    let info = &state.pool_info;
    Ok(PoolInfoRow {
        block_number: i64::try_from(state.block_number())?,
        timestamp: block_timestamp(state.block_time())?,
        share_reserves: convert_scaled_value(Some(info.share_reserves))?,
        share_adjustment: convert_scaled_signed_value(Some(info.share_adjustment))?,
        bond_reserves: convert_scaled_value(Some(info.bond_reserves))?,
        lp_total_supply: convert_scaled_value(Some(info.lp_total_supply))?,
        share_price: convert_scaled_value(Some(info.share_price))?,
        longs_outstanding: convert_scaled_value(Some(info.longs_outstanding))?,
        long_average_maturity_time: convert_scaled_value(Some(info.long_average_maturity_time))?,
        shorts_outstanding: convert_scaled_value(Some(info.shorts_outstanding))?,
        short_average_maturity_time: convert_scaled_value(Some(info.short_average_maturity_time))?,
        withdrawal_shares_ready_to_withdraw: convert_scaled_value(Some(
            info.withdrawal_shares_ready_to_withdraw,
        ))?,
        withdrawal_shares_proceeds: convert_scaled_value(Some(info.withdrawal_shares_proceeds))?,
        lp_share_price: convert_scaled_value(Some(info.lp_share_price))?,
        long_exposure: convert_scaled_value(Some(info.long_exposure))?,
        spot_price: convert_scaled_value(state.spot_price().ok())?,
        fixed_rate: convert_scaled_value(state.fixed_rate().ok())?,
        variable_rate: convert_scaled_value(state.variable_rate)?,
    })
}

pub fn checkpoint_info_row(state: &PoolState) -> Result<CheckpointInfoRow> {
    Ok(CheckpointInfoRow {
        block_number: i64::try_from(state.block_number())?,
        checkpoint_time: i64::try_from(state.checkpoint_time())?,
        share_price: convert_scaled_value(Some(state.checkpoint.share_price))?,
        long_exposure: convert_scaled_signed_value(Some(state.checkpoint.long_exposure))?,
    })
}

// ── transactions ─────────────────────────────────────────────────────

/// Amount columns shared by every trade event
#[derive(Default)]
struct EventFields {
    asset_id: Option<U256>,
    maturity_time: Option<U256>,
    base_amount: Option<U256>,
    bond_amount: Option<U256>,
    lp_amount: Option<U256>,
    withdrawal_share_amount: Option<U256>,
    share_price: Option<U256>,
}

fn event_fields(event: &IHyperdriveEvents) -> EventFields {
    match event {
        IHyperdriveEvents::Initialize(e) => EventFields {
            base_amount: Some(e.baseAmount),
            lp_amount: Some(e.lpAmount),
            share_price: Some(e.sharePrice),
            ..Default::default()
        },
        IHyperdriveEvents::AddLiquidity(e) => EventFields {
            base_amount: Some(e.baseAmount),
            lp_amount: Some(e.lpAmount),
            share_price: Some(e.sharePrice),
            ..Default::default()
        },
        IHyperdriveEvents::RemoveLiquidity(e) => EventFields {
            base_amount: Some(e.baseAmount),
            lp_amount: Some(e.lpAmount),
            withdrawal_share_amount: Some(e.withdrawalShareAmount),
            share_price: Some(e.sharePrice),
            ..Default::default()
        },
        IHyperdriveEvents::RedeemWithdrawalShares(e) => EventFields {
            base_amount: Some(e.baseAmount),
            withdrawal_share_amount: Some(e.withdrawalShareAmount),
            share_price: Some(e.sharePrice),
            ..Default::default()
        },
        IHyperdriveEvents::OpenLong(e) => trade_fields(e.assetId, e.maturityTime, e.baseAmount, e.bondAmount, e.sharePrice),
        IHyperdriveEvents::OpenShort(e) => trade_fields(e.assetId, e.maturityTime, e.baseAmount, e.bondAmount, e.sharePrice),
        IHyperdriveEvents::CloseLong(e) => trade_fields(e.assetId, e.maturityTime, e.baseAmount, e.bondAmount, e.sharePrice),
        IHyperdriveEvents::CloseShort(e) => trade_fields(e.assetId, e.maturityTime, e.baseAmount, e.bondAmount, e.sharePrice),
        IHyperdriveEvents::CreateCheckpoint(e) => EventFields {
            maturity_time: Some(e.checkpointTime),
            share_price: Some(e.sharePrice),
            ..Default::default()
        },
        IHyperdriveEvents::TransferSingle(e) => EventFields {
            asset_id: Some(e.id),
            bond_amount: Some(e.value),
            ..Default::default()
        },
    }
}

fn trade_fields(asset_id: U256, maturity_time: U256, base: U256, bonds: U256, share_price: U256) -> EventFields {
    EventFields {
        asset_id: Some(asset_id),
        maturity_time: Some(maturity_time),
        base_amount: Some(base),
        bond_amount: Some(bonds),
        share_price: Some(share_price),
        ..Default::default()
    }
}

pub fn transaction_row(log: &HyperdriveLog) -> Result<TransactionRow> {
    let fields = event_fields(&log.event);
    Ok(TransactionRow {
        block_number: i64::try_from(log.block_number)?,
        transaction_index: i64::try_from(log.transaction_index)?,
        log_index: i64::try_from(log.log_index)?,
        transaction_hash: log.transaction_hash.to_string(),
        event_name: event_name(&log.event).to_string(),
        trader: event_trader(&log.event).map(|a| a.to_string()),
        asset_id: fields.asset_id.map(|id| id.to_string()),
        maturity_time: fields.maturity_time.map(|m| m.saturating_to::<i64>()),
        base_amount: convert_scaled_value(fields.base_amount)?,
        bond_amount: convert_scaled_value(fields.bond_amount)?,
        lp_amount: convert_scaled_value(fields.lp_amount)?,
        withdrawal_share_amount: convert_scaled_value(fields.withdrawal_share_amount)?,
        share_price: convert_scaled_value(fields.share_price)?,
    })
}

// ── wallet deltas ────────────────────────────────────────────────────

fn wallet_delta_row(log: &HyperdriveLog, delta: &TokenDelta) -> Result<WalletDeltaRow> {
    Ok(WalletDeltaRow {
        block_number: i64::try_from(log.block_number)?,
        transaction_hash: log.transaction_hash.to_string(),
        wallet_address: delta.wallet.to_string(),
        base_token_type: delta.token.base_token_type().to_string(),
        token_type: delta.token.to_string(),
        maturity_time: delta.token.maturity_time().map(i64::try_from).transpose()?,
        delta: signed_scaled_to_decimal(delta.delta)?,
    })
}

/// Delta rows for every trade event in `logs`, in log order.
pub fn wallet_delta_rows(logs: &[HyperdriveLog]) -> Result<Vec<WalletDeltaRow>> {
    let mut rows = Vec::new();
    for log in logs {
        for delta in token_deltas(&log.event) {
            rows.push(wallet_delta_row(log, &delta)?);
        }
    }
    Ok(rows)
}

/// Net change per wallet and token over one block, shaped as `wallet_info`
/// rows whose `balance` is the amount to add.
pub fn wallet_info_changes(deltas: &[WalletDeltaRow]) -> Vec<WalletInfoRow> {
    let mut net: BTreeMap<(String, String), WalletInfoRow> = BTreeMap::new();
    for delta in deltas {
        let key = (delta.wallet_address.clone(), delta.token_type.clone());
        net.entry(key)
            .and_modify(|row| {
                row.balance += delta.delta;
                row.block_number = row.block_number.max(delta.block_number);
            })
            .or_insert_with(|| WalletInfoRow {
                wallet_address: delta.wallet_address.clone(),
                base_token_type: delta.base_token_type.clone(),
                token_type: delta.token_type.clone(),
                maturity_time: delta.maturity_time,
                balance: delta.delta,
                block_number: delta.block_number,
            });
    }
    net.into_values().collect()
}
