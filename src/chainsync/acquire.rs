//! Acquire Data
//!
//! Follows the chain one mined block at a time and mirrors the Hyperdrive
//! pool into Postgres. Each block is written in a single database
//! transaction: pool info, checkpoint info, decoded events, wallet deltas
//! and the resulting wallet_info balances.
//!
//! The chain head is treated as pending; the latest mined block is
//! `head - 1`. Blocks that fall more than `lookback` behind it are skipped.

use super::convert::{
    checkpoint_info_row, pool_config_row, pool_info_row, transaction_row, wallet_delta_rows,
    wallet_info_changes,
};
use super::db::Database;
use super::model::ChainsyncTable;
use crate::hyperdrive::events::decode_logs;
use crate::hyperdrive::HyperdriveClient;
use anyhow::{Context, Result};
use std::ops::RangeInclusive;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

pub const DEFAULT_LOOKBACK: u64 = 3000;

#[derive(Debug, Clone)]
pub struct AcquireConfig {
    pub start_block: u64,
    pub lookback: u64,
    /// Stop after this block; follow the chain forever when `None`
    pub end_block: Option<u64>,
    pub poll_interval: Duration,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            start_block: 0,
            lookback: DEFAULT_LOOKBACK,
            end_block: None,
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Blocks to skip and to process on one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPlan {
    pub skipped: Option<RangeInclusive<u64>>,
    pub process: RangeInclusive<u64>,
}

/// First block to acquire given what the database already holds.
pub fn first_block(start_block: u64, latest_in_db: u64) -> u64 {
    start_block.max(latest_in_db + 1)
}

/// Plan the next pass. `None` means nothing new has been mined.
pub fn plan_blocks(next_block: u64, latest_mined: u64, lookback: u64) -> Option<BlockPlan> {
    if next_block > latest_mined {
        return None;
    }
    let oldest = latest_mined.saturating_sub(lookback);
    if next_block < oldest {
        Some(BlockPlan {
            skipped: Some(next_block..=oldest - 1),
            process: oldest..=latest_mined,
        })
    } else {
        Some(BlockPlan {
            skipped: None,
            process: next_block..=latest_mined,
        })
    }
}

/// Run the ETL loop until `end_block` (if any) has been written.
pub async fn acquire_data(client: &HyperdriveClient, db: &Database, config: &AcquireConfig) -> Result<()> {
    let contract = client.addresses().hyperdrive;
    let pool_config = client.pool_config().await?;
    db.pool_config
        .insert(&pool_config_row(contract, &pool_config)?)
        .await
        .context("Failed to write pool config")?;
    info!("Pool config recorded for {}", contract);

    let latest_in_db = db.get_latest_block_number(ChainsyncTable::PoolInfo).await?;
    let mut next_block = first_block(config.start_block, latest_in_db);
    info!(
        "Acquiring from block {} (latest in db: {}, lookback: {})",
        next_block, latest_in_db, config.lookback
    );

    loop {
        if config.end_block.is_some_and(|end| next_block > end) {
            info!("Reached end block, stopping at {}", next_block - 1);
            return Ok(());
        }

        let head = client.chain().block_number().await?;
        let mut latest_mined = head.saturating_sub(1);
        if let Some(end) = config.end_block {
            latest_mined = latest_mined.min(end);
        }

        let Some(plan) = plan_blocks(next_block, latest_mined, config.lookback) else {
            debug!("No new block (next {}, head {})", next_block, head);
            sleep(config.poll_interval).await;
            continue;
        };

        if let Some(skipped) = &plan.skipped {
            warn!(
                "Skipping blocks {}..={}: older than lookback of {} from {}",
                skipped.start(),
                skipped.end(),
                config.lookback,
                latest_mined
            );
        }

        for block_number in plan.process {
            acquire_block(client, db, block_number).await?;
            next_block = block_number + 1;
        }
    }
}

/// Write everything for one block in a single transaction.
pub async fn acquire_block(client: &HyperdriveClient, db: &Database, block_number: u64) -> Result<()> {
    let block = client.chain().block_info(block_number).await?;
    let state = client.pool_state(block).await?;
    let logs = decode_logs(&client.logs(block_number, block_number).await?)?;

    let transactions = logs.iter().map(transaction_row).collect::<Result<Vec<_>>>()?;
    let deltas = wallet_delta_rows(&logs)?;
    let balances = wallet_info_changes(&deltas);

    let mut transaction = db.pool.begin().await?;
    db.pool_info.insert(&pool_info_row(&state)?, &mut transaction).await?;
    db.checkpoint_info
        .insert(&checkpoint_info_row(&state)?, &mut transaction)
        .await?;
    db.transactions.insert_many(&transactions, &mut transaction).await?;
    db.wallet_deltas.insert_many(&deltas, &mut transaction).await?;
    for balance in &balances {
        db.wallet_info.apply_delta(balance, &mut transaction).await?;
    }
    transaction
        .commit()
        .await
        .with_context(|| format!("Failed to commit block {}", block_number))?;

    info!(
        block = block_number,
        events = transactions.len(),
        deltas = deltas.len(),
        "Block acquired"
    );
    Ok(())
}
