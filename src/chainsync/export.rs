//! CSV Export
//!
//! Dumps every chainsync table unmodified to `<dir>/<table>.csv`, one
//! header row followed by the rows in key order. Missing values are empty
//! fields.

use super::db::Database;
use super::model::{
    ChainsyncTable, CheckpointInfoRow, PoolConfigRow, PoolInfoRow, TransactionRow, UserMapRow,
    WalletDeltaRow, WalletInfoRow,
};
use anyhow::{Context, Result};
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// A row that can be written as one CSV record
pub trait CsvRow {
    const HEADERS: &'static [&'static str];

    fn fields(&self) -> Vec<String>;
}

fn opt<T: Display>(value: &Option<T>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

/// Escape a CSV field that may contain special characters
fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Write `rows` to `path`, replacing any existing file.
pub fn write_csv<R: CsvRow>(path: &Path, rows: &[R]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", R::HEADERS.join(","))?;
    for row in rows {
        let fields: Vec<String> = row.fields().iter().map(|f| escape_csv_field(f)).collect();
        writeln!(writer, "{}", fields.join(","))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn table_path(dir: &Path, table: ChainsyncTable) -> PathBuf {
    dir.join(format!("{}.csv", table.name()))
}

/// Export all tables into `dir`, creating it if needed.
pub async fn export_tables(db: &Database, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    for table in ChainsyncTable::ALL {
        let path = table_path(dir, table);
        let count = match table {
            ChainsyncTable::PoolConfig => write_rows(&path, db.pool_config.get_all().await?)?,
            ChainsyncTable::PoolInfo => write_rows(&path, db.pool_info.get_all().await?)?,
            ChainsyncTable::CheckpointInfo => write_rows(&path, db.checkpoint_info.get_all().await?)?,
            ChainsyncTable::Transactions => write_rows(&path, db.transactions.get_all().await?)?,
            ChainsyncTable::WalletDeltas => write_rows(&path, db.wallet_deltas.get_all().await?)?,
            ChainsyncTable::WalletInfo => write_rows(&path, db.wallet_info.get_all().await?)?,
            ChainsyncTable::UserMap => write_rows(&path, db.user_map.get_all().await?)?,
        };
        info!("Exported {} rows to {}", count, path.display());
    }
    Ok(())
}

fn write_rows<R: CsvRow>(path: &Path, rows: Vec<R>) -> Result<usize> {
    write_csv(path, &rows)?;
    Ok(rows.len())
}

// ── Row layouts ──────────────────────────────────────────────────────

impl CsvRow for PoolConfigRow {
    const HEADERS: &'static [&'static str] = &[
        "contract_address",
        "base_token",
        "initial_share_price",
        "minimum_share_reserves",
        "minimum_transaction_amount",
        "position_duration",
        "checkpoint_duration",
        "time_stretch",
        "governance",
        "fee_collector",
        "curve_fee",
        "flat_fee",
        "governance_fee",
        "oracle_size",
        "update_gap",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.contract_address.clone(),
            self.base_token.clone(),
            opt(&self.initial_share_price),
            opt(&self.minimum_share_reserves),
            opt(&self.minimum_transaction_amount),
            self.position_duration.to_string(),
            self.checkpoint_duration.to_string(),
            opt(&self.time_stretch),
            self.governance.clone(),
            self.fee_collector.clone(),
            opt(&self.curve_fee),
            opt(&self.flat_fee),
            opt(&self.governance_fee),
            opt(&self.oracle_size),
            opt(&self.update_gap),
        ]
    }
}

impl CsvRow for PoolInfoRow {
    const HEADERS: &'static [&'static str] = &[
        "block_number",
        "timestamp",
        "share_reserves",
        "share_adjustment",
        "bond_reserves",
        "lp_total_supply",
        "share_price",
        "longs_outstanding",
        "long_average_maturity_time",
        "shorts_outstanding",
        "short_average_maturity_time",
        "withdrawal_shares_ready_to_withdraw",
        "withdrawal_shares_proceeds",
        "lp_share_price",
        "long_exposure",
        "spot_price",
        "fixed_rate",
        "variable_rate",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.block_number.to_string(),
            self.timestamp.to_rfc3339(),
            opt(&self.share_reserves),
            opt(&self.share_adjustment),
            opt(&self.bond_reserves),
            opt(&self.lp_total_supply),
            opt(&self.share_price),
            opt(&self.longs_outstanding),
            opt(&self.long_average_maturity_time),
            opt(&self.shorts_outstanding),
            opt(&self.short_average_maturity_time),
            opt(&self.withdrawal_shares_ready_to_withdraw),
            opt(&self.withdrawal_shares_proceeds),
            opt(&self.lp_share_price),
            opt(&self.long_exposure),
            opt(&self.spot_price),
            opt(&self.fixed_rate),
            opt(&self.variable_rate),
        ]
    }
}

impl CsvRow for CheckpointInfoRow {
    const HEADERS: &'static [&'static str] =
        &["block_number", "checkpoint_time", "share_price", "long_exposure"];

    fn fields(&self) -> Vec<String> {
        vec![
            self.block_number.to_string(),
            self.checkpoint_time.to_string(),
            opt(&self.share_price),
            opt(&self.long_exposure),
        ]
    }
}

impl CsvRow for TransactionRow {
    const HEADERS: &'static [&'static str] = &[
        "block_number",
        "transaction_index",
        "log_index",
        "transaction_hash",
        "event_name",
        "trader",
        "asset_id",
        "maturity_time",
        "base_amount",
        "bond_amount",
        "lp_amount",
        "withdrawal_share_amount",
        "share_price",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.block_number.to_string(),
            self.transaction_index.to_string(),
            self.log_index.to_string(),
            self.transaction_hash.clone(),
            self.event_name.clone(),
            opt(&self.trader),
            opt(&self.asset_id),
            opt(&self.maturity_time),
            opt(&self.base_amount),
            opt(&self.bond_amount),
            opt(&self.lp_amount),
            opt(&self.withdrawal_share_amount),
            opt(&self.share_price),
        ]
    }
}

impl CsvRow for WalletDeltaRow {
    const HEADERS: &'static [&'static str] = &[
        "block_number",
        "transaction_hash",
        "wallet_address",
        "base_token_type",
        "token_type",
        "maturity_time",
        "delta",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.block_number.to_string(),
            self.transaction_hash.clone(),
            self.wallet_address.clone(),
            self.base_token_type.clone(),
            self.token_type.clone(),
            opt(&self.maturity_time),
            self.delta.to_string(),
        ]
    }
}

impl CsvRow for WalletInfoRow {
    const HEADERS: &'static [&'static str] = &[
        "wallet_address",
        "base_token_type",
        "token_type",
        "maturity_time",
        "balance",
        "block_number",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.wallet_address.clone(),
            self.base_token_type.clone(),
            self.token_type.clone(),
            opt(&self.maturity_time),
            self.balance.to_string(),
            self.block_number.to_string(),
        ]
    }
}

impl CsvRow for UserMapRow {
    const HEADERS: &'static [&'static str] = &["address", "username"];

    fn fields(&self) -> Vec<String> {
        vec![self.address.clone(), self.username.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::env;

    #[test]
    fn test_csv_escape() {
        assert_eq!(escape_csv_field("simple"), "simple");
        assert_eq!(escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_headers_match_fields() {
        let row = WalletInfoRow {
            wallet_address: "0xabc".to_string(),
            base_token_type: "LONG".to_string(),
            token_type: "LONG-100".to_string(),
            maturity_time: Some(100),
            balance: dec!(1.5),
            block_number: 9,
        };
        assert_eq!(row.fields().len(), WalletInfoRow::HEADERS.len());
    }

    #[test]
    fn test_write_csv() {
        let temp_dir = env::temp_dir().join("hyperdrive_export_test");
        let _ = fs::remove_dir_all(&temp_dir);
        fs::create_dir_all(&temp_dir).unwrap();

        let path = table_path(&temp_dir, ChainsyncTable::UserMap);
        let rows = vec![
            UserMapRow { address: "0x1".to_string(), username: "alice".to_string() },
            UserMapRow { address: "0x2".to_string(), username: "bob, jr".to_string() },
        ];
        write_csv(&path, &rows).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "address,username\n0x1,alice\n0x2,\"bob, jr\"\n");
        assert!(path.ends_with("user_map.csv"));

        let _ = fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_empty_table_writes_header_only() {
        let temp_dir = env::temp_dir().join("hyperdrive_export_empty_test");
        let _ = fs::remove_dir_all(&temp_dir);
        fs::create_dir_all(&temp_dir).unwrap();

        let path = table_path(&temp_dir, ChainsyncTable::CheckpointInfo);
        write_csv::<CheckpointInfoRow>(&path, &[]).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "block_number,checkpoint_time,share_price,long_exposure\n"
        );

        let _ = fs::remove_dir_all(&temp_dir);
    }
}
