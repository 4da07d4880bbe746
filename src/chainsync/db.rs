//! Chainsync Database
//!
//! `Database` bundles one `Table<Row>` handle per chainsync table over a
//! shared Postgres pool. Writes for a block go through one transaction so a
//! block is either fully recorded or not at all.

use super::model::{
    ChainsyncTable, CheckpointInfoRow, PoolConfigRow, PoolInfoRow, TransactionRow, UserMapRow,
    WalletDeltaRow, WalletInfoRow,
};
use super::table::Table;
use crate::error::Error;
use sqlx::postgres::{PgPoolOptions, PgQueryResult};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::info;

pub type DbTransaction<'a> = Transaction<'a, Postgres>;

#[derive(Debug, Clone)]
pub struct Database {
    pub pool_config: Table<PoolConfigRow>,
    pub pool_info: Table<PoolInfoRow>,
    pub checkpoint_info: Table<CheckpointInfoRow>,
    pub transactions: Table<TransactionRow>,
    pub wallet_deltas: Table<WalletDeltaRow>,
    pub wallet_info: Table<WalletInfoRow>,
    pub user_map: Table<UserMapRow>,
    pub pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool_config: Table::new(pool.clone()),
            pool_info: Table::new(pool.clone()),
            checkpoint_info: Table::new(pool.clone()),
            transactions: Table::new(pool.clone()),
            wallet_deltas: Table::new(pool.clone()),
            wallet_info: Table::new(pool.clone()),
            user_map: Table::new(pool.clone()),
            pool,
        }
    }

    /// Connect and apply the embedded migrations.
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Connected to Postgres, migrations applied");
        Ok(Self::new(pool))
    }

    /// Highest block recorded in `table`, or 0 when it is empty.
    pub async fn get_latest_block_number(&self, table: ChainsyncTable) -> Result<u64, Error> {
        if !table.has_block_number() {
            return Err(Error::UnknownTable(format!("{} has no block_number", table)));
        }
        let query = format!("SELECT COALESCE(MAX(block_number), 0) FROM {}", table.name());
        let (latest,): (i64,) = sqlx::query_as(&query).fetch_one(&self.pool).await?;
        Ok(u64::try_from(latest).unwrap_or_default())
    }

    /// Map each address to `username`.
    ///
    /// Fails if any address already belongs to a different username;
    /// re-registering the same pair changes nothing.
    pub async fn add_user_map(&self, username: &str, addresses: &[String]) -> Result<(), Error> {
        let mut transaction = self.pool.begin().await?;
        for address in addresses {
            let existing = self.user_map.get_username(address, &mut transaction).await?;
            if needs_registration(existing.as_deref(), username, address)? {
                self.user_map.insert(address, username, &mut transaction).await?;
            }
        }
        transaction.commit().await?;
        info!("Registered {} address(es) for {}", addresses.len(), username);
        Ok(())
    }
}

/// Whether `address` still needs inserting for `username`.
pub fn needs_registration(existing: Option<&str>, username: &str, address: &str) -> Result<bool, Error> {
    match existing {
        None => Ok(true),
        Some(current) if current == username => Ok(false),
        Some(current) => Err(Error::UserMapConflict {
            address: address.to_string(),
            username: current.to_string(),
        }),
    }
}

// ── pool_config ──────────────────────────────────────────────────────

impl Table<PoolConfigRow> {
    /// Insert once per pool address; later calls are no-ops.
    pub async fn insert(&self, row: &PoolConfigRow) -> Result<PgQueryResult, Error> {
        Ok(sqlx::query(
            r#"
            INSERT INTO pool_config (
                contract_address, base_token, initial_share_price, minimum_share_reserves,
                minimum_transaction_amount, position_duration, checkpoint_duration, time_stretch,
                governance, fee_collector, curve_fee, flat_fee, governance_fee, oracle_size,
                update_gap
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (contract_address) DO NOTHING
            "#,
        )
        .bind(&row.contract_address)
        .bind(&row.base_token)
        .bind(row.initial_share_price)
        .bind(row.minimum_share_reserves)
        .bind(row.minimum_transaction_amount)
        .bind(row.position_duration)
        .bind(row.checkpoint_duration)
        .bind(row.time_stretch)
        .bind(&row.governance)
        .bind(&row.fee_collector)
        .bind(row.curve_fee)
        .bind(row.flat_fee)
        .bind(row.governance_fee)
        .bind(row.oracle_size)
        .bind(row.update_gap)
        .execute(&self.pool)
        .await?)
    }

    pub async fn get_all(&self) -> Result<Vec<PoolConfigRow>, Error> {
        Ok(sqlx::query_as("SELECT * FROM pool_config ORDER BY contract_address")
            .fetch_all(&self.pool)
            .await?)
    }
}

// ── pool_info ────────────────────────────────────────────────────────

impl Table<PoolInfoRow> {
    pub async fn insert(
        &self,
        row: &PoolInfoRow,
        transaction: &mut DbTransaction<'_>,
    ) -> Result<PgQueryResult, Error> {
        Ok(sqlx::query(
            r#"
            INSERT INTO pool_info (
                block_number, timestamp, share_reserves, share_adjustment, bond_reserves,
                lp_total_supply, share_price, longs_outstanding, long_average_maturity_time,
                shorts_outstanding, short_average_maturity_time,
                withdrawal_shares_ready_to_withdraw, withdrawal_shares_proceeds, lp_share_price,
                long_exposure, spot_price, fixed_rate, variable_rate
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (block_number) DO NOTHING
            "#,
        )
        .bind(row.block_number)
        .bind(row.timestamp)
        .bind(row.share_reserves)
        .bind(row.share_adjustment)
        .bind(row.bond_reserves)
        .bind(row.lp_total_supply)
        .bind(row.share_price)
        .bind(row.longs_outstanding)
        .bind(row.long_average_maturity_time)
        .bind(row.shorts_outstanding)
        .bind(row.short_average_maturity_time)
        .bind(row.withdrawal_shares_ready_to_withdraw)
        .bind(row.withdrawal_shares_proceeds)
        .bind(row.lp_share_price)
        .bind(row.long_exposure)
        .bind(row.spot_price)
        .bind(row.fixed_rate)
        .bind(row.variable_rate)
        .execute(&mut **transaction)
        .await?)
    }

    pub async fn get_all(&self) -> Result<Vec<PoolInfoRow>, Error> {
        Ok(sqlx::query_as("SELECT * FROM pool_info ORDER BY block_number")
            .fetch_all(&self.pool)
            .await?)
    }
}

// ── checkpoint_info ──────────────────────────────────────────────────

impl Table<CheckpointInfoRow> {
    pub async fn insert(
        &self,
        row: &CheckpointInfoRow,
        transaction: &mut DbTransaction<'_>,
    ) -> Result<PgQueryResult, Error> {
        Ok(sqlx::query(
            r#"
            INSERT INTO checkpoint_info (block_number, checkpoint_time, share_price, long_exposure)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (block_number) DO NOTHING
            "#,
        )
        .bind(row.block_number)
        .bind(row.checkpoint_time)
        .bind(row.share_price)
        .bind(row.long_exposure)
        .execute(&mut **transaction)
        .await?)
    }

    pub async fn get_all(&self) -> Result<Vec<CheckpointInfoRow>, Error> {
        Ok(sqlx::query_as("SELECT * FROM checkpoint_info ORDER BY block_number")
            .fetch_all(&self.pool)
            .await?)
    }
}

// ── transactions ─────────────────────────────────────────────────────

impl Table<TransactionRow> {
    pub async fn insert_many(
        &self,
        rows: &[TransactionRow],
        transaction: &mut DbTransaction<'_>,
    ) -> Result<(), Error> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            INSERT INTO transactions (
                block_number, transaction_index, log_index, transaction_hash, event_name, trader,
                asset_id, maturity_time, base_amount, bond_amount, lp_amount,
                withdrawal_share_amount, share_price
            )"#,
        );
        query_builder.push_values(rows, |mut b, row| {
            b.push_bind(row.block_number)
                .push_bind(row.transaction_index)
                .push_bind(row.log_index)
                .push_bind(&row.transaction_hash)
                .push_bind(&row.event_name)
                .push_bind(&row.trader)
                .push_bind(&row.asset_id)
                .push_bind(row.maturity_time)
                .push_bind(row.base_amount)
                .push_bind(row.bond_amount)
                .push_bind(row.lp_amount)
                .push_bind(row.withdrawal_share_amount)
                .push_bind(row.share_price);
        });
        query_builder.push(" ON CONFLICT (transaction_hash, log_index) DO NOTHING");

        query_builder.build().execute(&mut **transaction).await?;
        Ok(())
    }

    pub async fn get_all(&self) -> Result<Vec<TransactionRow>, Error> {
        Ok(
            sqlx::query_as("SELECT * FROM transactions ORDER BY block_number, log_index")
                .fetch_all(&self.pool)
                .await?,
        )
    }
}

// ── wallet_deltas ────────────────────────────────────────────────────

impl Table<WalletDeltaRow> {
    pub async fn insert_many(
        &self,
        rows: &[WalletDeltaRow],
        transaction: &mut DbTransaction<'_>,
    ) -> Result<(), Error> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            INSERT INTO wallet_deltas (
                block_number, transaction_hash, wallet_address, base_token_type, token_type,
                maturity_time, delta
            )"#,
        );
        query_builder.push_values(rows, |mut b, row| {
            b.push_bind(row.block_number)
                .push_bind(&row.transaction_hash)
                .push_bind(&row.wallet_address)
                .push_bind(&row.base_token_type)
                .push_bind(&row.token_type)
                .push_bind(row.maturity_time)
                .push_bind(row.delta);
        });

        query_builder.build().execute(&mut **transaction).await?;
        Ok(())
    }

    pub async fn get_all(&self) -> Result<Vec<WalletDeltaRow>, Error> {
        Ok(sqlx::query_as("SELECT * FROM wallet_deltas ORDER BY block_number, id")
            .fetch_all(&self.pool)
            .await?)
    }
}

// ── wallet_info ──────────────────────────────────────────────────────

impl Table<WalletInfoRow> {
    /// Add `row.balance` to the stored balance for the wallet and token.
    pub async fn apply_delta(
        &self,
        row: &WalletInfoRow,
        transaction: &mut DbTransaction<'_>,
    ) -> Result<PgQueryResult, Error> {
        Ok(sqlx::query(
            r#"
            INSERT INTO wallet_info (
                wallet_address, base_token_type, token_type, maturity_time, balance, block_number
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (wallet_address, token_type) DO UPDATE SET
                balance = wallet_info.balance + EXCLUDED.balance,
                block_number = EXCLUDED.block_number
            "#,
        )
        .bind(&row.wallet_address)
        .bind(&row.base_token_type)
        .bind(&row.token_type)
        .bind(row.maturity_time)
        .bind(row.balance)
        .bind(row.block_number)
        .execute(&mut **transaction)
        .await?)
    }

    pub async fn get_by_addresses(&self, addresses: &[String]) -> Result<Vec<WalletInfoRow>, Error> {
        Ok(sqlx::query_as(
            r#"
            SELECT * FROM wallet_info
            WHERE wallet_address = ANY($1)
            ORDER BY wallet_address, token_type
            "#,
        )
        .bind(addresses)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn get_all(&self) -> Result<Vec<WalletInfoRow>, Error> {
        Ok(sqlx::query_as("SELECT * FROM wallet_info ORDER BY wallet_address, token_type")
            .fetch_all(&self.pool)
            .await?)
    }
}

// ── user_map ─────────────────────────────────────────────────────────

impl Table<UserMapRow> {
    pub async fn get_username(
        &self,
        address: &str,
        transaction: &mut DbTransaction<'_>,
    ) -> Result<Option<String>, Error> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT username FROM user_map WHERE address = $1")
                .bind(address)
                .fetch_optional(&mut **transaction)
                .await?;
        Ok(row.map(|(username,)| username))
    }

    pub async fn insert(
        &self,
        address: &str,
        username: &str,
        transaction: &mut DbTransaction<'_>,
    ) -> Result<PgQueryResult, Error> {
        Ok(sqlx::query("INSERT INTO user_map (address, username) VALUES ($1, $2)")
            .bind(address)
            .bind(username)
            .execute(&mut **transaction)
            .await?)
    }

    pub async fn get_all(&self) -> Result<Vec<UserMapRow>, Error> {
        Ok(sqlx::query_as("SELECT * FROM user_map ORDER BY address")
            .fetch_all(&self.pool)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_address_needs_registration() {
        assert!(needs_registration(None, "alice", "0xabc").unwrap());
    }

    #[test]
    fn test_same_pair_is_noop() {
        assert!(!needs_registration(Some("alice"), "alice", "0xabc").unwrap());
    }

    #[test]
    fn test_conflicting_username_fails() {
        let err = needs_registration(Some("bob"), "alice", "0xabc").unwrap_err();
        assert!(matches!(err, Error::UserMapConflict { ref username, .. } if username == "bob"));
    }

    #[test]
    fn test_block_number_tables() {
        assert!(ChainsyncTable::PoolInfo.has_block_number());
        assert!(ChainsyncTable::WalletInfo.has_block_number());
        assert!(!ChainsyncTable::UserMap.has_block_number());
    }
}
