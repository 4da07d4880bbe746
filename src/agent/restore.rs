//! Wallet Restore
//!
//! Bots restarted under an existing username pick up the positions they
//! left open. Positions come from the database API's `wallet_info` rows;
//! base always comes from chain since chainsync only tracks trade deltas.
//! When the API cannot be reached each wallet is rebuilt from chain.

use super::api_client::BalanceSource;
use super::interface::HyperdriveInterface;
use super::wallet::{HyperdriveWallet, Long, Short};
use crate::chainsync::model::WalletInfoRow;
use crate::hyperdrive::scaled::decimal_to_scaled;
use alloy::primitives::{Address, U256};
use anyhow::{bail, Context, Result};
use std::str::FromStr;
use tracing::{info, warn};

/// Build `address`'s wallet from `wallet_info` rows. Rows of other wallets
/// and zero balances are ignored; BASE rows are replaced by `base`.
pub fn wallet_from_rows(address: Address, base: U256, rows: &[WalletInfoRow]) -> Result<HyperdriveWallet> {
    let mut wallet = HyperdriveWallet::new(address, base);
    for row in rows {
        let owner = Address::from_str(&row.wallet_address)
            .with_context(|| format!("Invalid wallet address in balances: {}", row.wallet_address))?;
        if owner != address || row.base_token_type == "BASE" {
            continue;
        }
        let balance = decimal_to_scaled(row.balance)
            .with_context(|| format!("Bad {} balance for {}", row.token_type, address))?;
        if balance.is_zero() {
            continue;
        }
        let maturity = || -> Result<u64> {
            let Some(maturity) = row.maturity_time else {
                bail!("{} row for {} has no maturity time", row.token_type, address);
            };
            Ok(u64::try_from(maturity)?)
        };
        match row.base_token_type.as_str() {
            "LONG" => {
                wallet.longs.insert(maturity()?, Long { balance });
            }
            "SHORT" => {
                // Open share price is not recorded per wallet.
                wallet.shorts.insert(maturity()?, Short { balance, open_share_price: U256::ZERO });
            }
            "LP" => wallet.lp_tokens = balance,
            "WITHDRAWAL_SHARE" => wallet.withdraw_shares = balance,
            other => bail!("Unknown token type {} for {}", other, address),
        }
    }
    Ok(wallet)
}

/// Restore one wallet per address, preferring `source` over chain reads.
pub async fn restore_wallets<S, I>(
    source: Option<&S>,
    interface: &I,
    addresses: &[Address],
) -> Result<Vec<HyperdriveWallet>>
where
    S: BalanceSource + ?Sized,
    I: HyperdriveInterface + ?Sized,
{
    if let Some(source) = source {
        match source.balance_of(addresses).await {
            Ok(rows) => {
                let mut wallets = Vec::with_capacity(addresses.len());
                for &address in addresses {
                    let base = interface.base_balance(address).await?;
                    wallets.push(wallet_from_rows(address, base, &rows)?);
                }
                info!("Restored {} wallet(s) from {} balance row(s)", wallets.len(), rows.len());
                return Ok(wallets);
            }
            Err(e) => warn!("Balance lookup failed, rebuilding wallets from chain: {:#}", e),
        }
    }

    let mut wallets = Vec::with_capacity(addresses.len());
    for &address in addresses {
        wallets.push(interface.wallet_from_chain(address).await?);
    }
    info!("Rebuilt {} wallet(s) from chain", wallets.len());
    Ok(wallets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::interface::mock::MockInterface;
    use crate::fixed_point::ONE_18;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    /// Database API stand-in returning fixed rows, or failing
    struct MockBalances {
        rows: Option<Vec<WalletInfoRow>>,
        requested: Mutex<Vec<Address>>,
    }

    impl MockBalances {
        fn new(rows: Option<Vec<WalletInfoRow>>) -> Self {
            Self { rows, requested: Mutex::new(vec![]) }
        }
    }

    #[async_trait]
    impl BalanceSource for MockBalances {
        async fn balance_of(&self, addresses: &[Address]) -> Result<Vec<WalletInfoRow>> {
            self.requested.lock().unwrap().extend_from_slice(addresses);
            self.rows.clone().ok_or_else(|| anyhow!("connection refused"))
        }
    }

    fn row(wallet: Address, base_token_type: &str, maturity: Option<i64>, balance: Decimal) -> WalletInfoRow {
        let token_type = match maturity {
            Some(m) => format!("{}-{}", base_token_type, m),
            None => base_token_type.to_string(),
        };
        WalletInfoRow {
            wallet_address: wallet.to_string(),
            base_token_type: base_token_type.to_string(),
            token_type,
            maturity_time: maturity,
            balance,
            block_number: 40,
        }
    }

    fn units(n: u64) -> U256 {
        ONE_18 * U256::from(n)
    }

    fn bot() -> Address {
        Address::repeat_byte(0x0b)
    }

    #[test]
    fn test_wallet_from_rows() {
        let other = Address::repeat_byte(0x0c);
        let rows = vec![
            row(bot(), "LONG", Some(1_000), dec!(12.5)),
            row(bot(), "SHORT", Some(2_000), dec!(3)),
            row(bot(), "SHORT", Some(3_000), dec!(0)),
            row(bot(), "LP", None, dec!(7)),
            row(bot(), "BASE", None, dec!(-500)),
            row(other, "LONG", Some(1_000), dec!(99)),
        ];
        let wallet = wallet_from_rows(bot(), units(50), &rows).unwrap();

        assert_eq!(wallet.base, units(50), "base comes from chain");
        assert_eq!(wallet.longs[&1_000].balance, ONE_18 * U256::from(25) / U256::from(2));
        assert_eq!(wallet.shorts.len(), 1, "closed short dropped");
        assert_eq!(wallet.shorts[&2_000].balance, units(3));
        assert_eq!(wallet.lp_tokens, units(7));
        assert!(wallet.withdraw_shares.is_zero());
    }

    #[test]
    fn test_position_rows_need_maturity() {
        let rows = vec![row(bot(), "LONG", None, dec!(1))];
        assert!(wallet_from_rows(bot(), U256::ZERO, &rows).is_err());
    }

    #[tokio::test]
    async fn test_restore_prefers_database_positions() {
        let rows = vec![row(bot(), "LONG", Some(1_000), dec!(4))];
        let source = MockBalances::new(Some(rows));
        let mut on_chain = HyperdriveWallet::new(bot(), units(80));
        on_chain.lp_tokens = units(1);
        let mock = MockInterface::new(&[], vec![]).with_chain_wallet(on_chain);

        let wallets = restore_wallets(Some(&source), &mock, &[bot()]).await.unwrap();
        assert_eq!(*source.requested.lock().unwrap(), vec![bot()]);
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].base, units(80));
        assert_eq!(wallets[0].longs[&1_000].balance, units(4));
        assert!(wallets[0].lp_tokens.is_zero(), "database rows win over chain");
    }

    #[tokio::test]
    async fn test_restore_falls_back_to_chain() {
        let mut on_chain = HyperdriveWallet::new(bot(), units(80));
        on_chain.longs.insert(1_000, Long { balance: units(2) });
        let mock = MockInterface::new(&[], vec![]).with_chain_wallet(on_chain.clone());

        let unreachable = MockBalances::new(None);
        let wallets = restore_wallets(Some(&unreachable), &mock, &[bot()]).await.unwrap();
        assert_eq!(wallets, vec![on_chain.clone()]);

        let wallets = restore_wallets::<MockBalances, _>(None, &mock, &[bot()]).await.unwrap();
        assert_eq!(wallets, vec![on_chain]);
    }
}
