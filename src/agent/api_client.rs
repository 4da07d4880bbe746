//! Database API Client
//!
//! Used by the bots to register their wallets under a username and to read
//! balances recorded by chainsync.

use crate::api::{ApiResponse, BalanceOfRequest, RegisterBotsRequest};
use crate::chainsync::model::WalletInfoRow;
use crate::config::DEFAULT_USERNAME;
use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where restarted bots read their recorded positions from
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn balance_of(&self, addresses: &[Address]) -> Result<Vec<WalletInfoRow>>;
}

#[derive(Debug, Clone)]
pub struct DatabaseApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl DatabaseApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Register `addresses` under `username`. The placeholder username is
    /// refused so unnamed bots never claim addresses.
    pub async fn register_username(&self, username: &str, addresses: &[Address]) -> Result<()> {
        if username == DEFAULT_USERNAME {
            bail!("Set a username in the agent config before registering (got {:?})", username);
        }
        let request = RegisterBotsRequest {
            wallet_addrs: addresses.iter().map(|a| a.to_string()).collect(),
            username: username.to_string(),
        };
        let _: Vec<String> = self.post("register_bots", &request).await?;
        info!("Registered {} wallet(s) as {}", addresses.len(), username);
        Ok(())
    }

    pub async fn balance_of(&self, addresses: &[Address]) -> Result<Vec<WalletInfoRow>> {
        let request = BalanceOfRequest {
            wallet_addrs: addresses.iter().map(|a| a.to_string()).collect(),
        };
        self.post("balance_of", &request).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, route: &str, body: &B) -> Result<T> {
        let url = format!("{}/{}", self.base_url, route);
        let response = self
            .client
            .post(&url)
            .json(body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;
        let status = response.status();
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Invalid response body from {}", url))?;
        unwrap_envelope(envelope, status.is_success())
            .with_context(|| format!("{} returned {}", url, status))
    }
}

#[async_trait]
impl BalanceSource for DatabaseApiClient {
    async fn balance_of(&self, addresses: &[Address]) -> Result<Vec<WalletInfoRow>> {
        DatabaseApiClient::balance_of(self, addresses).await
    }
}

fn unwrap_envelope<T>(envelope: ApiResponse<T>, success: bool) -> Result<T> {
    match (success, envelope) {
        (_, ApiResponse { error: Some(error), .. }) => bail!(error),
        (true, ApiResponse { data: Some(data), .. }) => Ok(data),
        (true, ApiResponse { data: None, .. }) => bail!("Response carried no data"),
        (false, _) => bail!("Request failed without an error message"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_placeholder_username_refused() {
        let client = DatabaseApiClient::new("http://localhost:1/");
        let err = client
            .register_username(DEFAULT_USERNAME, &[Address::repeat_byte(1)])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("username"));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = DatabaseApiClient::new("http://localhost:5002/");
        assert_eq!(client.base_url, "http://localhost:5002");
    }

    #[test]
    fn test_envelope_error_wins() {
        let envelope: ApiResponse<Vec<String>> = serde_json::from_str(r#"{"data": null, "error": "boom"}"#).unwrap();
        let err = unwrap_envelope(envelope, false).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_envelope_data() {
        let envelope: ApiResponse<Vec<String>> = serde_json::from_str(r#"{"data": ["0x1"], "error": null}"#).unwrap();
        assert_eq!(unwrap_envelope(envelope, true).unwrap(), vec!["0x1".to_string()]);
    }
}
