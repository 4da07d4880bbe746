use actix_web::{post, web, HttpResponse};
use alloy::primitives::Address;
use std::str::FromStr;
use tracing::info;

use super::{ApiResponse, AppState, BalanceOfRequest, RegisterBotsRequest, State};
use crate::error::Error;

/// Parse and checksum the requested addresses so lookups match stored rows.
pub fn normalize_addresses(addresses: &[String]) -> Result<Vec<String>, Error> {
    addresses
        .iter()
        .map(|raw| {
            Address::from_str(raw.trim())
                .map(|address| address.to_string())
                .map_err(|_| Error::InvalidAddress(raw.clone()))
        })
        .collect()
}

pub fn validate_username(username: &str) -> Result<&str, Error> {
    let username = username.trim();
    if username.is_empty() {
        return Err(Error::InvalidUsername(username.to_string()));
    }
    Ok(username)
}

#[post("/register_bots")]
pub async fn register_bots(
    state: web::Data<AppState<State>>,
    request: web::Json<RegisterBotsRequest>,
) -> Result<HttpResponse, Error> {
    let username = validate_username(&request.username)?;
    let addresses = normalize_addresses(&request.wallet_addrs)?;
    state.database.add_user_map(username, &addresses).await?;
    info!("Registered {:?} as {}", addresses, username);
    Ok(HttpResponse::Ok().json(ApiResponse::ok(addresses)))
}

#[post("/balance_of")]
pub async fn balance_of(
    state: web::Data<AppState<State>>,
    request: web::Json<BalanceOfRequest>,
) -> Result<HttpResponse, Error> {
    let addresses = normalize_addresses(&request.wallet_addrs)?;
    let rows = state.database.wallet_info.get_by_addresses(&addresses).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(rows)))
}
