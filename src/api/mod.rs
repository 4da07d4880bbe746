//! Database REST API
//!
//! Two POST routes over the chainsync database, both answering with a
//! `{data, error}` envelope: 200 on success, 500 on failure.
//!
//! - `/register_bots`: map bot wallet addresses to a username
//! - `/balance_of`: current `wallet_info` rows for a set of addresses

pub mod handlers;
pub mod server;

use crate::chainsync::Database;
use serde::{Deserialize, Serialize};
use std::{ops::Deref, sync::Arc};

pub use server::{serve, ServerConfig};

/// Shared handler state; cheap to clone into each actix worker.
pub struct AppState<T>(Arc<T>);

impl<T> AppState<T> {
    pub fn new(state: T) -> AppState<T> {
        AppState(Arc::new(state))
    }
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> AppState<T> {
        AppState(Arc::clone(&self.0))
    }
}

impl<T> Deref for AppState<T> {
    type Target = Arc<T>;

    fn deref(&self) -> &Arc<T> {
        &self.0
    }
}

#[derive(Debug)]
pub struct State {
    pub database: Database,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBotsRequest {
    pub wallet_addrs: Vec<String>,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceOfRequest {
    pub wallet_addrs: Vec<String>,
}

/// Response envelope shared by every route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }
}
