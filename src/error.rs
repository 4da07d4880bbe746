use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use sqlx::error::Error as SQL_ERROR;
use sqlx::migrate::MigrateError as MIGRATE_ERROR;
use std::io::Error as IO_ERROR;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] IO_ERROR),

    #[error("{0}")]
    SQL(#[from] SQL_ERROR),

    #[error("{0}")]
    Migrate(#[from] MIGRATE_ERROR),

    #[error("Address {address} is already registered to {username}")]
    UserMapConflict { address: String, username: String },

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Server end with error: {0}")]
    ServerError(String),

    #[error("{0}")]
    AnyHowError(#[from] anyhow::Error),
}

/// Failures become `500 {"data": null, "error": "<message>"}`.
impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "data": null,
            "error": self.to_string(),
        }))
    }
}
