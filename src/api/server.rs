use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpServer};
use tracing::info;

use super::{handlers, AppState, State};
use crate::error::Error;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5002;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Request bodies up to 64 KiB. Bodies that fail to parse are answered
/// with the same 500 envelope as handler errors.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, _| Error::InvalidRequest(err.to_string()).into())
}

/// Bind and run until the server stops.
pub async fn serve(app_state: AppState<State>, config: &ServerConfig) -> Result<(), Error> {
    info!("Database API listening on {}:{}", config.host, config.port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT])
            .allowed_header(header::CONTENT_TYPE);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(app_state.clone()))
            .app_data(json_config())
            .service(handlers::register_bots)
            .service(handlers::balance_of)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
    .map_err(|e| Error::ServerError(e.to_string()))
}
