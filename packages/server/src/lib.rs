#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web stub upstream for the floodwatch location feeds.
//!
//! Serves the three `location/*` endpoints the dashboard polls, backed by
//! the deterministic payloads in `floodwatch_location`, plus a health
//! check. Every success is wrapped in the standard response envelope.

mod handlers;

use std::net::TcpListener;

use actix_cors::Cors;
use actix_web::{App, HttpServer, dev::Server, middleware, web};
use chrono::{DateTime, Utc};
use floodwatch_location::alerts::AlertBoard;

/// Address used when `BIND_ADDR` is unset.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";

/// Port used when `PORT` is unset or unparsable.
pub const DEFAULT_PORT: u16 = 8080;

/// Shared application state.
pub struct AppState {
    /// Community alerts, with issue times anchored at startup.
    pub alerts: AlertBoard,
}

impl AppState {
    /// State seeded from the embedded alert list.
    #[must_use]
    pub fn seeded(now: DateTime<Utc>) -> Self {
        Self {
            alerts: AlertBoard::seeded(now),
        }
    }
}

/// Where the server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Worker threads; `None` uses one per core.
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            port: DEFAULT_PORT,
            workers: None,
        }
    }
}

impl ServerConfig {
    /// Reads `BIND_ADDR` and `PORT`.
    #[must_use]
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            bind_addr,
            port,
            workers: None,
        }
    }
}

/// Registers the `/api` routes.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/location/flood-risk", web::get().to(handlers::flood_risk))
            .route("/location/weather", web::get().to(handlers::weather))
            .route(
                "/location/community-updates",
                web::get().to(handlers::community_updates),
            ),
    );
}

/// Builds a server on an already-bound listener. The returned [`Server`]
/// must be awaited (or spawned) to start accepting connections.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the listener cannot be adopted.
pub fn serve(
    listener: TcpListener,
    state: web::Data<AppState>,
    workers: Option<usize>,
) -> std::io::Result<Server> {
    let mut server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(routes)
    });
    if let Some(workers) = workers {
        server = server.workers(workers);
    }

    Ok(server.listen(listener)?.run())
}

/// Binds to `config` and serves until shut down. The caller provides the
/// async runtime and logger.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: ServerConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind((config.bind_addr.as_str(), config.port))?;
    log::info!("Starting server on {}", listener.local_addr()?);

    let state = web::Data::new(AppState::seeded(Utc::now()));
    serve(listener, state, config.workers)?.await
}
