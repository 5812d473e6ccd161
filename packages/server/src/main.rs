#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Stub upstream binary for the floodwatch dashboard.
//!
//! Reads `BIND_ADDR` / `PORT` and serves the `location/*` feeds.

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    floodwatch_server::run_server(floodwatch_server::ServerConfig::from_env()).await
}
