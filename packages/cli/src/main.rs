#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal dashboard for the floodwatch feeds.
//!
//! ```text
//! floodwatch watch [--lat 28.61 --lng 77.21]
//! floodwatch once [--export scene.geojson]
//! floodwatch serve
//! ```
//!
//! `watch` keeps the three feeds polling at their cadences, mirrors flood
//! risk onto a headless map, and reads line commands (`hide`, `show`,
//! `refresh`, `filter <tier>`, `goto <lat> <lng>`, `quit`) from stdin.
//! Running without a subcommand is the same as `watch`.
//!
//! Logging goes through `indicatif-log-bridge` so log lines and the
//! countdown bar never fight for the terminal.

mod command;
mod config;
mod progress;
mod session;
mod summary;

use std::{path::PathBuf, sync::Arc};

use clap::{Args, Parser, Subcommand};
use floodwatch_gateway::{FeedGateway, GatewayError, HttpGateway};
use floodwatch_map::HeadlessEngine;
use indicatif::MultiProgress;
use tokio::io::{AsyncBufReadExt as _, BufReader};

use crate::{
    command::{HELP, WatchCommand},
    config::WatchConfig,
    progress::CountdownBar,
    session::{Reply, Session},
};

#[derive(Parser)]
#[command(name = "floodwatch", about = "Live flood risk, weather, and community alerts")]
struct Cli {
    /// TOML file overriding the built-in watch configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Default)]
struct LocationArgs {
    /// Latitude of the live position (defaults to the configured fallback)
    #[arg(long, requires = "lng", allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude of the live position
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lng: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll continuously and accept commands on stdin
    Watch {
        #[command(flatten)]
        location: LocationArgs,
    },
    /// Refresh every feed once, print the dashboard, and exit
    Once {
        #[command(flatten)]
        location: LocationArgs,

        /// Write the map scene as GeoJSON to this path
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Run the stub upstream server
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = progress::init_logger();
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Watch {
        location: LocationArgs::default(),
    });

    match command {
        Commands::Watch { location } => {
            let config = WatchConfig::load(cli.config.as_deref())?;
            let fix = config.location(location.lat, location.lng)?;
            let session =
                Session::start(gateway(&config)?, config.refresh(), fix, HeadlessEngine::new())
                    .await;
            watch(session, &config, &multi).await?;
        }
        Commands::Once { location, export } => {
            let config = WatchConfig::load(cli.config.as_deref())?;
            let fix = config.location(location.lat, location.lng)?;
            let mut session =
                Session::start(gateway(&config)?, config.refresh(), fix, HeadlessEngine::new())
                    .await;
            if let Err(e) = session.refresh_all().await {
                log::error!("Map update failed: {e}");
            }
            progress::print(&multi, &session.dashboard());

            if let Some(path) = export {
                std::fs::write(&path, session.export_geojson()?)?;
                log::info!("Wrote map scene to {}", path.display());
            }
            session.close();
        }
        Commands::Serve => {
            // The server uses actix-web's runtime, so we need to run it
            // in a blocking task to avoid nesting tokio runtimes.
            tokio::task::spawn_blocking(|| {
                actix_web::rt::System::new().block_on(floodwatch_server::run_server(
                    floodwatch_server::ServerConfig::from_env(),
                ))
            })
            .await??;
        }
    }

    Ok(())
}

fn gateway(config: &WatchConfig) -> Result<Arc<dyn FeedGateway>, GatewayError> {
    log::info!("Polling {}", config.api_url);
    Ok(Arc::new(HttpGateway::new(config.gateway())?))
}

/// Runs the interactive loop until `quit` or end of input.
async fn watch(
    mut session: Session<HeadlessEngine>,
    config: &WatchConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let bar = CountdownBar::new(multi, config.refresh().flood_risk_cadence);
    let mut states = session.subscribe();
    let mut seconds = session.countdown();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut was_loading = states.borrow().any_loading();

    progress::print(multi, HELP);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match line.parse::<WatchCommand>() {
                    Ok(command) => match session.handle(command).await {
                        Reply::Print(text) => progress::print(multi, &text),
                        Reply::Quit => break,
                    },
                    Err(e) => progress::print(multi, &e.to_string()),
                }
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let loading = states.borrow_and_update().any_loading();
                if let Err(e) = session.sync_map() {
                    log::error!("Map update failed: {e}");
                    progress::print(multi, &format!("Map update failed: {e}"));
                }
                if was_loading && !loading {
                    progress::print(multi, &session.dashboard());
                }
                was_loading = loading;
            }
            changed = seconds.changed() => {
                if changed.is_err() {
                    break;
                }
                let remaining = *seconds.borrow_and_update();
                bar.update(remaining, session.is_visible());
            }
        }
    }

    bar.finish();
    session.close();
    Ok(())
}
