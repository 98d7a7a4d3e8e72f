//! Documentation of the municipal spending lookup API.
//!
//!
//!
//! # General Infrastructure
//! - One HTTP route answers spending figures for a city/year pair
//! - Data lives in a single CSV file the service does not own
//! - Any origin may call the API, no allow-list
//!
//!
//!
//! # Routes
//!
//! | Method | Path             | Body                                                 |
//! |--------|------------------|------------------------------------------------------|
//! | GET    | `/gastos`        | `{"Saúde": n, "Educação": n, "Transporte": n}`       |
//! | POST   | `/gastos/reload` | `{"registros": n}`                                   |
//! | GET    | `/health`        | `ok`                                                 |
//!
//! `/gastos` takes `cidade` and `ano` as query parameters. Missing either one
//! yields 400, an unknown pair yields 404, and every error body has the shape
//! `{"error": "..."}`.
//!
//!
//!
//! # Notes
//!
//! ## Load Modes
//! By default every request re-reads and re-parses the whole file, so edits
//! to the CSV show up immediately. With `GASTOS_LOAD_MODE=indexed` the file is
//! loaded once at startup into a (cidade, ano) map and only refreshed through
//! `POST /gastos/reload`. Responses are the same in both modes.
//!
//! ## Duplicates
//! When the same (cidade, ano) appears more than once, the first row in file
//! order wins.
//!
//!
//!
//! # Setup
//!
//! Run with the bundled sample data.
//! ```sh
//! RUST_LOG=info cargo run --bin gastos
//! ```
//!
//! Query it.
//! ```sh
//! curl "http://localhost:3000/gastos?cidade=S%C3%A3o%20Paulo&ano=2024"
//! ```
//!
//! Or through the tester.
//! ```sh
//! cargo run --bin tester -- --cidade "São Paulo" --ano 2024
//! ```
//!
//!
//!
//! # Environment
//!
//! - `PORT`: listening port, default `3000`
//! - `GASTOS_DATA_PATH`: dataset location, default `./data/gastos.csv`
//! - `GASTOS_LOAD_MODE`: `per_request` (default) or `indexed`
//! - `RUST_LOG`: tracing filter
use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::ctrl_c;
#[cfg(unix)]
use signal::unix::{SignalKind, signal};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod lookup;
pub mod routes;
pub mod state;
pub mod store;

use config::Config;
use routes::{gastos_handler, health_handler, reload_handler};
use state::State;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load().context("Environment misconfigured")?;

    info!("Initializing state...");
    let state = State::new(config).await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!(
        "Server running on {address}, serving {} in {:?} mode",
        state.lookup.data_path().display(),
        state.lookup.mode()
    );

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");

    Ok(())
}

pub fn app(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/gastos", get(gastos_handler))
        .route("/gastos/reload", post(reload_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
