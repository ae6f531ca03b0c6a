// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use axum::{routing::get, Router};
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::snapshot_service::SnapshotService;
use crate::infrastructure::config::load_config;
use crate::infrastructure::influx_store::InfluxMeasurementStore;
use crate::infrastructure::registration_client::RegistrationClient;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{get_snapshot, health_check};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;

    // Collaborators (infrastructure layer)
    let store = Arc::new(InfluxMeasurementStore::new(config.influx));
    let history = Arc::new(RegistrationClient::new(config.registration)?);

    // Use case (application layer)
    let snapshot_service = SnapshotService::new(store, history)
        .with_parallel_species(config.snapshot.parallel_species);

    let state = Arc::new(AppState { snapshot_service });

    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/snapshots/:station_id", get(get_snapshot))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = config
        .server
        .address()
        .parse()
        .context("Invalid server address")?;
    tracing::info!("Starting station-snapshot service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
