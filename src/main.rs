// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GymPulse API Server
//!
//! Runs the activity feed aggregation engine: the scheduled jobs, the event
//! ingest endpoint, and the thin read API over the ephemeral store.

use gympulse::{
    config::Config,
    scheduler::Scheduler,
    services::{directory::Directory, Aggregator, FeedEngine, HttpDirectory},
    store::{EphemeralStore, RedisStore},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting GymPulse API");

    // Connect to the ephemeral store
    let store: Arc<dyn EphemeralStore> = Arc::new(
        RedisStore::connect(&config.redis_url)
            .await
            .expect("Failed to connect to ephemeral store"),
    );

    // Directory client against the core backend's internal API
    let directory: Arc<dyn Directory> = Arc::new(HttpDirectory::new(&config.core_api_url));
    tracing::info!(url = %config.core_api_url, "Directory client initialized");

    // Build the engine: store → feed engine → aggregator → scheduler
    let feed = Arc::new(FeedEngine::new(Arc::clone(&store)));
    let aggregator = Arc::new(Aggregator::new(
        Arc::clone(&store),
        Arc::clone(&feed),
        Arc::clone(&directory),
    ));

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&store),
        Arc::clone(&feed),
        Arc::clone(&aggregator),
        Arc::clone(&directory),
    ));
    let job_handles = scheduler.spawn();
    tracing::info!(jobs = job_handles.len(), "Scheduler jobs spawned");

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        feed,
        aggregator,
    });

    // Build router
    let app = gympulse::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gympulse=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
