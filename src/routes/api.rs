// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read API over the feed engine, plus the internal event-ingest endpoint.
//!
//! Payloads follow the activity wire contract: quantity-only, never a
//! personal field. Read handlers never fail on store trouble — the engine
//! degrades them to empty results.

use crate::error::{AppError, Result};
use crate::models::{
    Activity, BatchOutcome, DomainEvent, Insight, RankingEntry, RankingPeriod, RealtimeSummary,
};
use crate::store::keys;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tenants/{tenant}/feed", get(get_feed))
        .route("/api/tenants/{tenant}/feed/live", get(ws_feed))
        .route(
            "/api/tenants/{tenant}/realtime-summary",
            get(get_realtime_summary),
        )
        .route("/api/tenants/{tenant}/insights", get(get_insights))
        .route(
            "/api/tenants/{tenant}/rankings/{ranking_type}",
            get(get_rankings),
        )
        .route("/internal/events", post(ingest_events))
}

// ─── Feed ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct FeedQuery {
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Serialize)]
struct FeedResponse {
    results: Vec<Activity>,
}

/// Read a slice of the tenant's activity feed, newest first.
async fn get_feed(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<u64>,
    Query(query): Query<FeedQuery>,
) -> Json<FeedResponse> {
    let results = state.feed.get_feed(tenant, query.limit, query.offset).await;
    Json(FeedResponse { results })
}

// ─── Realtime summary ────────────────────────────────────────

async fn get_realtime_summary(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<u64>,
) -> Json<RealtimeSummary> {
    Json(state.feed.get_realtime_summary(tenant).await)
}

// ─── Insights ────────────────────────────────────────────────

#[derive(Serialize)]
struct InsightsResponse {
    results: Vec<Insight>,
}

async fn get_insights(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<u64>,
) -> Json<InsightsResponse> {
    let results = state.feed.generate_motivational_insights(tenant).await;
    Json(InsightsResponse { results })
}

// ─── Rankings ────────────────────────────────────────────────

#[derive(Deserialize)]
struct RankingsQuery {
    #[serde(default = "default_period")]
    period: String,
    #[serde(default = "default_ranking_limit")]
    limit: usize,
}

fn default_period() -> String {
    "daily".to_string()
}

fn default_ranking_limit() -> usize {
    10
}

#[derive(Serialize)]
struct RankingsResponse {
    results: Vec<RankingEntry>,
}

async fn get_rankings(
    State(state): State<Arc<AppState>>,
    Path((tenant, ranking_type)): Path<(u64, String)>,
    Query(query): Query<RankingsQuery>,
) -> Result<Json<RankingsResponse>> {
    let period: RankingPeriod = query
        .period
        .parse()
        .map_err(AppError::BadRequest)?;

    let results = state
        .feed
        .get_anonymous_rankings(tenant, &ranking_type, period, query.limit)
        .await;
    Ok(Json(RankingsResponse { results }))
}

// ─── Event ingest (internal) ─────────────────────────────────

/// Synchronous event ingestion from the core backend's request handlers
/// (e.g. a check-in fired inline). Returns partial-failure counts.
async fn ingest_events(
    State(state): State<Arc<AppState>>,
    Json(events): Json<Vec<DomainEvent>>,
) -> Json<BatchOutcome> {
    let outcome = state.aggregator.process_batch(&events).await;
    Json(outcome)
}

// ─── Live feed (WebSocket) ───────────────────────────────────

/// Upgrade to a WebSocket mirroring the tenant's pub/sub update channel.
async fn ws_feed(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<u64>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| forward_feed_updates(state, tenant, socket))
}

async fn forward_feed_updates(state: Arc<AppState>, tenant: u64, mut socket: WebSocket) {
    let channel = keys::feed_channel(tenant);
    let mut updates = match state.store.subscribe(&channel).await {
        Ok(rx) => rx,
        Err(e) => {
            tracing::warn!(tenant, error = %e, "Live feed subscription failed");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    tracing::debug!(tenant, "Live feed subscriber connected");
    loop {
        tokio::select! {
            update = updates.recv() => {
                match update {
                    Some(payload) => {
                        if socket.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                // Only care about the client going away
                match incoming {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    tracing::debug!(tenant, "Live feed subscriber disconnected");
}
