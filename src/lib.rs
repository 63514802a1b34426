// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GymPulse: activity feed aggregation & anonymization engine
//!
//! This crate turns raw per-tenant gym events (check-ins, achievements,
//! streak milestones, personal records, completed classes) into an
//! ephemeral, privacy-preserving, quantity-only activity stream and
//! leaderboard over a Redis-compatible store, refreshed by scheduled jobs.

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod services;
pub mod store;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use services::{Aggregator, FeedEngine};
use store::EphemeralStore;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn EphemeralStore>,
    pub feed: Arc<FeedEngine>,
    pub aggregator: Arc<Aggregator>,
}
