// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ephemeral store client layer.
//!
//! The engine's only persistence is a Redis-compatible TTL store. The
//! [`EphemeralStore`] trait is the seam: production uses [`RedisStore`],
//! tests and store-less local dev use [`MemoryStore`], which implements the
//! same TTL/list/sorted-set/hash/pub-sub semantics in process.

pub mod keys;
pub mod memory;
pub mod redis;

pub use keys::TenantId;
pub use memory::MemoryStore;
pub use redis::RedisStore;

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::AppError;

/// Snapshot of store memory usage (`INFO memory`).
#[derive(Debug, Clone)]
pub struct MemoryInfo {
    pub used_memory: u64,
    pub used_memory_human: String,
}

/// Operations the engine requires from the ephemeral store.
///
/// TTL semantics follow Redis: `ttl` returns −1 for a key without expiry and
/// −2 for a missing key; `incr` creates missing keys without an expiry.
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Batch read in a single round trip.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, AppError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError>;

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: i64) -> Result<(), AppError>;

    /// Atomic integer increment. Creates the key (no expiry) if missing.
    async fn incr(&self, key: &str) -> Result<i64, AppError>;

    /// Atomic float increment. Creates the key (no expiry) if missing.
    async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64, AppError>;

    /// Returns false if the key does not exist.
    async fn expire(&self, key: &str, ttl_secs: i64) -> Result<bool, AppError>;

    async fn ttl(&self, key: &str) -> Result<i64, AppError>;

    /// Glob pattern scan (`KEYS`). Per-tenant keyspaces are small enough
    /// that cursor scanning is not worth the extra round trips.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, AppError>;

    async fn lpush(&self, key: &str, value: &str) -> Result<i64, AppError>;

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), AppError>;

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, AppError>;

    async fn zadd(&self, key: &str, members: &[(String, f64)]) -> Result<(), AppError>;

    async fn zrevrange_withscores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<(String, f64)>, AppError>;

    async fn del(&self, keys: &[String]) -> Result<i64, AppError>;

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), AppError>;

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, AppError>;

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), AppError>;

    /// Subscribe to a channel; payloads arrive on the returned receiver
    /// until it is dropped.
    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>, AppError>;

    async fn info_memory(&self) -> Result<MemoryInfo, AppError>;
}
