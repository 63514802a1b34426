// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Redis-backed [`EphemeralStore`] implementation.
//!
//! Uses a multiplexed [`ConnectionManager`] for commands (it reconnects on
//! its own) and a dedicated pub/sub connection per subscriber.

use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::store::{EphemeralStore, MemoryInfo};

/// Redis client wrapper.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to the store at `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(url)
            .map_err(|e| AppError::Store(format!("invalid store URL: {}", e)))?;
        let conn = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| AppError::Store(format!("failed to connect to store: {}", e)))?;

        tracing::info!(url, "Connected to ephemeral store");

        Ok(Self { client, conn })
    }

    fn store_err(e: redis::RedisError) -> AppError {
        AppError::Store(e.to_string())
    }
}

#[async_trait]
impl EphemeralStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(Self::store_err)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, AppError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(Self::store_err)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.set(key, value).await.map_err(Self::store_err)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: i64) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.set_ex(key, value, ttl_secs.max(0) as u64)
            .await
            .map_err(Self::store_err)
    }

    async fn incr(&self, key: &str) -> Result<i64, AppError> {
        let mut conn = self.conn.clone();
        conn.incr(key, 1i64).await.map_err(Self::store_err)
    }

    async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64, AppError> {
        let mut conn = self.conn.clone();
        conn.incr(key, delta).await.map_err(Self::store_err)
    }

    async fn expire(&self, key: &str, ttl_secs: i64) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        conn.expire(key, ttl_secs).await.map_err(Self::store_err)
    }

    async fn ttl(&self, key: &str) -> Result<i64, AppError> {
        let mut conn = self.conn.clone();
        conn.ttl(key).await.map_err(Self::store_err)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, AppError> {
        let mut conn = self.conn.clone();
        conn.keys(pattern).await.map_err(Self::store_err)
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<i64, AppError> {
        let mut conn = self.conn.clone();
        conn.lpush(key, value).await.map_err(Self::store_err)
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.ltrim(key, start as isize, stop as isize)
            .await
            .map_err(Self::store_err)
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, AppError> {
        let mut conn = self.conn.clone();
        conn.lrange(key, start as isize, stop as isize)
            .await
            .map_err(Self::store_err)
    }

    async fn zadd(&self, key: &str, members: &[(String, f64)]) -> Result<(), AppError> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        // zadd_multiple takes (score, member) pairs
        let pairs: Vec<(f64, &str)> = members.iter().map(|(m, s)| (*s, m.as_str())).collect();
        conn.zadd_multiple(key, &pairs).await.map_err(Self::store_err)
    }

    async fn zrevrange_withscores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<(String, f64)>, AppError> {
        let mut conn = self.conn.clone();
        conn.zrevrange_withscores(key, start as isize, stop as isize)
            .await
            .map_err(Self::store_err)
    }

    async fn del(&self, keys: &[String]) -> Result<i64, AppError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        conn.del(keys).await.map_err(Self::store_err)
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), AppError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.hset_multiple(key, fields).await.map_err(Self::store_err)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, AppError> {
        let mut conn = self.conn.clone();
        conn.hgetall(key).await.map_err(Self::store_err)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.publish(channel, payload).await.map_err(Self::store_err)
    }

    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>, AppError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(Self::store_err)?;
        pubsub.subscribe(channel).await.map_err(Self::store_err)?;

        let (tx, rx) = mpsc::channel(64);
        let channel = channel.to_string();
        tokio::spawn(async move {
            let mut stream = pubsub.into_on_message();
            while let Some(msg) = stream.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(channel = %channel, error = %e, "Bad pub/sub payload");
                        continue;
                    }
                };
                if tx.send(payload).await.is_err() {
                    // Subscriber went away
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn info_memory(&self) -> Result<MemoryInfo, AppError> {
        let mut conn = self.conn.clone();
        let info: String = redis::cmd("INFO")
            .arg("memory")
            .query_async(&mut conn)
            .await
            .map_err(Self::store_err)?;

        let mut used_memory = 0u64;
        let mut used_memory_human = String::new();
        for line in info.lines() {
            if let Some(v) = line.strip_prefix("used_memory:") {
                used_memory = v.trim().parse().unwrap_or(0);
            } else if let Some(v) = line.strip_prefix("used_memory_human:") {
                used_memory_human = v.trim().to_string();
            }
        }

        Ok(MemoryInfo {
            used_memory,
            used_memory_human,
        })
    }
}
