// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process ephemeral store with Redis-compatible semantics.
//!
//! Backs integration tests and store-less local development. Expiry is lazy:
//! an expired entry is treated as missing (and dropped) on next access.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::store::{EphemeralStore, MemoryInfo};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(Vec<String>),
    ZSet(Vec<(String, f64)>),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value, ttl_secs: Option<i64>) -> Self {
        Self {
            value,
            expires_at: ttl_secs.map(|s| Instant::now() + Duration::from_secs(s.max(0) as u64)),
        }
    }

    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-memory [`EphemeralStore`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    channels: DashMap<String, Vec<mpsc::Sender<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a live entry, dropping it if expired.
    fn live(&self, key: &str) -> Option<Entry> {
        // Scope the shard guard before removing, or dashmap deadlocks.
        {
            let entry = self.entries.get(key)?;
            if !entry.expired() {
                return Some(entry.clone());
            }
        }
        self.entries.remove(key);
        None
    }

    fn wrong_type(key: &str) -> AppError {
        AppError::Store(format!("WRONGTYPE operation against key {}", key))
    }
}

/// Normalize a Redis-style index (negative counts from the end).
fn norm_index(idx: i64, len: usize) -> i64 {
    if idx < 0 {
        idx + len as i64
    } else {
        idx
    }
}

/// Glob match supporting `*` wildcards (the only metachar our patterns use).
fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }
    let mut rest = key;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 && !pattern.ends_with('*') {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

fn human_bytes(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.2}M", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1_024 {
        format!("{:.2}K", bytes as f64 / 1_024.0)
    } else {
        format!("{}B", bytes)
    }
}

#[async_trait]
impl EphemeralStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        match self.live(key) {
            Some(entry) => match entry.value {
                Value::Str(s) => Ok(Some(s)),
                _ => Err(Self::wrong_type(key)),
            },
            None => Ok(None),
        }
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, AppError> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.get(key).await?);
        }
        Ok(out)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.entries
            .insert(key.to_string(), Entry::new(Value::Str(value.to_string()), None));
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: i64) -> Result<(), AppError> {
        self.entries.insert(
            key.to_string(),
            Entry::new(Value::Str(value.to_string()), Some(ttl_secs)),
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, AppError> {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Str("0".to_string()), None));
        if entry.expired() {
            *entry = Entry::new(Value::Str("0".to_string()), None);
        }
        match &mut entry.value {
            Value::Str(s) => {
                let n: i64 = s
                    .parse()
                    .map_err(|_| AppError::Store(format!("value at {} is not an integer", key)))?;
                let n = n + 1;
                *s = n.to_string();
                Ok(n)
            }
            _ => Err(Self::wrong_type(key)),
        }
    }

    async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64, AppError> {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Str("0".to_string()), None));
        if entry.expired() {
            *entry = Entry::new(Value::Str("0".to_string()), None);
        }
        match &mut entry.value {
            Value::Str(s) => {
                let n: f64 = s
                    .parse()
                    .map_err(|_| AppError::Store(format!("value at {} is not a float", key)))?;
                let n = n + delta;
                *s = n.to_string();
                Ok(n)
            }
            _ => Err(Self::wrong_type(key)),
        }
    }

    async fn expire(&self, key: &str, ttl_secs: i64) -> Result<bool, AppError> {
        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.expired() => {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_secs.max(0) as u64));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<i64, AppError> {
        match self.live(key) {
            Some(entry) => match entry.expires_at {
                Some(at) => Ok(at.saturating_duration_since(Instant::now()).as_secs() as i64),
                None => Ok(-1),
            },
            None => Ok(-2),
        }
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, AppError> {
        let mut out: Vec<String> = self
            .entries
            .iter()
            .filter(|e| !e.value().expired() && glob_match(pattern, e.key()))
            .map(|e| e.key().clone())
            .collect();
        out.sort();
        Ok(out)
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<i64, AppError> {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::List(Vec::new()), None));
        if entry.expired() {
            *entry = Entry::new(Value::List(Vec::new()), None);
        }
        match &mut entry.value {
            Value::List(items) => {
                items.insert(0, value.to_string());
                Ok(items.len() as i64)
            }
            _ => Err(Self::wrong_type(key)),
        }
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), AppError> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.expired() {
                return Ok(());
            }
            if let Value::List(items) = &mut entry.value {
                let len = items.len();
                let start = norm_index(start, len).max(0) as usize;
                let stop = norm_index(stop, len);
                if stop < start as i64 {
                    items.clear();
                } else {
                    let stop = (stop as usize).min(len.saturating_sub(1));
                    *items = items[start.min(len)..=stop].to_vec();
                }
            }
        }
        Ok(())
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, AppError> {
        match self.live(key) {
            Some(Entry {
                value: Value::List(items),
                ..
            }) => {
                let len = items.len();
                if len == 0 {
                    return Ok(Vec::new());
                }
                let start = norm_index(start, len).max(0) as usize;
                let stop = norm_index(stop, len);
                if stop < start as i64 || start >= len {
                    return Ok(Vec::new());
                }
                let stop = (stop as usize).min(len - 1);
                Ok(items[start..=stop].to_vec())
            }
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn zadd(&self, key: &str, members: &[(String, f64)]) -> Result<(), AppError> {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::ZSet(Vec::new()), None));
        if entry.expired() {
            *entry = Entry::new(Value::ZSet(Vec::new()), None);
        }
        match &mut entry.value {
            Value::ZSet(set) => {
                for (member, score) in members {
                    match set.iter_mut().find(|(m, _)| m == member) {
                        Some(existing) => existing.1 = *score,
                        None => set.push((member.clone(), *score)),
                    }
                }
                Ok(())
            }
            _ => Err(Self::wrong_type(key)),
        }
    }

    async fn zrevrange_withscores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<(String, f64)>, AppError> {
        match self.live(key) {
            Some(Entry {
                value: Value::ZSet(mut set),
                ..
            }) => {
                set.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| b.0.cmp(&a.0))
                });
                let len = set.len();
                if len == 0 {
                    return Ok(Vec::new());
                }
                let start = norm_index(start, len).max(0) as usize;
                let stop = norm_index(stop, len);
                if stop < start as i64 || start >= len {
                    return Ok(Vec::new());
                }
                let stop = (stop as usize).min(len - 1);
                Ok(set[start..=stop].to_vec())
            }
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn del(&self, keys: &[String]) -> Result<i64, AppError> {
        let mut removed = 0;
        for key in keys {
            if self.entries.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), AppError> {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Hash(HashMap::new()), None));
        if entry.expired() {
            *entry = Entry::new(Value::Hash(HashMap::new()), None);
        }
        match &mut entry.value {
            Value::Hash(map) => {
                for (field, value) in fields {
                    map.insert(field.clone(), value.clone());
                }
                Ok(())
            }
            _ => Err(Self::wrong_type(key)),
        }
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, AppError> {
        match self.live(key) {
            Some(Entry {
                value: Value::Hash(map),
                ..
            }) => Ok(map),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(HashMap::new()),
        }
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), AppError> {
        if let Some(mut senders) = self.channels.get_mut(channel) {
            senders.retain(|tx| tx.try_send(payload.to_string()).is_ok());
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>, AppError> {
        let (tx, rx) = mpsc::channel(64);
        self.channels.entry(channel.to_string()).or_default().push(tx);
        Ok(rx)
    }

    async fn info_memory(&self) -> Result<MemoryInfo, AppError> {
        let mut used: u64 = 0;
        for entry in self.entries.iter() {
            used += entry.key().len() as u64;
            used += match &entry.value().value {
                Value::Str(s) => s.len() as u64,
                Value::List(items) => items.iter().map(|s| s.len() as u64).sum(),
                Value::ZSet(set) => set.iter().map(|(m, _)| m.len() as u64 + 8).sum(),
                Value::Hash(map) => map.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum(),
            };
        }
        Ok(MemoryInfo {
            used_memory: used,
            used_memory_human: human_bytes(used),
        })
    }
}
