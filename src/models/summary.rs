// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Real-time summary and cleanup report types.

use serde::Serialize;

/// One of the busiest classes right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopularClass {
    pub class_name: String,
    pub count: i64,
}

/// Snapshot of a tenant's live activity.
///
/// Assembled from a single batch read; may reflect a torn snapshot across
/// keys, which is acceptable for approximate short-lived data.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RealtimeSummary {
    /// Total people training right now
    pub training_now: i64,
    /// Top classes by live check-ins (at most 3, each with ≥5 people)
    pub popular_classes: Vec<PopularClass>,
    /// More than 20 people training at once
    pub peak_time: bool,
}

/// Report from a cleanup pass over one tenant's keyspace.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupStats {
    pub keys_scanned: usize,
    /// Keys found without an expiry and given a 24 h TTL
    pub ttls_repaired: usize,
    pub memory_before_bytes: u64,
    pub memory_after_bytes: u64,
    pub memory_after_human: String,
}
