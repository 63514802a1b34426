// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Motivational insights generated from aggregate counters.

use serde::Serialize;

/// One prioritized insight (priority 1 is most prominent).
#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    pub category: String,
    pub message: String,
    pub icon: String,
    pub priority: u8,
}
