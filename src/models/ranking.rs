// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Leaderboard types.
//!
//! Two storage modes share one numeric sorted structure: anonymous rankings
//! carry nothing resolvable to a person; named rankings keep the name and
//! user-reference side maps in separate keys that share the ranking's TTL.

use serde::{Deserialize, Serialize};

use crate::store::keys::{TTL_DAILY_SECS, TTL_WEEKLY_SECS};

/// TTL tier for a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingPeriod {
    Daily,
    Weekly,
}

impl RankingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        match self {
            Self::Daily => TTL_DAILY_SECS,
            Self::Weekly => TTL_WEEKLY_SECS,
        }
    }
}

impl std::str::FromStr for RankingPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            other => Err(format!("unknown ranking period: {}", other)),
        }
    }
}

/// Input row for a named ranking (identity stays in side maps, never in the
/// sorted structure itself).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedRankingEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    pub name: String,
    pub value: f64,
}

/// One leaderboard position as read back by clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub position: usize,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub label: String,
}

/// Result of writing a ranking.
#[derive(Debug, Clone, Serialize)]
pub struct RankingSummary {
    pub ranking_type: String,
    pub period: RankingPeriod,
    pub entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_ttls() {
        assert_eq!(RankingPeriod::Daily.ttl_secs(), 86_400);
        assert_eq!(RankingPeriod::Weekly.ttl_secs(), 604_800);
    }

    #[test]
    fn test_anonymous_entry_serializes_without_identity() {
        let entry = RankingEntry {
            position: 1,
            value: 12.0,
            user_id: None,
            name: None,
            label: "Posición 1".to_string(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("name"));
        assert!(!json.contains("user_id"));
    }
}
