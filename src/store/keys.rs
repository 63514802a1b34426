// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tenant-scoped key builders and TTL tiers.
//!
//! Every key in the ephemeral store embeds the tenant id; nothing in this
//! module can produce a key without one, which is how tenant isolation is
//! enforced at the type level rather than by convention.

use crate::models::RankingPeriod;

/// Tenant identifier (one gym/organization).
pub type TenantId = u64;

// TTL tiers (seconds)
pub const TTL_REALTIME_SECS: i64 = 300;
pub const TTL_HOURLY_SECS: i64 = 3_600;
pub const TTL_DAILY_SECS: i64 = 86_400;
pub const TTL_WEEKLY_SECS: i64 = 604_800;

/// Maximum entries kept in a tenant's feed list.
pub const FEED_MAX_LEN: i64 = 100;

fn prefix(tenant: TenantId) -> String {
    format!("tenant:{}", tenant)
}

/// `tenant:{id}:realtime:{subtype}` — rolling real-time counter, TTL 300 s.
pub fn realtime(tenant: TenantId, subtype: &str) -> String {
    format!("{}:realtime:{}", prefix(tenant), subtype)
}

/// `tenant:{id}:realtime:by_class:{class}` — per-class check-in counter.
pub fn realtime_by_class(tenant: TenantId, class_name: &str) -> String {
    format!("{}:realtime:by_class:{}", prefix(tenant), class_name)
}

/// `tenant:{id}:daily:{stat}` — daily aggregate counter, TTL 24 h.
pub fn daily(tenant: TenantId, stat: &str) -> String {
    format!("{}:daily:{}", prefix(tenant), stat)
}

/// `tenant:{id}:weekly:{stat}` — weekly counter (streak milestones), TTL 7 d.
pub fn weekly(tenant: TenantId, stat: &str) -> String {
    format!("{}:weekly:{}", prefix(tenant), stat)
}

/// `tenant:{id}:feed:activities` — bounded activity list, TTL 24 h.
pub fn feed(tenant: TenantId) -> String {
    format!("{}:feed:activities", prefix(tenant))
}

/// `tenant:{id}:feed:updates` — pub/sub channel for live subscribers.
pub fn feed_channel(tenant: TenantId) -> String {
    format!("{}:feed:updates", prefix(tenant))
}

/// `tenant:{id}:rankings:{period}:{type}` — sorted ranking structure.
pub fn ranking(tenant: TenantId, period: RankingPeriod, ranking_type: &str) -> String {
    format!(
        "{}:rankings:{}:{}",
        prefix(tenant),
        period.as_str(),
        ranking_type
    )
}

/// Name side-map for a named ranking (shares the ranking's TTL).
pub fn ranking_names(tenant: TenantId, period: RankingPeriod, ranking_type: &str) -> String {
    format!("{}:names", ranking(tenant, period, ranking_type))
}

/// User-reference side-map for a named ranking (shares the ranking's TTL).
pub fn ranking_users(tenant: TenantId, period: RankingPeriod, ranking_type: &str) -> String {
    format!("{}:users", ranking(tenant, period, ranking_type))
}

/// Scan pattern over a tenant's real-time keys.
pub fn realtime_pattern(tenant: TenantId) -> String {
    format!("{}:realtime:*", prefix(tenant))
}

/// Scan pattern over a tenant's daily keys.
pub fn daily_pattern(tenant: TenantId) -> String {
    format!("{}:daily:*", prefix(tenant))
}

/// Scan pattern over a tenant's feed keys.
pub fn feed_pattern(tenant: TenantId) -> String {
    format!("{}:feed:*", prefix(tenant))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_embeds_tenant() {
        let keys = [
            realtime(7, "training_count"),
            realtime_by_class(7, "Spinning"),
            daily(7, "attendance"),
            weekly(7, "streak_milestone:30"),
            feed(7),
            feed_channel(7),
            ranking(7, RankingPeriod::Daily, "attendance"),
            ranking_names(7, RankingPeriod::Daily, "attendance"),
            ranking_users(7, RankingPeriod::Daily, "attendance"),
        ];
        for key in keys {
            assert!(key.starts_with("tenant:7:"), "unscoped key: {}", key);
        }
    }

    #[test]
    fn test_ranking_key_layout() {
        assert_eq!(
            ranking(2, RankingPeriod::Weekly, "streaks"),
            "tenant:2:rankings:weekly:streaks"
        );
        assert_eq!(
            ranking_names(2, RankingPeriod::Daily, "attendance"),
            "tenant:2:rankings:daily:attendance:names"
        );
    }

    #[test]
    fn test_tenants_never_share_keys() {
        assert_ne!(feed(1), feed(2));
        assert_ne!(daily(1, "attendance"), daily(2, "attendance"));
    }
}
