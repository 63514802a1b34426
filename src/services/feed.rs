// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Feed engine: owns every read and write against the ephemeral store.
//!
//! Handles the core workflow:
//! 1. Publish quantity-only activities into the bounded tenant feed
//! 2. Maintain tier-TTL'd aggregate counters
//! 3. Compute real-time summaries and prioritized insights
//! 4. Manage anonymous/named leaderboards
//! 5. Repair keys that lost their expiry
//!
//! Privacy invariants live here: the k-anonymity threshold is checked before
//! any state mutation, and anonymous rankings never store anything resolvable
//! to a person.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{
    Activity, ActivityMetadata, ActivitySubtype, CleanupStats, Insight, NamedRankingEntry,
    PopularClass, RankingEntry, RankingPeriod, RankingSummary, RealtimeSummary,
};
use crate::store::keys::{self, TenantId, FEED_MAX_LEN, TTL_DAILY_SECS, TTL_REALTIME_SECS};
use crate::store::EphemeralStore;
use crate::time_utils::relative_label;

/// Minimum participant count before a participant-sensitive activity may be
/// published.
pub const K_ANONYMITY_THRESHOLD: i64 = 3;

/// Occupancy ratio at which a class fills enough to announce.
const OCCUPANCY_ALERT_RATIO: f64 = 0.80;

/// More simultaneous trainees than this counts as peak time.
const PEAK_TRAINING_COUNT: i64 = 20;

/// A class needs at least this many live check-ins to rank as popular.
const POPULAR_CLASS_MIN: i64 = 5;

/// Feeds shorter than this get backfilled with synthesized daily stats.
const BACKFILL_MIN_ITEMS: usize = 5;

const ANONYMOUS_RANKING_MAX: usize = 10;
const NAMED_RANKING_MAX: usize = 20;
const INSIGHTS_MAX: usize = 5;

/// Feed engine over the ephemeral store.
pub struct FeedEngine {
    store: Arc<dyn EphemeralStore>,
}

impl FeedEngine {
    pub fn new(store: Arc<dyn EphemeralStore>) -> Self {
        Self { store }
    }

    // ─── Publishing ──────────────────────────────────────────────

    /// Publish a real-time activity to a tenant's feed.
    ///
    /// Participant-sensitive subtypes below the k-anonymity threshold are
    /// rejected before any write, so a rejected call is fully
    /// side-effect-free and returns `None`.
    pub async fn publish_realtime_activity(
        &self,
        tenant: TenantId,
        subtype: ActivitySubtype,
        count: i64,
        metadata: &ActivityMetadata,
    ) -> Result<Option<Activity>> {
        if subtype.participant_sensitive() && count < K_ANONYMITY_THRESHOLD {
            tracing::debug!(
                tenant,
                subtype = subtype.as_str(),
                count,
                "Below k-anonymity threshold, not publishing"
            );
            return Ok(None);
        }

        self.store
            .set_ex(
                &keys::realtime(tenant, subtype.as_str()),
                &count.to_string(),
                TTL_REALTIME_SECS,
            )
            .await?;

        let activity = Activity::realtime(tenant, subtype, count, metadata);
        self.push_to_feed(tenant, &activity, TTL_DAILY_SECS).await?;

        tracing::info!(
            tenant,
            subtype = subtype.as_str(),
            count,
            "Published realtime activity"
        );
        Ok(Some(activity))
    }

    /// Direct feed append for a completed large class.
    ///
    /// Bypasses the k-anonymity check: a class-level participant total is
    /// already a published aggregate, not a per-person identity.
    pub async fn publish_class_completed(
        &self,
        tenant: TenantId,
        class_name: &str,
        participants: i64,
    ) -> Result<Activity> {
        let metadata = ActivityMetadata {
            class_name: Some(class_name.to_string()),
            ..Default::default()
        };
        let activity =
            Activity::realtime(tenant, ActivitySubtype::ClassCompleted, participants, &metadata);
        self.push_to_feed(tenant, &activity, TTL_DAILY_SECS).await?;
        Ok(activity)
    }

    /// Push an already-built entry, trim to the 100 most recent, refresh the
    /// list TTL, and broadcast to live subscribers.
    pub(crate) async fn push_to_feed(
        &self,
        tenant: TenantId,
        activity: &Activity,
        feed_ttl_secs: i64,
    ) -> Result<()> {
        let feed_key = keys::feed(tenant);
        let blob = serde_json::to_string(activity)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("activity encode: {}", e)))?;

        self.store.lpush(&feed_key, &blob).await?;
        self.store.ltrim(&feed_key, 0, FEED_MAX_LEN - 1).await?;
        self.store.expire(&feed_key, feed_ttl_secs).await?;
        self.store
            .publish(&keys::feed_channel(tenant), &blob)
            .await?;
        Ok(())
    }

    // ─── Aggregate counters ──────────────────────────────────────

    /// Atomically increment (by `value`) or set a daily counter.
    ///
    /// Incrementing resets the counter's TTL to 24 h so an active day never
    /// loses its totals mid-day.
    pub async fn update_aggregate_stats(
        &self,
        tenant: TenantId,
        stat_type: &str,
        value: f64,
        increment: bool,
    ) -> Result<f64> {
        let key = keys::daily(tenant, stat_type);
        if increment {
            let result = self.store.incr_by_float(&key, value).await?;
            self.store.expire(&key, TTL_DAILY_SECS).await?;
            Ok(result)
        } else {
            self.store
                .set_ex(&key, &value.to_string(), TTL_DAILY_SECS)
                .await?;
            Ok(value)
        }
    }

    // ─── Reads (degrade to empty on store failure) ───────────────

    /// Read a slice of the tenant feed, newest first, decorated with
    /// relative-time labels. Backfills with synthesized daily-stat entries
    /// when fewer than five real items exist.
    pub async fn get_feed(&self, tenant: TenantId, limit: usize, offset: usize) -> Vec<Activity> {
        if limit == 0 {
            // A stop index of offset - 1 would read the whole list
            return Vec::new();
        }
        let stop = offset as i64 + limit as i64 - 1;
        let blobs = match self.store.lrange(&keys::feed(tenant), offset as i64, stop).await {
            Ok(blobs) => blobs,
            Err(e) => {
                tracing::warn!(tenant, error = %e, "Feed read failed, returning empty");
                return Vec::new();
            }
        };

        let now = chrono::Utc::now();
        let mut items: Vec<Activity> = blobs
            .iter()
            .filter_map(|blob| match serde_json::from_str::<Activity>(blob) {
                Ok(mut activity) => {
                    activity.time_ago = Some(relative_label(&activity.timestamp, now));
                    Some(activity)
                }
                Err(e) => {
                    tracing::warn!(tenant, error = %e, "Skipping malformed feed entry");
                    None
                }
            })
            .collect();

        if items.len() < BACKFILL_MIN_ITEMS {
            items.extend(self.backfill_daily_stats(tenant).await);
        }
        items
    }

    /// Synthesize feed entries from today's counters so the feed is never
    /// empty while there is any same-day activity.
    async fn backfill_daily_stats(&self, tenant: TenantId) -> Vec<Activity> {
        let counter_keys = vec![
            keys::daily(tenant, "attendance"),
            keys::daily(tenant, "classes_completed"),
        ];
        let values = match self.store.mget(&counter_keys).await {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(tenant, error = %e, "Backfill read failed");
                return Vec::new();
            }
        };

        let mut extra = Vec::new();
        if let Some(n) = parse_count(values.first()) {
            if n > 0 {
                extra.push(Activity::daily_stat(
                    tenant,
                    "attendance",
                    n,
                    format!("{} asistencias hoy", n),
                    "📋",
                ));
            }
        }
        if let Some(n) = parse_count(values.get(1)) {
            if n > 0 {
                extra.push(Activity::daily_stat(
                    tenant,
                    "classes_completed",
                    n,
                    format!("{} clases completadas hoy", n),
                    "✅",
                ));
            }
        }
        extra
    }

    /// Real-time snapshot: total trainees, top-3 popular classes, peak flag.
    ///
    /// One KEYS scan plus one MGET round trip; the result may be a torn
    /// snapshot across keys, which is fine for approximate live data.
    pub async fn get_realtime_summary(&self, tenant: TenantId) -> RealtimeSummary {
        let key_list = match self.store.keys(&keys::realtime_pattern(tenant)).await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(tenant, error = %e, "Summary scan failed, returning default");
                return RealtimeSummary::default();
            }
        };
        if key_list.is_empty() {
            return RealtimeSummary::default();
        }

        let values = match self.store.mget(&key_list).await {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(tenant, error = %e, "Summary read failed, returning default");
                return RealtimeSummary::default();
            }
        };

        let mut training_now = 0i64;
        let mut classes: Vec<PopularClass> = Vec::new();
        let by_class_prefix = format!("tenant:{}:realtime:by_class:", tenant);

        for (key, value) in key_list.iter().zip(values.iter()) {
            let count = match parse_count(Some(value)) {
                Some(count) => count,
                None => continue,
            };
            if key.ends_with(":realtime:training_count") {
                training_now = count;
            } else if let Some(class_name) = key.strip_prefix(&by_class_prefix) {
                classes.push(PopularClass {
                    class_name: class_name.to_string(),
                    count,
                });
            }
        }

        classes.retain(|c| c.count >= POPULAR_CLASS_MIN);
        classes.sort_by(|a, b| b.count.cmp(&a.count));
        classes.truncate(3);

        RealtimeSummary {
            training_now,
            popular_classes: classes,
            peak_time: training_now > PEAK_TRAINING_COUNT,
        }
    }

    /// Generate up to five insights from a fixed rule table, sorted by
    /// priority (1 first).
    pub async fn generate_motivational_insights(&self, tenant: TenantId) -> Vec<Insight> {
        let counter_keys = vec![
            keys::realtime(tenant, "training_count"),
            keys::daily(tenant, "achievements"),
            keys::daily(tenant, "personal_records"),
            keys::daily(tenant, "active_streaks"),
            keys::daily(tenant, "total_hours"),
        ];
        let values = match self.store.mget(&counter_keys).await {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(tenant, error = %e, "Insight read failed, returning empty");
                return Vec::new();
            }
        };

        let counter = |i: usize| parse_count(values.get(i)).unwrap_or(0);
        let training = counter(0);
        let achievements = counter(1);
        let records = counter(2);
        let streaks = counter(3);
        let hours = counter(4);

        let mut insights = Vec::new();
        if training >= 10 {
            insights.push(Insight {
                category: "energy".to_string(),
                message: format!("¡{} personas entrenando ahora mismo!", training),
                icon: "💪".to_string(),
                priority: 1,
            });
        }
        if records >= 3 {
            insights.push(Insight {
                category: "records".to_string(),
                message: format!("¡{} récords personales superados hoy!", records),
                icon: "📈".to_string(),
                priority: 1,
            });
        }
        if achievements >= 5 {
            insights.push(Insight {
                category: "achievements".to_string(),
                message: format!("{} logros desbloqueados hoy", achievements),
                icon: "🏆".to_string(),
                priority: 2,
            });
        }
        if streaks >= 5 {
            insights.push(Insight {
                category: "streaks".to_string(),
                message: format!("{} rachas activas en el gimnasio", streaks),
                icon: "🔥".to_string(),
                priority: 2,
            });
        }
        if hours >= 50 {
            insights.push(Insight {
                category: "volume".to_string(),
                message: format!("{} horas de entrenamiento acumuladas hoy", hours),
                icon: "⏱️".to_string(),
                priority: 3,
            });
        }

        insights.sort_by_key(|i| i.priority);
        insights.truncate(INSIGHTS_MAX);
        insights
    }

    /// Announce a class filling up. Publishes only at ≥80% occupancy; the
    /// message embeds only the class name and the two integers.
    pub async fn update_class_occupancy(
        &self,
        tenant: TenantId,
        class_name: &str,
        current: i64,
        max: i64,
    ) -> Result<Option<Activity>> {
        if max <= 0 || (current as f64) / (max as f64) < OCCUPANCY_ALERT_RATIO {
            return Ok(None);
        }

        let metadata = ActivityMetadata {
            class_name: Some(class_name.to_string()),
            ..Default::default()
        };
        let mut activity =
            Activity::realtime(tenant, ActivitySubtype::ClassOccupancy, current, &metadata);
        activity.message = format!(
            "¡{} casi llena! {}/{} plazas ocupadas",
            class_name, current, max
        );
        self.push_to_feed(tenant, &activity, TTL_DAILY_SECS).await?;
        Ok(Some(activity))
    }

    // ─── Rankings ────────────────────────────────────────────────

    /// Replace a tenant's anonymous ranking: top 10 values under synthetic
    /// `anonymous_{i}` members. No identity anywhere.
    pub async fn add_anonymous_ranking(
        &self,
        tenant: TenantId,
        ranking_type: &str,
        values: &[f64],
        period: RankingPeriod,
    ) -> Result<RankingSummary> {
        let key = keys::ranking(tenant, period, ranking_type);
        self.store.del(&[key.clone()]).await?;

        let mut sorted: Vec<f64> = values.to_vec();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        sorted.truncate(ANONYMOUS_RANKING_MAX);

        let members: Vec<(String, f64)> = sorted
            .iter()
            .enumerate()
            .map(|(i, value)| (format!("anonymous_{}", i + 1), *value))
            .collect();

        if !members.is_empty() {
            self.store.zadd(&key, &members).await?;
            self.store.expire(&key, period.ttl_secs()).await?;
        }

        Ok(RankingSummary {
            ranking_type: ranking_type.to_string(),
            period,
            entries: members.len(),
        })
    }

    /// Replace a tenant's named ranking: top 20 entries under `pos_{i}`
    /// members, with name and user-reference side maps. All three keys share
    /// one TTL.
    pub async fn add_named_ranking(
        &self,
        tenant: TenantId,
        ranking_type: &str,
        entries: &[NamedRankingEntry],
        period: RankingPeriod,
    ) -> Result<RankingSummary> {
        let key = keys::ranking(tenant, period, ranking_type);
        let names_key = keys::ranking_names(tenant, period, ranking_type);
        let users_key = keys::ranking_users(tenant, period, ranking_type);
        self.store
            .del(&[key.clone(), names_key.clone(), users_key.clone()])
            .await?;

        let mut sorted: Vec<&NamedRankingEntry> = entries.iter().collect();
        sorted.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(std::cmp::Ordering::Equal));
        sorted.truncate(NAMED_RANKING_MAX);

        let mut members = Vec::with_capacity(sorted.len());
        let mut names = Vec::with_capacity(sorted.len());
        let mut users = Vec::new();
        for (i, entry) in sorted.iter().enumerate() {
            let member = format!("pos_{}", i + 1);
            members.push((member.clone(), entry.value));
            names.push((member.clone(), entry.name.clone()));
            if let Some(user_id) = entry.user_id {
                users.push((member, user_id.to_string()));
            }
        }

        if !members.is_empty() {
            self.store.zadd(&key, &members).await?;
            self.store.hset(&names_key, &names).await?;
            self.store.expire(&key, period.ttl_secs()).await?;
            self.store.expire(&names_key, period.ttl_secs()).await?;
            if !users.is_empty() {
                self.store.hset(&users_key, &users).await?;
                self.store.expire(&users_key, period.ttl_secs()).await?;
            }
        }

        Ok(RankingSummary {
            ranking_type: ranking_type.to_string(),
            period,
            entries: members.len(),
        })
    }

    /// Read a ranking descending, joining name/user-reference maps when they
    /// exist. Falls back to a positional label when no name is stored.
    pub async fn get_anonymous_rankings(
        &self,
        tenant: TenantId,
        ranking_type: &str,
        period: RankingPeriod,
        limit: usize,
    ) -> Vec<RankingEntry> {
        if limit == 0 {
            // A stop index of -1 would read the whole set
            return Vec::new();
        }
        let key = keys::ranking(tenant, period, ranking_type);
        let scored = match self
            .store
            .zrevrange_withscores(&key, 0, limit as i64 - 1)
            .await
        {
            Ok(scored) => scored,
            Err(e) => {
                tracing::warn!(tenant, ranking_type, error = %e, "Ranking read failed");
                return Vec::new();
            }
        };
        if scored.is_empty() {
            return Vec::new();
        }

        let names_key = keys::ranking_names(tenant, period, ranking_type);
        let users_key = keys::ranking_users(tenant, period, ranking_type);
        let names = self.store.hgetall(&names_key).await.unwrap_or_default();
        let users = self.store.hgetall(&users_key).await.unwrap_or_default();

        scored
            .into_iter()
            .enumerate()
            .map(|(i, (member, value))| {
                let position = i + 1;
                let name = names.get(&member).cloned();
                let user_id = users.get(&member).and_then(|v| v.parse().ok());
                let label = name
                    .clone()
                    .unwrap_or_else(|| format!("Posición {}", position));
                RankingEntry {
                    position,
                    value,
                    user_id,
                    name,
                    label,
                }
            })
            .collect()
    }

    // ─── Cleanup ─────────────────────────────────────────────────

    /// Scan a tenant's realtime/daily/feed keys and give a 24 h TTL to any
    /// key that reports no expiry. Keys that already expire are left
    /// untouched.
    pub async fn cleanup_expired_data(&self, tenant: TenantId) -> Result<CleanupStats> {
        let before = self.store.info_memory().await?;

        let mut scanned = Vec::new();
        for pattern in [
            keys::realtime_pattern(tenant),
            keys::daily_pattern(tenant),
            keys::feed_pattern(tenant),
        ] {
            scanned.extend(self.store.keys(&pattern).await?);
        }

        let mut repaired = 0;
        for key in &scanned {
            if self.store.ttl(key).await? == -1 {
                self.store.expire(key, TTL_DAILY_SECS).await?;
                repaired += 1;
            }
        }

        let after = self.store.info_memory().await?;
        let stats = CleanupStats {
            keys_scanned: scanned.len(),
            ttls_repaired: repaired,
            memory_before_bytes: before.used_memory,
            memory_after_bytes: after.used_memory,
            memory_after_human: after.used_memory_human,
        };

        tracing::info!(
            tenant,
            scanned = stats.keys_scanned,
            repaired = stats.ttls_repaired,
            memory = %stats.memory_after_human,
            "Cleanup pass complete"
        );
        Ok(stats)
    }
}

/// Parse a counter value, tolerating floats stored by INCRBYFLOAT.
fn parse_count(value: Option<&Option<String>>) -> Option<i64> {
    let s = value?.as_deref()?;
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
}
