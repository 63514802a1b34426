// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Aggregator: turns raw, frequent domain events into the coarser calls the
//! feed engine exposes.
//!
//! Counting and publishing are independently gated: every handler increments
//! its counters unconditionally, and only the decision to emit a feed entry
//! is rate-limited. A suppressed publish never loses a count.

use std::sync::Arc;

use crate::error::Result;
use crate::models::{
    Activity, ActivityMetadata, ActivitySubtype, BatchOutcome, DomainEvent, RankingPeriod,
};
use crate::services::directory::Directory;
use crate::services::feed::FeedEngine;
use crate::store::keys::{
    self, TenantId, TTL_DAILY_SECS, TTL_HOURLY_SECS, TTL_REALTIME_SECS, TTL_WEEKLY_SECS,
};
use crate::store::EphemeralStore;

/// Streak lengths that always publish. Everything else is a plain check-in
/// day and stays silent.
const STREAK_MILESTONES: &[u32] = &[7, 14, 21, 30, 60, 90, 180, 365];

/// A class publishes once it has this many live check-ins...
const CLASS_PUBLISH_MIN: i64 = 10;
/// ...and then only on every 5th.
const CLASS_PUBLISH_EVERY: i64 = 5;
const TOTAL_PUBLISH_EVERY: i64 = 5;
const ACHIEVEMENT_PUBLISH_EVERY: i64 = 3;
const PR_PUBLISH_EVERY: i64 = 3;
const GOAL_PUBLISH_EVERY: i64 = 5;

/// Completed classes at least this large get a direct feed entry.
const LARGE_CLASS_MIN: u32 = 15;

/// Per-tenant event aggregation over the feed engine.
pub struct Aggregator {
    store: Arc<dyn EphemeralStore>,
    feed: Arc<FeedEngine>,
    directory: Arc<dyn Directory>,
}

impl Aggregator {
    pub fn new(
        store: Arc<dyn EphemeralStore>,
        feed: Arc<FeedEngine>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        Self {
            store,
            feed,
            directory,
        }
    }

    /// Increment a counter and refresh its TTL, returning the new value.
    async fn bump(&self, key: &str, ttl_secs: i64) -> Result<i64> {
        let count = self.store.incr(key).await?;
        self.store.expire(key, ttl_secs).await?;
        Ok(count)
    }

    // ─── Event handlers ──────────────────────────────────────────

    /// Class check-in: bumps the per-class, total, and daily-attendance
    /// counters; publishes per-class at ≥10 on every 5th, and the total on
    /// every 5th.
    pub async fn on_class_checkin(&self, tenant: TenantId, class_name: &str) -> Result<()> {
        let class_count = self
            .bump(&keys::realtime_by_class(tenant, class_name), TTL_REALTIME_SECS)
            .await?;
        let total = self
            .bump(&keys::realtime(tenant, "training_count"), TTL_REALTIME_SECS)
            .await?;
        self.bump(&keys::daily(tenant, "attendance"), TTL_DAILY_SECS)
            .await?;

        if class_count >= CLASS_PUBLISH_MIN && class_count % CLASS_PUBLISH_EVERY == 0 {
            let metadata = ActivityMetadata {
                class_name: Some(class_name.to_string()),
                ..Default::default()
            };
            self.feed
                .publish_realtime_activity(tenant, ActivitySubtype::ClassCheckin, class_count, &metadata)
                .await?;
        }
        if total % TOTAL_PUBLISH_EVERY == 0 {
            self.feed
                .publish_realtime_activity(
                    tenant,
                    ActivitySubtype::TrainingCount,
                    total,
                    &ActivityMetadata::default(),
                )
                .await?;
        }
        Ok(())
    }

    /// Achievement unlocked: bumps the daily and per-type counters;
    /// publishes every 3rd.
    pub async fn on_achievement_unlocked(
        &self,
        tenant: TenantId,
        achievement_type: &str,
    ) -> Result<()> {
        let count = self
            .bump(&keys::daily(tenant, "achievements"), TTL_DAILY_SECS)
            .await?;
        self.bump(
            &keys::daily(tenant, &format!("achievements:{}", achievement_type)),
            TTL_DAILY_SECS,
        )
        .await?;

        if count % ACHIEVEMENT_PUBLISH_EVERY == 0 {
            self.feed
                .publish_realtime_activity(
                    tenant,
                    ActivitySubtype::AchievementUnlocked,
                    count,
                    &ActivityMetadata::default(),
                )
                .await?;
        }
        Ok(())
    }

    /// Streak milestone: no-ops unless the length is an enumerated
    /// milestone; milestones always publish.
    pub async fn on_streak_milestone(&self, tenant: TenantId, streak_days: u32) -> Result<()> {
        if !STREAK_MILESTONES.contains(&streak_days) {
            return Ok(());
        }

        let milestone_count = self
            .bump(
                &keys::weekly(tenant, &format!("streak_milestone:{}", streak_days)),
                TTL_WEEKLY_SECS,
            )
            .await?;
        self.bump(&keys::daily(tenant, "active_streaks"), TTL_DAILY_SECS)
            .await?;

        let metadata = ActivityMetadata {
            streak_days: Some(streak_days),
            ..Default::default()
        };
        self.feed
            .publish_realtime_activity(
                tenant,
                ActivitySubtype::StreakMilestone,
                milestone_count,
                &metadata,
            )
            .await?;
        Ok(())
    }

    /// Personal record: bumps the daily counter; publishes every 3rd.
    pub async fn on_personal_record(&self, tenant: TenantId) -> Result<()> {
        let count = self
            .bump(&keys::daily(tenant, "personal_records"), TTL_DAILY_SECS)
            .await?;
        if count % PR_PUBLISH_EVERY == 0 {
            self.feed
                .publish_realtime_activity(
                    tenant,
                    ActivitySubtype::PrBroken,
                    count,
                    &ActivityMetadata::default(),
                )
                .await?;
        }
        Ok(())
    }

    /// Goal completed: bumps the daily counter; publishes every 5th.
    pub async fn on_goal_completed(&self, tenant: TenantId) -> Result<()> {
        let count = self
            .bump(&keys::daily(tenant, "goals_completed"), TTL_DAILY_SECS)
            .await?;
        if count % GOAL_PUBLISH_EVERY == 0 {
            self.feed
                .publish_realtime_activity(
                    tenant,
                    ActivitySubtype::GoalCompleted,
                    count,
                    &ActivityMetadata::default(),
                )
                .await?;
        }
        Ok(())
    }

    /// Class completed: bumps the classes-completed counter and the
    /// approximate total-hours float; classes of ≥15 get a direct feed
    /// entry (class-level totals are already aggregates, no k-check).
    pub async fn on_class_completed(
        &self,
        tenant: TenantId,
        class_name: &str,
        participants: u32,
        duration_minutes: u32,
    ) -> Result<()> {
        self.bump(&keys::daily(tenant, "classes_completed"), TTL_DAILY_SECS)
            .await?;

        let hours = participants as f64 * duration_minutes as f64 / 60.0;
        let hours_key = keys::daily(tenant, "total_hours");
        self.store.incr_by_float(&hours_key, hours).await?;
        self.store.expire(&hours_key, TTL_DAILY_SECS).await?;

        if participants >= LARGE_CLASS_MIN {
            self.feed
                .publish_class_completed(tenant, class_name, participants as i64)
                .await?;
        }
        Ok(())
    }

    /// Dispatch a batch of events. A failing event is logged and counted,
    /// never aborts the batch.
    pub async fn process_batch(&self, events: &[DomainEvent]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for event in events {
            let result = match event {
                DomainEvent::ClassCheckin {
                    tenant_id,
                    class_name,
                } => self.on_class_checkin(*tenant_id, class_name).await,
                DomainEvent::AchievementUnlocked {
                    tenant_id,
                    achievement_type,
                } => {
                    self.on_achievement_unlocked(*tenant_id, achievement_type)
                        .await
                }
                DomainEvent::StreakMilestone {
                    tenant_id,
                    streak_days,
                } => self.on_streak_milestone(*tenant_id, *streak_days).await,
                DomainEvent::PersonalRecord { tenant_id } => {
                    self.on_personal_record(*tenant_id).await
                }
                DomainEvent::GoalCompleted { tenant_id } => {
                    self.on_goal_completed(*tenant_id).await
                }
                DomainEvent::ClassCompleted {
                    tenant_id,
                    class_name,
                    participants,
                    duration_minutes,
                } => {
                    self.on_class_completed(*tenant_id, class_name, *participants, *duration_minutes)
                        .await
                }
            };

            match result {
                Ok(()) => outcome.processed += 1,
                Err(e) => {
                    outcome.failed += 1;
                    tracing::error!(
                        tenant = event.tenant_id(),
                        kind = event.kind(),
                        error = %e,
                        "Event handling failed, continuing batch"
                    );
                }
            }
        }
        outcome
    }

    // ─── Scheduled work ──────────────────────────────────────────

    /// Hourly recap: up to three templated messages gated by fixed minimums,
    /// pushed with a 1-hour feed TTL for the batch. Returns how many were
    /// pushed.
    pub async fn calculate_hourly_summary(&self, tenant: TenantId) -> Result<usize> {
        let counter_keys = vec![
            keys::daily(tenant, "attendance"),
            keys::daily(tenant, "personal_records"),
            keys::daily(tenant, "goals_completed"),
            keys::daily(tenant, "total_hours"),
        ];
        let values = self.store.mget(&counter_keys).await?;
        let counter = |i: usize| -> i64 {
            values
                .get(i)
                .and_then(|v| v.as_deref())
                .and_then(|s| s.parse::<f64>().ok())
                .map(|f| f as i64)
                .unwrap_or(0)
        };

        let attendance = counter(0);
        let records = counter(1);
        let goals = counter(2);
        let hours = counter(3);

        let mut messages: Vec<(&str, String, &str)> = Vec::new();
        if attendance > 50 {
            messages.push((
                "hourly_attendance",
                format!("¡Gran día! {} visitas al gimnasio hoy", attendance),
                "🚀",
            ));
        }
        if records > 10 {
            messages.push((
                "hourly_records",
                format!("{} récords personales nuevos hoy", records),
                "📈",
            ));
        }
        if goals > 5 {
            messages.push((
                "hourly_goals",
                format!("{} objetivos cumplidos hoy", goals),
                "🎯",
            ));
        }
        if hours > 100 {
            messages.push((
                "hourly_hours",
                format!("{} horas de entrenamiento hoy", hours),
                "⏱️",
            ));
        }
        messages.truncate(3);

        for (stat, message, icon) in &messages {
            let mut activity = Activity::daily_stat(tenant, stat, 0, message.clone(), icon);
            activity.kind = "hourly_stat".to_string();
            activity.ttl_minutes = 60;
            self.feed
                .push_to_feed(tenant, &activity, TTL_HOURLY_SECS)
                .await?;
        }

        tracing::debug!(tenant, pushed = messages.len(), "Hourly summary");
        Ok(messages.len())
    }

    /// Republish today's rankings from the authoritative source, stripped of
    /// all identity. This is the subsystem's only window onto relational
    /// data; nothing personal may cross into the ephemeral store here.
    pub async fn update_daily_rankings(&self, tenant: TenantId) -> Result<()> {
        let attendance = self.directory.daily_attendance(tenant).await?;
        let values: Vec<f64> = attendance.iter().map(|row| row.value).collect();
        self.feed
            .add_anonymous_ranking(tenant, "attendance", &values, RankingPeriod::Daily)
            .await?;

        let streaks = self.directory.daily_streaks(tenant).await?;
        let values: Vec<f64> = streaks.iter().map(|row| row.value).collect();
        self.feed
            .add_anonymous_ranking(tenant, "streaks", &values, RankingPeriod::Daily)
            .await?;

        tracing::info!(tenant, "Daily rankings republished (anonymized)");
        Ok(())
    }

    /// Occasional ambient hype: a peak-time entry when the gym is packed,
    /// and a group-training entry when ≥3 classes each have ≥5 people.
    pub async fn generate_motivational_burst(&self, tenant: TenantId) -> Result<()> {
        let summary = self.feed.get_realtime_summary(tenant).await;

        if summary.peak_time {
            self.feed
                .publish_realtime_activity(
                    tenant,
                    ActivitySubtype::PeakTime,
                    summary.training_now,
                    &ActivityMetadata::default(),
                )
                .await?;
        }

        let busy_classes = self.count_busy_classes(tenant).await?;
        if busy_classes >= 3 {
            self.feed
                .publish_realtime_activity(
                    tenant,
                    ActivitySubtype::GroupTraining,
                    busy_classes,
                    &ActivityMetadata::default(),
                )
                .await?;
        }
        Ok(())
    }

    /// Classes with ≥5 concurrent participants right now (unlike the
    /// summary's popular list, this is not capped at 3).
    async fn count_busy_classes(&self, tenant: TenantId) -> Result<i64> {
        let pattern = format!("tenant:{}:realtime:by_class:*", tenant);
        let class_keys = self.store.keys(&pattern).await?;
        if class_keys.is_empty() {
            return Ok(0);
        }
        let values = self.store.mget(&class_keys).await?;
        Ok(values
            .iter()
            .flatten()
            .filter_map(|s| s.parse::<i64>().ok())
            .filter(|n| *n >= 5)
            .count() as i64)
    }

    /// Re-seed the real-time counters from the authoritative source and
    /// republish the total through the k-gated publish path.
    ///
    /// The counter rewrite is unconditional: a total that drops below the
    /// publish threshold still replaces the stale value, only the feed
    /// entry is suppressed.
    pub async fn refresh_realtime_counts(&self, tenant: TenantId) -> Result<()> {
        let checkins = self.directory.current_checkins(tenant).await?;

        let mut total = 0i64;
        for class in &checkins {
            self.store
                .set_ex(
                    &keys::realtime_by_class(tenant, &class.class_name),
                    &class.count.to_string(),
                    TTL_REALTIME_SECS,
                )
                .await?;
            total += class.count;
        }

        self.store
            .set_ex(
                &keys::realtime(tenant, "training_count"),
                &total.to_string(),
                TTL_REALTIME_SECS,
            )
            .await?;

        self.feed
            .publish_realtime_activity(
                tenant,
                ActivitySubtype::TrainingCount,
                total,
                &ActivityMetadata::default(),
            )
            .await?;
        Ok(())
    }
}
