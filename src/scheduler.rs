// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Six timed jobs driving the aggregator and feed engine for every active
//! tenant.
//!
//! Each job id is non-reentrant: a trigger that fires while the previous run
//! of the same job is still executing is skipped, never queued. Different
//! jobs may run concurrently. Within one run, tenants are processed
//! sequentially and a per-tenant failure is contained to that tenant.
//!
//! The guard is process-local; this scheduler is correct for a single
//! instance only.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::services::directory::Directory;
use crate::services::{Aggregator, FeedEngine};
use crate::store::keys::{self, TenantId};
use crate::store::EphemeralStore;

/// Memory level above which the cleanup job logs a warning.
const MEMORY_WARN_BYTES: u64 = 100 * 1024 * 1024;

const JOB_COUNT: usize = 6;

/// The six scheduled jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    RealtimeUpdate,
    HourlySummary,
    DailyRankings,
    ResetDaily,
    MotivationalBurst,
    Cleanup,
}

/// Trigger cadence for a job.
enum Trigger {
    Every(Duration),
    Cron(&'static str),
}

impl JobKind {
    pub const ALL: [JobKind; JOB_COUNT] = [
        JobKind::RealtimeUpdate,
        JobKind::HourlySummary,
        JobKind::DailyRankings,
        JobKind::ResetDaily,
        JobKind::MotivationalBurst,
        JobKind::Cleanup,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::RealtimeUpdate => "realtime-update",
            Self::HourlySummary => "hourly-summary",
            Self::DailyRankings => "daily-rankings",
            Self::ResetDaily => "reset-daily",
            Self::MotivationalBurst => "motivational-burst",
            Self::Cleanup => "cleanup",
        }
    }

    fn trigger(&self) -> Trigger {
        match self {
            // Fixed-period jobs
            Self::RealtimeUpdate => Trigger::Every(Duration::from_secs(300)),
            Self::MotivationalBurst => Trigger::Every(Duration::from_secs(1800)),
            Self::Cleanup => Trigger::Every(Duration::from_secs(7200)),
            // Clock-aligned jobs (sec min hour dom mon dow)
            Self::HourlySummary => Trigger::Cron("0 0 * * * *"),
            Self::DailyRankings => Trigger::Cron("0 50 23 * * *"),
            Self::ResetDaily => Trigger::Cron("0 5 0 * * *"),
        }
    }
}

/// Result of one job run: how many tenants succeeded and failed.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job: &'static str,
    pub ok: usize,
    pub failed: usize,
}

/// Interval/cron scheduler over all active tenants.
pub struct Scheduler {
    store: Arc<dyn EphemeralStore>,
    feed: Arc<FeedEngine>,
    aggregator: Arc<Aggregator>,
    directory: Arc<dyn Directory>,
    in_flight: [AtomicBool; JOB_COUNT],
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn EphemeralStore>,
        feed: Arc<FeedEngine>,
        aggregator: Arc<Aggregator>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        Self {
            store,
            feed,
            aggregator,
            directory,
            in_flight: [(); JOB_COUNT].map(|_| AtomicBool::new(false)),
        }
    }

    /// Spawn the trigger loop for every job. Handles run until aborted.
    pub fn spawn(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        JobKind::ALL
            .iter()
            .map(|kind| {
                let scheduler = Arc::clone(self);
                let kind = *kind;
                tokio::spawn(async move { scheduler.trigger_loop(kind).await })
            })
            .collect()
    }

    async fn trigger_loop(&self, kind: JobKind) {
        match kind.trigger() {
            Trigger::Every(period) => {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                // The first tick fires immediately; jobs start one period in.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    self.try_run(kind).await;
                }
            }
            Trigger::Cron(expr) => {
                let schedule = match Schedule::from_str(expr) {
                    Ok(schedule) => schedule,
                    Err(e) => {
                        tracing::error!(job = kind.id(), error = %e, "Invalid cron expression");
                        return;
                    }
                };
                loop {
                    let Some(next) = schedule.upcoming(Utc).next() else {
                        return;
                    };
                    let until = (next - Utc::now())
                        .to_std()
                        .unwrap_or(Duration::from_secs(1));
                    tokio::time::sleep(until).await;
                    self.try_run(kind).await;
                }
            }
        }
    }

    /// Run a job unless its previous run is still executing, in which case
    /// the trigger is skipped (never queued) and `None` is returned.
    pub async fn try_run(&self, kind: JobKind) -> Option<JobOutcome> {
        let slot = &self.in_flight[Self::slot(kind)];
        if slot
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(job = kind.id(), "Previous run still executing, skipping trigger");
            return None;
        }

        let outcome = self.run(kind).await;
        slot.store(false, Ordering::SeqCst);
        Some(outcome)
    }

    fn slot(kind: JobKind) -> usize {
        JobKind::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or_default()
    }

    /// One run: iterate active tenants sequentially, containing failures to
    /// the tenant that raised them.
    async fn run(&self, kind: JobKind) -> JobOutcome {
        let mut outcome = JobOutcome {
            job: kind.id(),
            ok: 0,
            failed: 0,
        };

        let tenants = match self.directory.active_tenants().await {
            Ok(tenants) => tenants,
            Err(e) => {
                tracing::error!(job = kind.id(), error = %e, "Could not list active tenants");
                return outcome;
            }
        };

        for tenant in tenants {
            match self.run_for_tenant(kind, tenant).await {
                Ok(()) => outcome.ok += 1,
                Err(e) => {
                    outcome.failed += 1;
                    tracing::error!(
                        job = kind.id(),
                        tenant,
                        error = %e,
                        "Job failed for tenant, continuing"
                    );
                }
            }
        }

        if kind == JobKind::Cleanup {
            self.report_memory().await;
        }

        tracing::info!(
            job = kind.id(),
            ok = outcome.ok,
            failed = outcome.failed,
            "Job run complete"
        );
        outcome
    }

    async fn run_for_tenant(&self, kind: JobKind, tenant: TenantId) -> Result<()> {
        match kind {
            JobKind::RealtimeUpdate => self.aggregator.refresh_realtime_counts(tenant).await,
            JobKind::HourlySummary => {
                self.aggregator.calculate_hourly_summary(tenant).await?;
                Ok(())
            }
            JobKind::DailyRankings => self.aggregator.update_daily_rankings(tenant).await,
            JobKind::ResetDaily => self.reset_daily(tenant).await,
            JobKind::MotivationalBurst => self.aggregator.generate_motivational_burst(tenant).await,
            JobKind::Cleanup => {
                self.feed.cleanup_expired_data(tenant).await?;
                Ok(())
            }
        }
    }

    /// Delete all of a tenant's `daily:*` keys. Ranking keys keep their own
    /// TTL and are never touched here.
    async fn reset_daily(&self, tenant: TenantId) -> Result<()> {
        let daily_keys: Vec<String> = self
            .store
            .keys(&keys::daily_pattern(tenant))
            .await?
            .into_iter()
            .filter(|key| !key.contains(":rankings:"))
            .collect();

        if !daily_keys.is_empty() {
            let removed = self.store.del(&daily_keys).await?;
            tracing::info!(tenant, removed, "Daily counters reset");
        }
        Ok(())
    }

    async fn report_memory(&self) {
        match self.store.info_memory().await {
            Ok(info) => {
                if info.used_memory > MEMORY_WARN_BYTES {
                    tracing::warn!(
                        used_memory = info.used_memory,
                        human = %info.used_memory_human,
                        "Store memory above 100 MB"
                    );
                } else {
                    tracing::info!(
                        used_memory = info.used_memory,
                        human = %info.used_memory_human,
                        "Store memory usage"
                    );
                }
            }
            Err(e) => tracing::warn!(error = %e, "Could not read store memory info"),
        }
    }
}
