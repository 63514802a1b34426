// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduler non-reentrancy and failure containment.

mod common;
use common::{engine_with_directory, FakeDirectory};

use std::sync::Arc;
use std::time::Duration;

use gympulse::models::RankingPeriod;
use gympulse::scheduler::{JobKind, Scheduler};
use gympulse::services::directory::{Directory, MemberScore};
use gympulse::store::keys;
use gympulse::store::{EphemeralStore, MemoryStore};

fn scheduler_with(
    directory: Arc<dyn Directory>,
) -> (Arc<MemoryStore>, Arc<gympulse::services::FeedEngine>, Arc<Scheduler>) {
    let (store, feed, aggregator) = engine_with_directory(directory.clone());
    let dyn_store: Arc<dyn EphemeralStore> = store.clone();
    let scheduler = Arc::new(Scheduler::new(dyn_store, feed.clone(), aggregator, directory));
    (store, feed, scheduler)
}

#[tokio::test]
async fn test_overlapping_trigger_is_skipped_not_queued() {
    let directory = Arc::new(FakeDirectory {
        tenants: vec![1],
        tenant_list_delay: Some(Duration::from_millis(300)),
        ..Default::default()
    });
    let (_store, _feed, scheduler) = scheduler_with(directory);

    let first = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.try_run(JobKind::HourlySummary).await })
    };
    // Let the first run take its slot, then fire the same job again
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = scheduler.try_run(JobKind::HourlySummary).await;
    assert!(second.is_none(), "overlapping trigger must be skipped");

    let first = first.await.unwrap();
    assert!(first.is_some(), "original run must complete");

    // Once the first run finishes, the slot frees up again
    let third = scheduler.try_run(JobKind::HourlySummary).await;
    assert!(third.is_some());
}

#[tokio::test]
async fn test_different_jobs_may_run_concurrently() {
    let directory = Arc::new(FakeDirectory {
        tenants: vec![1],
        tenant_list_delay: Some(Duration::from_millis(300)),
        ..Default::default()
    });
    let (_store, _feed, scheduler) = scheduler_with(directory);

    let cleanup = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.try_run(JobKind::Cleanup).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    // A different job id is not blocked by the running cleanup
    let burst = scheduler.try_run(JobKind::MotivationalBurst).await;
    assert!(burst.is_some());

    assert!(cleanup.await.unwrap().is_some());
}

#[tokio::test]
async fn test_reset_daily_clears_counters_but_not_rankings() {
    let directory = Arc::new(FakeDirectory::with_tenants(vec![1]));
    let (store, feed, scheduler) = scheduler_with(directory);

    store.set_ex(&keys::daily(1, "attendance"), "40", 86_400).await.unwrap();
    store.set_ex(&keys::daily(1, "personal_records"), "3", 86_400).await.unwrap();
    feed.add_anonymous_ranking(1, "attendance", &[7.0, 5.0], RankingPeriod::Daily)
        .await
        .unwrap();

    let outcome = scheduler.try_run(JobKind::ResetDaily).await.unwrap();
    assert_eq!(outcome.ok, 1);

    assert!(store.get(&keys::daily(1, "attendance")).await.unwrap().is_none());
    assert!(store.get(&keys::daily(1, "personal_records")).await.unwrap().is_none());

    let rankings = feed
        .get_anonymous_rankings(1, "attendance", RankingPeriod::Daily, 10)
        .await;
    assert_eq!(rankings.len(), 2, "rankings keep their own TTL");
}

#[tokio::test]
async fn test_tenant_failure_does_not_stop_other_tenants() {
    let directory = Arc::new(FakeDirectory {
        tenants: vec![1, 2],
        fail_for: Some(1),
        attendance: vec![MemberScore {
            user_id: 10,
            name: "Ana".to_string(),
            value: 12.0,
        }],
        ..Default::default()
    });
    let (_store, feed, scheduler) = scheduler_with(directory);

    let outcome = scheduler.try_run(JobKind::DailyRankings).await.unwrap();
    assert_eq!(outcome.ok, 1);
    assert_eq!(outcome.failed, 1);

    // Tenant 2 was still processed
    let entries = feed
        .get_anonymous_rankings(2, "attendance", RankingPeriod::Daily, 10)
        .await;
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_cleanup_job_runs_per_tenant() {
    let directory = Arc::new(FakeDirectory::with_tenants(vec![1, 2]));
    let (store, _feed, scheduler) = scheduler_with(directory);

    store.incr(&keys::daily(1, "attendance")).await.unwrap();
    store.incr(&keys::daily(2, "attendance")).await.unwrap();

    let outcome = scheduler.try_run(JobKind::Cleanup).await.unwrap();
    assert_eq!(outcome.ok, 2);

    for tenant in [1, 2] {
        let ttl = store.ttl(&keys::daily(tenant, "attendance")).await.unwrap();
        assert!(ttl > 0, "tenant {} key should have been repaired", tenant);
    }
}

#[test]
fn test_job_ids_are_stable() {
    let ids: Vec<&str> = JobKind::ALL.iter().map(|k| k.id()).collect();
    assert_eq!(
        ids,
        vec![
            "realtime-update",
            "hourly-summary",
            "daily-rankings",
            "reset-daily",
            "motivational-burst",
            "cleanup",
        ]
    );
}
