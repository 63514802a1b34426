// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Feed engine behavior over the in-memory store.

mod common;
use common::feed_engine;

use gympulse::models::{ActivityMetadata, ActivitySubtype};
use gympulse::store::keys;
use gympulse::store::EphemeralStore;

#[tokio::test]
async fn test_below_threshold_publish_is_side_effect_free() {
    let (store, feed) = feed_engine();

    for subtype in [ActivitySubtype::TrainingCount, ActivitySubtype::ClassCheckin] {
        for count in 0..3 {
            let result = feed
                .publish_realtime_activity(1, subtype, count, &ActivityMetadata::default())
                .await
                .expect("publish should not error");
            assert!(result.is_none(), "{:?} count={} published", subtype, count);
        }
    }

    // Zero store writes of any kind
    let all_keys = store.keys("*").await.unwrap();
    assert!(all_keys.is_empty(), "unexpected keys: {:?}", all_keys);
}

#[tokio::test]
async fn test_publish_training_count_is_readable_immediately() {
    let (store, feed) = feed_engine();

    let activity = feed
        .publish_realtime_activity(1, ActivitySubtype::TrainingCount, 15, &Default::default())
        .await
        .unwrap()
        .expect("count 15 should publish");

    assert_eq!(activity.message, "15 personas entrenando ahora");
    assert_eq!(activity.icon, "💪");

    let items = feed.get_feed(1, 20, 0).await;
    assert_eq!(items[0].id, activity.id);
    assert_eq!(items[0].message, "15 personas entrenando ahora");
    assert!(items[0].time_ago.is_some());

    // Counter mirrors the published count with a realtime TTL
    let counter = store.get(&keys::realtime(1, "training_count")).await.unwrap();
    assert_eq!(counter.as_deref(), Some("15"));
    let ttl = store.ttl(&keys::realtime(1, "training_count")).await.unwrap();
    assert!(ttl > 0 && ttl <= 300);
}

#[tokio::test]
async fn test_feed_is_bounded_to_100_most_recent() {
    let (_store, feed) = feed_engine();

    for i in 0..150i64 {
        feed.publish_realtime_activity(
            7,
            ActivitySubtype::TrainingCount,
            1000 + i,
            &Default::default(),
        )
        .await
        .unwrap()
        .expect("should publish");
    }

    let items = feed.get_feed(7, 200, 0).await;
    assert_eq!(items.len(), 100);
    // Head-first: newest entry at position 0
    assert_eq!(items[0].count, 1149);
    // The oldest surviving entry is the 50th push
    assert_eq!(items[99].count, 1050);
}

#[tokio::test]
async fn test_feed_limit_zero_returns_nothing() {
    let (_store, feed) = feed_engine();

    for i in 0..6i64 {
        feed.publish_realtime_activity(7, ActivitySubtype::TrainingCount, 10 + i, &Default::default())
            .await
            .unwrap();
    }

    // limit=0 must not fall through to a whole-list range read
    assert!(feed.get_feed(7, 0, 0).await.is_empty());
    assert!(feed.get_feed(7, 0, 3).await.is_empty());
}

#[tokio::test]
async fn test_update_aggregate_stats_set_is_idempotent() {
    let (_store, feed) = feed_engine();

    let first = feed.update_aggregate_stats(3, "daily_stat", 5.0, false).await.unwrap();
    let second = feed.update_aggregate_stats(3, "daily_stat", 5.0, false).await.unwrap();
    assert_eq!(first, 5.0);
    assert_eq!(second, 5.0);
}

#[tokio::test]
async fn test_update_aggregate_stats_increment_accumulates() {
    let (store, feed) = feed_engine();

    let first = feed.update_aggregate_stats(3, "attendance", 5.0, true).await.unwrap();
    let second = feed.update_aggregate_stats(3, "attendance", 5.0, true).await.unwrap();
    assert_eq!(first, 5.0);
    assert_eq!(second, 10.0);

    // Incrementing refreshes the 24 h TTL
    let ttl = store.ttl(&keys::daily(3, "attendance")).await.unwrap();
    assert!(ttl > 86_000 && ttl <= 86_400);
}

#[tokio::test]
async fn test_feed_backfills_from_daily_counters() {
    let (_store, feed) = feed_engine();

    feed.update_aggregate_stats(4, "attendance", 12.0, false).await.unwrap();
    feed.update_aggregate_stats(4, "classes_completed", 4.0, false).await.unwrap();

    let items = feed.get_feed(4, 20, 0).await;
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|a| a.kind == "daily_stat"));
    assert!(items.iter().any(|a| a.message == "12 asistencias hoy"));
    assert!(items.iter().any(|a| a.message == "4 clases completadas hoy"));
}

#[tokio::test]
async fn test_feed_with_enough_items_skips_backfill() {
    let (_store, feed) = feed_engine();

    feed.update_aggregate_stats(4, "attendance", 12.0, false).await.unwrap();
    for i in 0..5i64 {
        feed.publish_realtime_activity(4, ActivitySubtype::TrainingCount, 10 + i, &Default::default())
            .await
            .unwrap();
    }

    let items = feed.get_feed(4, 20, 0).await;
    assert_eq!(items.len(), 5);
    assert!(items.iter().all(|a| a.kind == "realtime"));
}

#[tokio::test]
async fn test_realtime_summary_popular_classes_and_peak() {
    let (store, feed) = feed_engine();

    store.set_ex(&keys::realtime(2, "training_count"), "25", 300).await.unwrap();
    store.set_ex(&keys::realtime_by_class(2, "Spinning"), "12", 300).await.unwrap();
    store.set_ex(&keys::realtime_by_class(2, "Yoga"), "8", 300).await.unwrap();
    store.set_ex(&keys::realtime_by_class(2, "Boxeo"), "6", 300).await.unwrap();
    store.set_ex(&keys::realtime_by_class(2, "Pilates"), "3", 300).await.unwrap();

    let summary = feed.get_realtime_summary(2).await;
    assert_eq!(summary.training_now, 25);
    assert!(summary.peak_time);

    let names: Vec<&str> = summary
        .popular_classes
        .iter()
        .map(|c| c.class_name.as_str())
        .collect();
    // Descending, Pilates excluded (below 5)
    assert_eq!(names, vec!["Spinning", "Yoga", "Boxeo"]);
}

#[tokio::test]
async fn test_realtime_summary_not_peak_at_twenty() {
    let (store, feed) = feed_engine();
    store.set_ex(&keys::realtime(2, "training_count"), "20", 300).await.unwrap();

    let summary = feed.get_realtime_summary(2).await;
    assert_eq!(summary.training_now, 20);
    assert!(!summary.peak_time);
}

#[tokio::test]
async fn test_insights_sorted_by_priority_and_capped() {
    let (store, feed) = feed_engine();

    store.set_ex(&keys::realtime(5, "training_count"), "30", 300).await.unwrap();
    store.set_ex(&keys::daily(5, "achievements"), "6", 86_400).await.unwrap();
    store.set_ex(&keys::daily(5, "personal_records"), "4", 86_400).await.unwrap();
    store.set_ex(&keys::daily(5, "active_streaks"), "7", 86_400).await.unwrap();
    store.set_ex(&keys::daily(5, "total_hours"), "120", 86_400).await.unwrap();

    let insights = feed.generate_motivational_insights(5).await;
    assert_eq!(insights.len(), 5);
    for window in insights.windows(2) {
        assert!(window[0].priority <= window[1].priority);
    }
    assert_eq!(insights[0].priority, 1);
}

#[tokio::test]
async fn test_insights_respect_minimums() {
    let (store, feed) = feed_engine();

    // Everything just below its rule minimum
    store.set_ex(&keys::realtime(5, "training_count"), "9", 300).await.unwrap();
    store.set_ex(&keys::daily(5, "achievements"), "4", 86_400).await.unwrap();
    store.set_ex(&keys::daily(5, "personal_records"), "2", 86_400).await.unwrap();

    let insights = feed.generate_motivational_insights(5).await;
    assert!(insights.is_empty());
}

#[tokio::test]
async fn test_class_occupancy_publishes_at_80_percent() {
    let (_store, feed) = feed_engine();

    // 7/10 = 0.7 < 0.8
    let below = feed.update_class_occupancy(1, "Yoga", 7, 10).await.unwrap();
    assert!(below.is_none());

    let alert = feed
        .update_class_occupancy(1, "Spinning", 8, 10)
        .await
        .unwrap()
        .expect("80% should publish");
    assert_eq!(alert.message, "¡Spinning casi llena! 8/10 plazas ocupadas");
    assert_eq!(alert.count, 8);
}

#[tokio::test]
async fn test_cleanup_repairs_only_keys_without_ttl() {
    let (store, feed) = feed_engine();

    // INCR creates keys without an expiry
    store.incr(&keys::daily(6, "attendance")).await.unwrap();
    assert_eq!(store.ttl(&keys::daily(6, "attendance")).await.unwrap(), -1);
    // This one already expires
    store.set_ex(&keys::daily(6, "goals_completed"), "2", 500).await.unwrap();

    let stats = feed.cleanup_expired_data(6).await.unwrap();
    assert_eq!(stats.keys_scanned, 2);
    assert_eq!(stats.ttls_repaired, 1);

    let repaired = store.ttl(&keys::daily(6, "attendance")).await.unwrap();
    assert!(repaired > 86_000 && repaired <= 86_400);
    // Untouched: still at its short TTL, not bumped to 24 h
    let untouched = store.ttl(&keys::daily(6, "goals_completed")).await.unwrap();
    assert!(untouched > 0 && untouched <= 500);
}
