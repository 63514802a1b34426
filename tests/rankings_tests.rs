// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Anonymous and named leaderboard behavior.

mod common;
use common::feed_engine;

use gympulse::models::{NamedRankingEntry, RankingEntry, RankingPeriod};
use gympulse::store::keys;
use gympulse::store::EphemeralStore;

fn named(user_id: u64, name: &str, value: f64) -> NamedRankingEntry {
    NamedRankingEntry {
        user_id: Some(user_id),
        name: name.to_string(),
        value,
    }
}

#[tokio::test]
async fn test_named_ranking_roundtrip() {
    let (_store, feed) = feed_engine();

    feed.add_named_ranking(
        2,
        "attendance",
        &[named(10, "Ana", 12.0), named(11, "Luis", 9.0)],
        RankingPeriod::Daily,
    )
    .await
    .unwrap();

    let entries = feed
        .get_anonymous_rankings(2, "attendance", RankingPeriod::Daily, 2)
        .await;

    assert_eq!(
        entries,
        vec![
            RankingEntry {
                position: 1,
                value: 12.0,
                user_id: Some(10),
                name: Some("Ana".to_string()),
                label: "Ana".to_string(),
            },
            RankingEntry {
                position: 2,
                value: 9.0,
                user_id: Some(11),
                name: Some("Luis".to_string()),
                label: "Luis".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_anonymous_rankings_never_contain_identity() {
    let (store, feed) = feed_engine();

    feed.add_anonymous_ranking(3, "attendance", &[12.0, 9.0, 15.0], RankingPeriod::Daily)
        .await
        .unwrap();

    let entries = feed
        .get_anonymous_rankings(3, "attendance", RankingPeriod::Daily, 10)
        .await;
    assert_eq!(entries.len(), 3);
    for (i, entry) in entries.iter().enumerate() {
        assert!(entry.name.is_none());
        assert!(entry.user_id.is_none());
        assert_eq!(entry.label, format!("Posición {}", i + 1));
        let json = serde_json::to_string(entry).unwrap();
        assert!(!json.contains("name"));
        assert!(!json.contains("user_id"));
    }

    // No side maps exist for anonymous rankings
    let names = store
        .hgetall(&keys::ranking_names(3, RankingPeriod::Daily, "attendance"))
        .await
        .unwrap();
    assert!(names.is_empty());
}

#[tokio::test]
async fn test_anonymous_ranking_caps_top_ten_descending() {
    let (_store, feed) = feed_engine();

    let values: Vec<f64> = (1..=15).map(|i| i as f64).collect();
    let summary = feed
        .add_anonymous_ranking(1, "attendance", &values, RankingPeriod::Daily)
        .await
        .unwrap();
    assert_eq!(summary.entries, 10);

    let entries = feed
        .get_anonymous_rankings(1, "attendance", RankingPeriod::Daily, 20)
        .await;
    assert_eq!(entries.len(), 10);
    assert_eq!(entries[0].value, 15.0);
    assert_eq!(entries[9].value, 6.0);
}

#[tokio::test]
async fn test_named_ranking_caps_twenty_and_sorts() {
    let (_store, feed) = feed_engine();

    let entries: Vec<NamedRankingEntry> = (1..=25)
        .map(|i| named(i, &format!("Socio {}", i), i as f64))
        .collect();
    let summary = feed
        .add_named_ranking(4, "streaks", &entries, RankingPeriod::Weekly)
        .await
        .unwrap();
    assert_eq!(summary.entries, 20);

    let read = feed
        .get_anonymous_rankings(4, "streaks", RankingPeriod::Weekly, 30)
        .await;
    assert_eq!(read.len(), 20);
    assert_eq!(read[0].value, 25.0);
    assert_eq!(read[0].name.as_deref(), Some("Socio 25"));
}

#[tokio::test]
async fn test_rewrite_clears_prior_ranking() {
    let (_store, feed) = feed_engine();

    feed.add_anonymous_ranking(1, "attendance", &[5.0, 4.0], RankingPeriod::Daily)
        .await
        .unwrap();
    feed.add_anonymous_ranking(1, "attendance", &[9.0], RankingPeriod::Daily)
        .await
        .unwrap();

    let entries = feed
        .get_anonymous_rankings(1, "attendance", RankingPeriod::Daily, 10)
        .await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].value, 9.0);
}

#[tokio::test]
async fn test_named_ranking_keys_share_one_ttl() {
    let (store, feed) = feed_engine();

    feed.add_named_ranking(2, "attendance", &[named(10, "Ana", 12.0)], RankingPeriod::Weekly)
        .await
        .unwrap();

    for key in [
        keys::ranking(2, RankingPeriod::Weekly, "attendance"),
        keys::ranking_names(2, RankingPeriod::Weekly, "attendance"),
        keys::ranking_users(2, RankingPeriod::Weekly, "attendance"),
    ] {
        let ttl = store.ttl(&key).await.unwrap();
        assert!(ttl > 604_000 && ttl <= 604_800, "{}: ttl {}", key, ttl);
    }
}

#[tokio::test]
async fn test_ranking_limit_zero_returns_nothing() {
    let (_store, feed) = feed_engine();

    feed.add_anonymous_ranking(1, "attendance", &[7.0, 5.0, 3.0], RankingPeriod::Daily)
        .await
        .unwrap();

    // limit=0 must not fall through to a whole-set range read
    let entries = feed
        .get_anonymous_rankings(1, "attendance", RankingPeriod::Daily, 0)
        .await;
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_rankings_are_tenant_isolated() {
    let (_store, feed) = feed_engine();

    feed.add_anonymous_ranking(1, "attendance", &[7.0], RankingPeriod::Daily)
        .await
        .unwrap();

    let other = feed
        .get_anonymous_rankings(2, "attendance", RankingPeriod::Daily, 10)
        .await;
    assert!(other.is_empty());
}
