// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data model types (all ephemeral, TTL-bound).

pub mod activity;
pub mod event;
pub mod insight;
pub mod ranking;
pub mod summary;

pub use activity::{Activity, ActivityMetadata, ActivitySubtype};
pub use event::{BatchOutcome, DomainEvent};
pub use insight::Insight;
pub use ranking::{NamedRankingEntry, RankingEntry, RankingPeriod, RankingSummary};
pub use summary::{CleanupStats, PopularClass, RealtimeSummary};
