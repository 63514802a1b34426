// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod aggregator;
pub mod directory;
pub mod feed;

pub use aggregator::Aggregator;
pub use directory::{ClassAttendance, Directory, HttpDirectory, MemberScore};
pub use feed::{FeedEngine, K_ANONYMITY_THRESHOLD};
