// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared test fixtures: an engine wired over the in-memory store and a
//! fake directory standing in for the core backend.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use gympulse::error::AppError;
use gympulse::services::directory::{ClassAttendance, Directory, MemberScore};
use gympulse::services::{Aggregator, FeedEngine};
use gympulse::store::{EphemeralStore, MemoryStore, TenantId};

/// In-memory stand-in for the core backend's internal API.
#[derive(Default)]
pub struct FakeDirectory {
    pub tenants: Vec<TenantId>,
    pub attendance: Vec<MemberScore>,
    pub streaks: Vec<MemberScore>,
    pub checkins: Vec<ClassAttendance>,
    /// Per-tenant calls fail for this tenant
    pub fail_for: Option<TenantId>,
    /// Slow down `active_tenants` (for non-reentrancy tests)
    pub tenant_list_delay: Option<Duration>,
}

impl FakeDirectory {
    pub fn with_tenants(tenants: Vec<TenantId>) -> Self {
        Self {
            tenants,
            ..Default::default()
        }
    }

    fn check(&self, tenant: TenantId) -> Result<(), AppError> {
        if self.fail_for == Some(tenant) {
            return Err(AppError::DirectoryApi(format!(
                "simulated failure for tenant {}",
                tenant
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn active_tenants(&self) -> Result<Vec<TenantId>, AppError> {
        if let Some(delay) = self.tenant_list_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.tenants.clone())
    }

    async fn daily_attendance(&self, tenant: TenantId) -> Result<Vec<MemberScore>, AppError> {
        self.check(tenant)?;
        Ok(self.attendance.clone())
    }

    async fn daily_streaks(&self, tenant: TenantId) -> Result<Vec<MemberScore>, AppError> {
        self.check(tenant)?;
        Ok(self.streaks.clone())
    }

    async fn current_checkins(&self, tenant: TenantId) -> Result<Vec<ClassAttendance>, AppError> {
        self.check(tenant)?;
        Ok(self.checkins.clone())
    }
}

/// A feed engine over a fresh in-memory store.
pub fn feed_engine() -> (Arc<MemoryStore>, Arc<FeedEngine>) {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn EphemeralStore> = store.clone();
    let feed = Arc::new(FeedEngine::new(dyn_store));
    (store, feed)
}

/// Feed engine plus aggregator over a fresh store and the given directory.
pub fn engine_with_directory(
    directory: Arc<dyn Directory>,
) -> (Arc<MemoryStore>, Arc<FeedEngine>, Arc<Aggregator>) {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn EphemeralStore> = store.clone();
    let feed = Arc::new(FeedEngine::new(dyn_store.clone()));
    let aggregator = Arc::new(Aggregator::new(dyn_store, feed.clone(), directory));
    (store, feed, aggregator)
}

/// Engine with an empty fake directory, for tests that never touch it.
pub fn engine() -> (Arc<MemoryStore>, Arc<FeedEngine>, Arc<Aggregator>) {
    engine_with_directory(Arc::new(FakeDirectory::default()))
}
