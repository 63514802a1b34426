// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Directory client for the authoritative relational source.
//!
//! The core backend owns users, class sessions, and participations; this
//! engine only reads coarse aggregates from its internal API. Rows returned
//! here may carry identity (names, user ids) — callers that write into the
//! ephemeral store are responsible for stripping it first.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::AppError;
use crate::store::TenantId;

/// One ranked member row from the authoritative source.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberScore {
    pub user_id: u64,
    pub name: String,
    pub value: f64,
}

/// Live check-in count for one class.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassAttendance {
    pub class_name: String,
    pub count: i64,
}

/// Read access to the authoritative relational domain.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Tenants the scheduler iterates.
    async fn active_tenants(&self) -> Result<Vec<TenantId>, AppError>;

    /// Today's attendance ranking (carries identity; strip before storing).
    async fn daily_attendance(&self, tenant: TenantId) -> Result<Vec<MemberScore>, AppError>;

    /// Current streak ranking (carries identity; strip before storing).
    async fn daily_streaks(&self, tenant: TenantId) -> Result<Vec<MemberScore>, AppError>;

    /// Live per-class check-in counts.
    async fn current_checkins(&self, tenant: TenantId) -> Result<Vec<ClassAttendance>, AppError>;
}

/// HTTP client against the core backend's internal API.
#[derive(Clone)]
pub struct HttpDirectory {
    http: reqwest::Client,
    base_url: String,
}

impl HttpDirectory {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::DirectoryApi(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::DirectoryApi(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::DirectoryApi(format!("decode {}: {}", url, e)))
    }
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn active_tenants(&self) -> Result<Vec<TenantId>, AppError> {
        self.get_json("/internal/tenants/active").await
    }

    async fn daily_attendance(&self, tenant: TenantId) -> Result<Vec<MemberScore>, AppError> {
        self.get_json(&format!("/internal/tenants/{}/attendance/daily", tenant))
            .await
    }

    async fn daily_streaks(&self, tenant: TenantId) -> Result<Vec<MemberScore>, AppError> {
        self.get_json(&format!("/internal/tenants/{}/streaks/daily", tenant))
            .await
    }

    async fn current_checkins(&self, tenant: TenantId) -> Result<Vec<ClassAttendance>, AppError> {
        self.get_json(&format!("/internal/tenants/{}/checkins/current", tenant))
            .await
    }
}
