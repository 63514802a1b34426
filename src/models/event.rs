// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Raw domain events consumed by the aggregator.
//!
//! A closed enum rather than a string-keyed dispatch table: an unknown event
//! kind is a deserialization error at the edge, never a silent no-op inside
//! the engine.

use serde::{Deserialize, Serialize};

use crate::store::TenantId;

/// One raw per-tenant domain event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    ClassCheckin {
        tenant_id: TenantId,
        class_name: String,
    },
    AchievementUnlocked {
        tenant_id: TenantId,
        achievement_type: String,
    },
    StreakMilestone {
        tenant_id: TenantId,
        streak_days: u32,
    },
    PersonalRecord {
        tenant_id: TenantId,
    },
    GoalCompleted {
        tenant_id: TenantId,
    },
    ClassCompleted {
        tenant_id: TenantId,
        class_name: String,
        participants: u32,
        duration_minutes: u32,
    },
}

impl DomainEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            Self::ClassCheckin { tenant_id, .. }
            | Self::AchievementUnlocked { tenant_id, .. }
            | Self::StreakMilestone { tenant_id, .. }
            | Self::PersonalRecord { tenant_id }
            | Self::GoalCompleted { tenant_id }
            | Self::ClassCompleted { tenant_id, .. } => *tenant_id,
        }
    }

    /// Event kind label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClassCheckin { .. } => "class_checkin",
            Self::AchievementUnlocked { .. } => "achievement_unlocked",
            Self::StreakMilestone { .. } => "streak_milestone",
            Self::PersonalRecord { .. } => "personal_record",
            Self::GoalCompleted { .. } => "goal_completed",
            Self::ClassCompleted { .. } => "class_completed",
        }
    }
}

/// Partial-failure summary of a batch run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BatchOutcome {
    pub processed: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_tagging() {
        let event: DomainEvent = serde_json::from_str(
            r#"{"type":"class_checkin","tenant_id":4,"class_name":"Yoga"}"#,
        )
        .unwrap();
        assert_eq!(event.tenant_id(), 4);
        assert_eq!(event.kind(), "class_checkin");
    }

    #[test]
    fn test_unknown_event_kind_is_rejected() {
        let result: Result<DomainEvent, _> =
            serde_json::from_str(r#"{"type":"mystery","tenant_id":4}"#);
        assert!(result.is_err());
    }
}
