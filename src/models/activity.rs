// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Feed activity entries.
//!
//! An [`Activity`] carries a quantity (`count`) and a precomputed message.
//! It never carries a person: the message is built only from the count and
//! non-identifying metadata such as a class name or streak length.

use serde::{Deserialize, Serialize};

use crate::store::TenantId;
use crate::time_utils::format_utc_rfc3339;

/// Activity categories the engine publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySubtype {
    TrainingCount,
    ClassCheckin,
    AchievementUnlocked,
    StreakMilestone,
    PrBroken,
    GoalCompleted,
    ClassCompleted,
    ClassOccupancy,
    PeakTime,
    GroupTraining,
}

impl ActivitySubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrainingCount => "training_count",
            Self::ClassCheckin => "class_checkin",
            Self::AchievementUnlocked => "achievement_unlocked",
            Self::StreakMilestone => "streak_milestone",
            Self::PrBroken => "pr_broken",
            Self::GoalCompleted => "goal_completed",
            Self::ClassCompleted => "class_completed",
            Self::ClassOccupancy => "class_occupancy",
            Self::PeakTime => "peak_time",
            Self::GroupTraining => "group_training",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::TrainingCount => "💪",
            Self::ClassCheckin => "🏃",
            Self::AchievementUnlocked => "🏆",
            Self::StreakMilestone => "🔥",
            Self::PrBroken => "📈",
            Self::GoalCompleted => "🎯",
            Self::ClassCompleted => "✅",
            Self::ClassOccupancy => "📢",
            Self::PeakTime => "⚡",
            Self::GroupTraining => "👥",
        }
    }

    /// Whether the subtype counts individual people and therefore falls
    /// under the k-anonymity threshold.
    pub fn participant_sensitive(&self) -> bool {
        matches!(self, Self::TrainingCount | Self::ClassCheckin)
    }

    /// Build the human-readable message for this subtype.
    pub fn message(&self, count: i64, metadata: &ActivityMetadata) -> String {
        let class = metadata.class_name.as_deref().unwrap_or("clase");
        match self {
            Self::TrainingCount => format!("{} personas entrenando ahora", count),
            Self::ClassCheckin => format!("{} personas en {}", count, class),
            Self::AchievementUnlocked => format!("{} logros desbloqueados hoy", count),
            Self::StreakMilestone => {
                let days = metadata.streak_days.unwrap_or(0);
                format!("¡Racha de {} días alcanzada en el gimnasio!", days)
            }
            Self::PrBroken => format!("{} récords personales superados hoy", count),
            Self::GoalCompleted => format!("{} objetivos completados hoy", count),
            Self::ClassCompleted => format!("{} completada con {} participantes", class, count),
            Self::ClassOccupancy => format!("¡{} casi llena!", class),
            Self::PeakTime => format!("⚡ Hora punta: {} personas entrenando", count),
            Self::GroupTraining => format!("{} grupos entrenando juntos ahora", count),
        }
    }
}

/// Non-identifying metadata available to message templates.
#[derive(Debug, Clone, Default)]
pub struct ActivityMetadata {
    pub class_name: Option<String>,
    pub streak_days: Option<u32>,
}

/// One feed entry. The wire payload never includes a personal field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub subtype: String,
    pub count: i64,
    pub message: String,
    pub timestamp: String,
    pub icon: String,
    pub ttl_minutes: i64,
    /// Relative-time label, filled in on read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_ago: Option<String>,
}

impl Activity {
    /// Build an engine-generated (`"realtime"`) entry.
    pub fn realtime(
        tenant: TenantId,
        subtype: ActivitySubtype,
        count: i64,
        metadata: &ActivityMetadata,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: format!("{}_{}_{}", tenant, subtype.as_str(), now.timestamp()),
            kind: "realtime".to_string(),
            subtype: subtype.as_str().to_string(),
            count,
            message: subtype.message(count, metadata),
            timestamp: format_utc_rfc3339(now),
            icon: subtype.icon().to_string(),
            ttl_minutes: 1440,
            time_ago: None,
        }
    }

    /// Build a synthesized backfill entry derived from a daily counter.
    pub fn daily_stat(tenant: TenantId, stat: &str, count: i64, message: String, icon: &str) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: format!("{}_{}_{}", tenant, stat, now.timestamp()),
            kind: "daily_stat".to_string(),
            subtype: stat.to_string(),
            count,
            message,
            timestamp: format_utc_rfc3339(now),
            icon: icon.to_string(),
            ttl_minutes: 1440,
            time_ago: None,
        }
    }
}
