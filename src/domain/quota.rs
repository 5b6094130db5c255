//! Per-user consumable resource ledger entry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Remaining consumable resources for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quota {
    /// Owner of this quota
    pub user_email: String,

    /// Chat messages still available in this period
    pub messages_left: u32,

    /// Whole video-hours still available for transcription
    pub video_hours_left: u32,

    /// When the counters go back to their defaults
    pub reset_at: DateTime<Utc>,

    /// Last write to this row
    pub updated_at: DateTime<Utc>,
}

impl Quota {
    /// A fresh quota carrying the default allowances
    pub fn fresh(user_email: impl Into<String>, defaults: &QuotaDefaults, now: DateTime<Utc>) -> Self {
        Self {
            user_email: user_email.into(),
            messages_left: defaults.messages,
            video_hours_left: defaults.video_hours,
            reset_at: defaults.next_reset(now),
            updated_at: now,
        }
    }

    /// Whether the scheduled reset is due
    pub fn is_due_for_reset(&self, now: DateTime<Utc>) -> bool {
        self.reset_at <= now
    }
}

/// Partial, last-write-wins replacement of quota fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaUpdate {
    pub messages_left: Option<u32>,
    pub video_hours_left: Option<u32>,
    pub reset_at: Option<DateTime<Utc>>,
}

impl QuotaUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages_left(mut self, value: u32) -> Self {
        self.messages_left = Some(value);
        self
    }

    pub fn video_hours_left(mut self, value: u32) -> Self {
        self.video_hours_left = Some(value);
        self
    }

    pub fn reset_at(mut self, value: DateTime<Utc>) -> Self {
        self.reset_at = Some(value);
        self
    }

    /// True when no field would change
    pub fn is_empty(&self) -> bool {
        self.messages_left.is_none() && self.video_hours_left.is_none() && self.reset_at.is_none()
    }
}

/// Allowances granted on creation and on every scheduled reset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDefaults {
    /// Messages per period (default: 50)
    #[serde(default = "default_messages")]
    pub messages: u32,

    /// Video-hours per period (default: 10)
    #[serde(default = "default_video_hours")]
    pub video_hours: u32,

    /// Length of a period in days (default: 30, never less than 1)
    #[serde(default = "default_reset_period_days")]
    pub reset_period_days: u32,
}

fn default_messages() -> u32 {
    50
}
fn default_video_hours() -> u32 {
    10
}
fn default_reset_period_days() -> u32 {
    30
}

impl Default for QuotaDefaults {
    fn default() -> Self {
        Self {
            messages: default_messages(),
            video_hours: default_video_hours(),
            reset_period_days: default_reset_period_days(),
        }
    }
}

impl QuotaDefaults {
    /// Effective period length; a zero-day period counts as one day
    pub fn period_days(&self) -> u32 {
        self.reset_period_days.max(1)
    }

    /// Next reset instant counted from `from`
    pub fn next_reset(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        from + Duration::days(i64::from(self.period_days()))
    }

    /// Roll `reset_at` forward by whole periods until it lies after `now`
    pub fn roll_forward(&self, mut reset_at: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        while reset_at <= now {
            reset_at = self.next_reset(reset_at);
        }
        reset_at
    }
}
