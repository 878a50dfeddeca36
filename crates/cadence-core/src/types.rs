use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Check-ins needed for a participant to qualify.
pub const QUALIFY_THRESHOLD: u32 = 9;

/// Target ceiling of check-ins over one round (rendered as `N/21`).
pub const TARGET_CHECKINS: u32 = 21;

/// Inclusive character bounds for check-in content.
pub const MIN_CONTENT_CHARS: usize = 2;
pub const MAX_CONTENT_CHARS: usize = 500;

/// A round runs for 30 days from its start.
pub const PERIOD_DAYS: i64 = 30;

// ---------------------------------------------------------------------------
// PeriodStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    /// Signup collecting.
    Open,
    /// Signup closed, check-ins allowed.
    Active,
    /// Terminal.
    Closed,
}

impl PeriodStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PeriodStatus::Open => "open",
            PeriodStatus::Active => "active",
            PeriodStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PeriodStatus {
    type Err = crate::error::CadenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(PeriodStatus::Open),
            "active" => Ok(PeriodStatus::Active),
            "closed" => Ok(PeriodStatus::Closed),
            _ => Err(crate::error::CadenceError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One run of the accountability program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Period {
    pub id: i64,
    /// `YYYY-MM`, with a letter suffix on same-month collision (`2024-05a`).
    pub name: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: PeriodStatus,
    /// Opaque link to the external signup table.
    pub signup_link: Option<String>,
}

/// One person's entry in a period. `(period_id, nickname)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: i64,
    pub period_id: i64,
    pub nickname: String,
    pub focus_area: String,
    pub introduction: String,
    pub goals: String,
    pub signed_up_at: DateTime<Utc>,
}

/// One day's check-in. At most one per `(participant_id, date)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckinRecord {
    pub id: i64,
    pub participant_id: i64,
    pub nickname: String,
    pub date: NaiveDate,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// 1-based count of this participant's check-ins at creation time.
    pub seq: u32,
}

/// Parser output, not yet persisted, so no ids or period reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSignup {
    pub nickname: String,
    pub focus_area: String,
    pub introduction: String,
    pub goals: String,
}

/// Per-participant aggregate for the end-of-round summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantStats {
    pub nickname: String,
    pub focus_area: String,
    pub checkin_count: u32,
    pub qualified: bool,
}

/// Aggregate counts returned by a successful signup import.
#[derive(Debug, Clone)]
pub struct SignupSummary {
    pub period_name: String,
    pub total: usize,
    /// Focus area → nicknames, in first-seen order.
    pub by_focus_area: Vec<(String, Vec<String>)>,
}
