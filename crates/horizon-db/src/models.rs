use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Entitlement tier of a user. Controls access to roadmap regeneration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntitlementTier {
    Free,
    Pro,
}

impl fmt::Display for EntitlementTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Free => "free",
            Self::Pro => "pro",
        };
        f.write_str(s)
    }
}

impl FromStr for EntitlementTier {
    type Err = EntitlementTierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            other => Err(EntitlementTierParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`EntitlementTier`] string.
#[derive(Debug, Clone)]
pub struct EntitlementTierParseError(pub String);

impl fmt::Display for EntitlementTierParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid entitlement tier: {:?}", self.0)
    }
}

impl std::error::Error for EntitlementTierParseError {}

// ---------------------------------------------------------------------------

/// How a stored roadmap was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoadmapSource {
    /// Rule-based interim result.
    Heuristic,
    /// Produced by the external generation service.
    Generated,
}

impl fmt::Display for RoadmapSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Heuristic => "heuristic",
            Self::Generated => "generated",
        };
        f.write_str(s)
    }
}

impl FromStr for RoadmapSource {
    type Err = RoadmapSourceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heuristic" => Ok(Self::Heuristic),
            "generated" => Ok(Self::Generated),
            other => Err(RoadmapSourceParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`RoadmapSource`] string.
#[derive(Debug, Clone)]
pub struct RoadmapSourceParseError(pub String);

impl fmt::Display for RoadmapSourceParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid roadmap source: {:?}", self.0)
    }
}

impl std::error::Error for RoadmapSourceParseError {}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// One submitted set of diagnosis answers. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnswerSet {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Map of question id -> selected option, validated at submission.
    pub answers: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// One stored roadmap. The table is append-only: regeneration inserts a new
/// row and the newest row for an answer set is the current one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoadmapRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub answer_set_id: Uuid,
    pub source: RoadmapSource,
    /// The validated roadmap payload as stored JSON.
    pub roadmap: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A user's entitlement. Created lazily with the `free` tier on first read;
/// the tier itself is only changed by the billing process.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Entitlement {
    pub user_id: Uuid,
    pub tier: EntitlementTier,
    pub updated_at: DateTime<Utc>,
}

/// Completion state for one task within one month of one roadmap.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskCheck {
    pub user_id: Uuid,
    pub roadmap_id: Uuid,
    /// 1..=12.
    pub month: i16,
    /// 0..=2 within the month's task list.
    pub task_index: i16,
    pub checked: bool,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
