//! The canonical 12-month roadmap shape and its validation.
//!
//! The generation service is asked for this exact JSON schema, but its output
//! is untrusted: everything that crosses the generation boundary is parsed
//! and structurally validated here before it may be stored or rendered.
//! Months are normalized to ascending order on parse.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of months in a roadmap.
pub const MONTH_COUNT: usize = 12;
/// Checklist tasks per month.
pub const TASKS_PER_MONTH: usize = 3;
/// Upper bound on the overall priority list.
pub const MAX_PRIORITIES: usize = 5;

/// A complete 12-month action roadmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roadmap {
    pub title: String,
    pub summary: String,
    /// Overall priorities, at most [`MAX_PRIORITIES`] entries.
    pub top_priorities: Vec<String>,
    /// Exactly [`MONTH_COUNT`] entries, numbered 1..=12, ascending.
    pub months: Vec<MonthPlan>,
}

/// One month of the roadmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthPlan {
    /// 1..=12.
    pub month: u8,
    pub goal: String,
    /// Exactly [`TASKS_PER_MONTH`] checklist entries.
    pub tasks: Vec<String>,
    pub caution: String,
}

/// Errors from parsing or validating a roadmap payload.
#[derive(Debug, Error)]
pub enum RoadmapParseError {
    #[error("payload does not match the roadmap schema: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected exactly 12 months, got {0}")]
    WrongMonthCount(usize),

    #[error("month numbers must cover 1..=12 exactly once, got {0:?}")]
    BadMonthNumbers(Vec<u8>),

    #[error("month {month} has {got} tasks, expected exactly 3")]
    WrongTaskCount { month: u8, got: usize },

    #[error("too many top priorities: {0} (at most 5)")]
    TooManyPriorities(usize),
}

/// Parse raw generation output into a validated, normalized [`Roadmap`].
pub fn parse_roadmap(text: &str) -> Result<Roadmap, RoadmapParseError> {
    let mut roadmap: Roadmap = serde_json::from_str(text)?;
    validate(&roadmap)?;
    roadmap.months.sort_by_key(|m| m.month);
    Ok(roadmap)
}

/// Re-validate a roadmap read back from storage.
///
/// Stored payloads were validated at write time, so a failure here indicates
/// storage corruption rather than bad upstream output.
pub fn from_stored(value: &serde_json::Value) -> Result<Roadmap, RoadmapParseError> {
    let mut roadmap: Roadmap = serde_json::from_value(value.clone())?;
    validate(&roadmap)?;
    roadmap.months.sort_by_key(|m| m.month);
    Ok(roadmap)
}

/// Validate the structural invariants of a roadmap.
pub fn validate(roadmap: &Roadmap) -> Result<(), RoadmapParseError> {
    if roadmap.top_priorities.len() > MAX_PRIORITIES {
        return Err(RoadmapParseError::TooManyPriorities(
            roadmap.top_priorities.len(),
        ));
    }

    if roadmap.months.len() != MONTH_COUNT {
        return Err(RoadmapParseError::WrongMonthCount(roadmap.months.len()));
    }

    let mut numbers: Vec<u8> = roadmap.months.iter().map(|m| m.month).collect();
    numbers.sort_unstable();
    let expected: Vec<u8> = (1..=MONTH_COUNT as u8).collect();
    if numbers != expected {
        return Err(RoadmapParseError::BadMonthNumbers(numbers));
    }

    for month in &roadmap.months {
        if month.tasks.len() != TASKS_PER_MONTH {
            return Err(RoadmapParseError::WrongTaskCount {
                month: month.month,
                got: month.tasks.len(),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
