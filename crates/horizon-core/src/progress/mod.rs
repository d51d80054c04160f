//! Local checklist state and progress derivation.
//!
//! [`Checklist`] is the client-side view of a roadmap's task checks. It
//! supports the two-phase optimistic protocol: apply a check locally and keep
//! the returned [`PendingCheck`]; if the persistence call fails, roll the
//! local state back to the prior value instead of blocking on the store.
//! Progress is always derived by counting, never stored.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::roadmap::{MONTH_COUNT, TASKS_PER_MONTH};

/// Fixed progress denominator: 12 months of 3 tasks each.
pub const TOTAL_TASKS: usize = MONTH_COUNT * TASKS_PER_MONTH;

/// Derived completion counter for one roadmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

/// A locally applied check that has not been confirmed by the store yet.
///
/// Holds the prior value so the apply can be undone.
#[derive(Debug, Clone, Copy)]
#[must_use = "keep the pending check so a failed persistence call can be rolled back"]
pub struct PendingCheck {
    month: u8,
    task_index: u8,
    prior: bool,
}

/// Per-(month, task) completion state for one roadmap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checklist {
    checked: BTreeMap<(u8, u8), bool>,
}

impl Checklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a checklist from stored (month, task_index, checked) records.
    pub fn from_records(records: impl IntoIterator<Item = (u8, u8, bool)>) -> Self {
        let checked = records
            .into_iter()
            .map(|(month, task_index, checked)| ((month, task_index), checked))
            .collect();
        Self { checked }
    }

    /// Whether one task is currently checked. Unknown keys are unchecked.
    pub fn is_checked(&self, month: u8, task_index: u8) -> bool {
        self.checked
            .get(&(month, task_index))
            .copied()
            .unwrap_or(false)
    }

    /// Apply a check locally, returning the token needed to undo it.
    pub fn apply(&mut self, month: u8, task_index: u8, checked: bool) -> PendingCheck {
        let prior = self.is_checked(month, task_index);
        self.checked.insert((month, task_index), checked);
        PendingCheck {
            month,
            task_index,
            prior,
        }
    }

    /// Undo a locally applied check after a failed persistence call.
    pub fn rollback(&mut self, pending: PendingCheck) {
        self.checked
            .insert((pending.month, pending.task_index), pending.prior);
    }

    /// Derive the completion counter over the fixed denominator.
    pub fn progress(&self) -> Progress {
        let done = self.checked.values().filter(|c| **c).count();
        Progress {
            done,
            total: TOTAL_TASKS,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
