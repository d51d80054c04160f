//! Roadmap service: composes the catalog, heuristic planner, entitlement
//! gate, generation client, and stores into the user-facing operations.
//!
//! Per answer set the roadmap lifecycle is a small state machine:
//!
//! ```text
//! no_plan    -> generating  (create, gated)
//! generating -> ready       (generation + append succeeded)
//! generating -> no_plan     (create failed; retry is safe)
//! ready      -> generating  (regenerate, pro only)
//! ```
//!
//! Gate inputs (tier, existing-roadmap flag) are refetched from the store at
//! call time, never taken from caller-cached state, and the create-path
//! append uses a conditional insert so racing creates cannot produce two
//! roadmaps for one answer set.

use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use horizon_db::models::{AnswerSet, RoadmapRecord, RoadmapSource, TaskCheck};
use horizon_db::queries::{answer_sets, entitlements, roadmaps, task_checks};

use crate::catalog::{self, Answers};
use crate::entitlement::{self, Decision, GenerateAction, REASON_ALREADY_GENERATED};
use crate::generate::{self, GenerateError, Generator};
use crate::heuristic::{self, InterimReport};
use crate::progress::{Checklist, Progress, TOTAL_TASKS};
use crate::roadmap::{self, Roadmap, MONTH_COUNT, TASKS_PER_MONTH};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the roadmap service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or missing input to a core operation.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The entitlement gate refused the action.
    #[error("{reason}")]
    EntitlementDenied { reason: &'static str },

    /// The generation client failed (configuration, format, or upstream).
    #[error(transparent)]
    Generate(#[from] GenerateError),

    /// A persistence call failed.
    #[error("storage operation failed: {0}")]
    Storage(#[source] anyhow::Error),
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Roadmap lifecycle state for one answer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoadmapState {
    NoPlan,
    Generating,
    Ready,
}

impl fmt::Display for RoadmapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoPlan => "no_plan",
            Self::Generating => "generating",
            Self::Ready => "ready",
        };
        f.write_str(s)
    }
}

impl RoadmapState {
    /// Check whether a transition from `from` to `to` is a valid edge
    /// in the state graph.
    pub fn is_valid_transition(from: Self, to: Self) -> bool {
        matches!(
            (from, to),
            (Self::NoPlan, Self::Generating)
                | (Self::Generating, Self::Ready)
                | (Self::Generating, Self::NoPlan)
                | (Self::Ready, Self::Generating)
        )
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// The current roadmap together with its parsed payload and progress.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RoadmapView {
    pub record: RoadmapRecord,
    pub roadmap: Roadmap,
    pub progress: Progress,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// The composed roadmap service.
#[derive(Clone)]
pub struct RoadmapService {
    pool: PgPool,
    generator: Arc<dyn Generator>,
}

impl RoadmapService {
    pub fn new(pool: PgPool, generator: Arc<dyn Generator>) -> Self {
        Self { pool, generator }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Validate and persist a submitted answer map.
    pub async fn submit_answers(
        &self,
        user_id: Uuid,
        answers: &Answers,
    ) -> Result<AnswerSet, ServiceError> {
        if answers.is_empty() {
            return Err(ServiceError::Validation(
                "answers must not be empty".to_string(),
            ));
        }
        catalog::validate_answers(answers)
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let json = serde_json::to_value(answers)
            .map_err(|e| ServiceError::Storage(anyhow!("failed to serialize answers: {e}")))?;

        let answer_set = answer_sets::insert_answer_set(&self.pool, user_id, &json)
            .await
            .map_err(ServiceError::Storage)?;

        tracing::info!(user_id = %user_id, answer_set_id = %answer_set.id, "answer set stored");
        Ok(answer_set)
    }

    /// Fetch the user's most recent answer set.
    pub async fn latest_answer_set(
        &self,
        user_id: Uuid,
    ) -> Result<Option<AnswerSet>, ServiceError> {
        answer_sets::latest_answer_set(&self.pool, user_id)
            .await
            .map_err(ServiceError::Storage)
    }

    /// Rule-based interim result for an answer set (latest when `None`).
    pub async fn interim_report(
        &self,
        user_id: Uuid,
        answer_set_id: Option<Uuid>,
    ) -> Result<InterimReport, ServiceError> {
        let answer_set = self.require_answer_set(user_id, answer_set_id).await?;
        let answers = parse_answers(&answer_set)?;
        Ok(heuristic::interim_report(&answers))
    }

    /// Run a gated create/regenerate for an answer set.
    ///
    /// Any failure leaves the store unchanged: the lifecycle state falls back
    /// to what it was (`no_plan` or `ready`) and the user may retry.
    pub async fn generate(
        &self,
        user_id: Uuid,
        answer_set_id: Uuid,
        action: GenerateAction,
    ) -> Result<RoadmapRecord, ServiceError> {
        let answer_set = self.require_answer_set(user_id, Some(answer_set_id)).await?;
        let answers = parse_answers(&answer_set)?;

        // Refetch gate inputs at call time; cached tier or UI state could be
        // stale and would let a downgrade or a double-create slip through.
        let entitlement = entitlements::get_or_default_entitlement(&self.pool, user_id)
            .await
            .map_err(ServiceError::Storage)?;
        let existing = roadmaps::latest_roadmap(&self.pool, user_id, answer_set_id)
            .await
            .map_err(ServiceError::Storage)?;

        match entitlement::authorize(action, entitlement.tier, existing.is_some()) {
            Decision::Allow => {}
            Decision::Deny { reason } => {
                tracing::info!(
                    user_id = %user_id,
                    answer_set_id = %answer_set_id,
                    action = %action,
                    reason,
                    "generation denied"
                );
                return Err(ServiceError::EntitlementDenied { reason });
            }
        }

        let from = if existing.is_some() {
            RoadmapState::Ready
        } else {
            RoadmapState::NoPlan
        };
        if action == GenerateAction::Regenerate && from == RoadmapState::NoPlan {
            return Err(ServiceError::Validation(
                "no roadmap exists yet for this answer set; create one first".to_string(),
            ));
        }
        debug_assert!(RoadmapState::is_valid_transition(from, RoadmapState::Generating));

        tracing::info!(
            user_id = %user_id,
            answer_set_id = %answer_set_id,
            action = %action,
            backend = self.generator.name(),
            "generating roadmap"
        );
        let generated = generate::generate_roadmap(self.generator.as_ref(), &answers).await?;

        let json = serde_json::to_value(&generated)
            .map_err(|e| ServiceError::Storage(anyhow!("failed to serialize roadmap: {e}")))?;

        let record = match action {
            GenerateAction::Create => roadmaps::insert_roadmap_if_absent(
                &self.pool,
                user_id,
                answer_set_id,
                RoadmapSource::Generated,
                &json,
            )
            .await
            .map_err(ServiceError::Storage)?
            .ok_or(ServiceError::EntitlementDenied {
                // A concurrent create won the race between our gate check and
                // the append; surface it the same way as the gate would have.
                reason: REASON_ALREADY_GENERATED,
            })?,
            GenerateAction::Regenerate => roadmaps::insert_roadmap(
                &self.pool,
                user_id,
                answer_set_id,
                RoadmapSource::Generated,
                &json,
            )
            .await
            .map_err(ServiceError::Storage)?,
        };

        tracing::info!(roadmap_id = %record.id, "roadmap stored");
        Ok(record)
    }

    /// The current roadmap for an answer set, with parsed payload and
    /// progress. `None` while the answer set is in `no_plan`.
    pub async fn latest_roadmap(
        &self,
        user_id: Uuid,
        answer_set_id: Uuid,
    ) -> Result<Option<RoadmapView>, ServiceError> {
        let Some(record) = roadmaps::latest_roadmap(&self.pool, user_id, answer_set_id)
            .await
            .map_err(ServiceError::Storage)?
        else {
            return Ok(None);
        };

        let parsed = roadmap::from_stored(&record.roadmap).map_err(|e| {
            ServiceError::Storage(anyhow!("stored roadmap {} failed validation: {e}", record.id))
        })?;
        let progress = self.progress(user_id, record.id).await?;

        Ok(Some(RoadmapView {
            record,
            roadmap: parsed,
            progress,
        }))
    }

    /// Upsert the completion state for one task of a roadmap.
    pub async fn set_task_checked(
        &self,
        user_id: Uuid,
        roadmap_id: Uuid,
        month: u8,
        task_index: u8,
        checked: bool,
    ) -> Result<TaskCheck, ServiceError> {
        if !(1..=MONTH_COUNT as u8).contains(&month) {
            return Err(ServiceError::Validation(format!(
                "month must be between 1 and {MONTH_COUNT}, got {month}"
            )));
        }
        if task_index as usize >= TASKS_PER_MONTH {
            return Err(ServiceError::Validation(format!(
                "task index must be below {TASKS_PER_MONTH}, got {task_index}"
            )));
        }

        roadmaps::get_roadmap(&self.pool, user_id, roadmap_id)
            .await
            .map_err(ServiceError::Storage)?
            .ok_or_else(|| {
                ServiceError::Validation(format!("roadmap {roadmap_id} not found"))
            })?;

        task_checks::upsert_task_check(
            &self.pool,
            user_id,
            roadmap_id,
            i16::from(month),
            i16::from(task_index),
            checked,
        )
        .await
        .map_err(ServiceError::Storage)
    }

    /// Load the full checklist for a roadmap.
    pub async fn checklist(
        &self,
        user_id: Uuid,
        roadmap_id: Uuid,
    ) -> Result<Checklist, ServiceError> {
        let records = task_checks::list_task_checks(&self.pool, user_id, roadmap_id)
            .await
            .map_err(ServiceError::Storage)?;
        Ok(Checklist::from_records(records.iter().map(|c| {
            (c.month as u8, c.task_index as u8, c.checked)
        })))
    }

    /// Derived completion counter for a roadmap.
    pub async fn progress(
        &self,
        user_id: Uuid,
        roadmap_id: Uuid,
    ) -> Result<Progress, ServiceError> {
        let done = task_checks::count_checked(&self.pool, user_id, roadmap_id)
            .await
            .map_err(ServiceError::Storage)?;
        Ok(Progress {
            done: done as usize,
            total: TOTAL_TASKS,
        })
    }

    async fn require_answer_set(
        &self,
        user_id: Uuid,
        answer_set_id: Option<Uuid>,
    ) -> Result<AnswerSet, ServiceError> {
        let answer_set = match answer_set_id {
            Some(id) => answer_sets::get_answer_set(&self.pool, user_id, id)
                .await
                .map_err(ServiceError::Storage)?
                .ok_or_else(|| ServiceError::Validation(format!("answer set {id} not found")))?,
            None => answer_sets::latest_answer_set(&self.pool, user_id)
                .await
                .map_err(ServiceError::Storage)?
                .ok_or_else(|| {
                    ServiceError::Validation("no diagnosis has been submitted yet".to_string())
                })?,
        };
        Ok(answer_set)
    }
}

/// Decode a stored answers payload back into the typed map.
fn parse_answers(answer_set: &AnswerSet) -> Result<Answers, ServiceError> {
    serde_json::from_value(answer_set.answers.clone()).map_err(|e| {
        ServiceError::Storage(anyhow!(
            "stored answers for answer set {} are malformed: {e}",
            answer_set.id
        ))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
