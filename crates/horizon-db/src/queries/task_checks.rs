//! Database query functions for the `task_checks` table.
//!
//! Upserts are keyed by (user, roadmap, month, task index); repeating a call
//! with the same checked value is a no-op in effect, and same-key writes are
//! last-write-wins.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::TaskCheck;

/// Upsert the completion state for one task. Returns the stored row.
pub async fn upsert_task_check(
    pool: &PgPool,
    user_id: Uuid,
    roadmap_id: Uuid,
    month: i16,
    task_index: i16,
    checked: bool,
) -> Result<TaskCheck> {
    let check = sqlx::query_as::<_, TaskCheck>(
        "INSERT INTO task_checks (user_id, roadmap_id, month, task_index, checked) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (user_id, roadmap_id, month, task_index) \
         DO UPDATE SET checked = EXCLUDED.checked, updated_at = now() \
         RETURNING *",
    )
    .bind(user_id)
    .bind(roadmap_id)
    .bind(month)
    .bind(task_index)
    .bind(checked)
    .fetch_one(pool)
    .await
    .context("failed to upsert task check")?;

    Ok(check)
}

/// List all completion records for a roadmap.
pub async fn list_task_checks(
    pool: &PgPool,
    user_id: Uuid,
    roadmap_id: Uuid,
) -> Result<Vec<TaskCheck>> {
    let checks = sqlx::query_as::<_, TaskCheck>(
        "SELECT * FROM task_checks \
         WHERE user_id = $1 AND roadmap_id = $2 \
         ORDER BY month ASC, task_index ASC",
    )
    .bind(user_id)
    .bind(roadmap_id)
    .fetch_all(pool)
    .await
    .context("failed to list task checks")?;

    Ok(checks)
}

/// Count the checked tasks for a roadmap.
pub async fn count_checked(pool: &PgPool, user_id: Uuid, roadmap_id: Uuid) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM task_checks \
         WHERE user_id = $1 AND roadmap_id = $2 AND checked",
    )
    .bind(user_id)
    .bind(roadmap_id)
    .fetch_one(pool)
    .await
    .context("failed to count checked tasks")?;

    Ok(row.0)
}
