//! Database query functions for the `answer_sets` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::AnswerSet;

/// Insert a new answer set row. Returns the inserted row with
/// server-generated defaults (id, created_at).
pub async fn insert_answer_set(
    pool: &PgPool,
    user_id: Uuid,
    answers: &serde_json::Value,
) -> Result<AnswerSet> {
    let answer_set = sqlx::query_as::<_, AnswerSet>(
        "INSERT INTO answer_sets (user_id, answers) \
         VALUES ($1, $2) \
         RETURNING *",
    )
    .bind(user_id)
    .bind(answers)
    .fetch_one(pool)
    .await
    .context("failed to insert answer set")?;

    Ok(answer_set)
}

/// Fetch an answer set by ID, scoped to its owner.
pub async fn get_answer_set(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<Option<AnswerSet>> {
    let answer_set = sqlx::query_as::<_, AnswerSet>(
        "SELECT * FROM answer_sets WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch answer set")?;

    Ok(answer_set)
}

/// Fetch the most recently submitted answer set for a user.
pub async fn latest_answer_set(pool: &PgPool, user_id: Uuid) -> Result<Option<AnswerSet>> {
    let answer_set = sqlx::query_as::<_, AnswerSet>(
        "SELECT * FROM answer_sets WHERE user_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch latest answer set")?;

    Ok(answer_set)
}
