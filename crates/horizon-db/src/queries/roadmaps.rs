//! Database query functions for the `roadmaps` table.
//!
//! The table is append-only: every generation attempt inserts a new row and
//! `latest_roadmap` decides which one is current. The create path goes
//! through [`insert_roadmap_if_absent`] so a double-submitted "create" cannot
//! produce two rows for the same answer set.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{RoadmapRecord, RoadmapSource};

/// Insert a new roadmap row. Returns the inserted row with server-generated
/// defaults (id, created_at). Never overwrites an existing row.
pub async fn insert_roadmap(
    pool: &PgPool,
    user_id: Uuid,
    answer_set_id: Uuid,
    source: RoadmapSource,
    roadmap: &serde_json::Value,
) -> Result<RoadmapRecord> {
    let record = sqlx::query_as::<_, RoadmapRecord>(
        "INSERT INTO roadmaps (user_id, answer_set_id, source, roadmap) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(user_id)
    .bind(answer_set_id)
    .bind(source)
    .bind(roadmap)
    .fetch_one(pool)
    .await
    .context("failed to insert roadmap")?;

    Ok(record)
}

/// Insert a roadmap only if no roadmap exists yet for (user, answer set).
///
/// Returns `None` when a row already exists, which a concurrent "create"
/// request would have inserted first. A transaction-scoped advisory lock on
/// (user, answer set) serializes racing creates; a plain NOT EXISTS check
/// alone would let two concurrent inserts both pass under READ COMMITTED.
pub async fn insert_roadmap_if_absent(
    pool: &PgPool,
    user_id: Uuid,
    answer_set_id: Uuid,
    source: RoadmapSource,
    roadmap: &serde_json::Value,
) -> Result<Option<RoadmapRecord>> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text || $2::text, 0))")
        .bind(user_id)
        .bind(answer_set_id)
        .execute(&mut *tx)
        .await
        .context("failed to take roadmap create lock")?;

    let record = sqlx::query_as::<_, RoadmapRecord>(
        "INSERT INTO roadmaps (user_id, answer_set_id, source, roadmap) \
         SELECT $1, $2, $3, $4 \
         WHERE NOT EXISTS ( \
             SELECT 1 FROM roadmaps \
             WHERE user_id = $1 AND answer_set_id = $2 \
         ) \
         RETURNING *",
    )
    .bind(user_id)
    .bind(answer_set_id)
    .bind(source)
    .bind(roadmap)
    .fetch_optional(&mut *tx)
    .await
    .context("failed to conditionally insert roadmap")?;

    tx.commit().await.context("failed to commit transaction")?;

    Ok(record)
}

/// Fetch a roadmap by ID, scoped to its owner.
pub async fn get_roadmap(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<Option<RoadmapRecord>> {
    let record =
        sqlx::query_as::<_, RoadmapRecord>("SELECT * FROM roadmaps WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch roadmap")?;

    Ok(record)
}

/// Fetch the most recently created roadmap for (user, answer set).
pub async fn latest_roadmap(
    pool: &PgPool,
    user_id: Uuid,
    answer_set_id: Uuid,
) -> Result<Option<RoadmapRecord>> {
    let record = sqlx::query_as::<_, RoadmapRecord>(
        "SELECT * FROM roadmaps \
         WHERE user_id = $1 AND answer_set_id = $2 \
         ORDER BY created_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(user_id)
    .bind(answer_set_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch latest roadmap")?;

    Ok(record)
}

/// List the full generation history for (user, answer set), newest first.
pub async fn list_roadmaps_for_answer_set(
    pool: &PgPool,
    user_id: Uuid,
    answer_set_id: Uuid,
) -> Result<Vec<RoadmapRecord>> {
    let records = sqlx::query_as::<_, RoadmapRecord>(
        "SELECT * FROM roadmaps \
         WHERE user_id = $1 AND answer_set_id = $2 \
         ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .bind(answer_set_id)
    .fetch_all(pool)
    .await
    .context("failed to list roadmaps for answer set")?;

    Ok(records)
}
