//! Database query functions for the `entitlements` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Entitlement, EntitlementTier};

/// Fetch a user's entitlement, creating a default `free` row on first read.
///
/// Gated actions call this immediately before authorizing so the decision
/// never runs on a stale tier.
pub async fn get_or_default_entitlement(pool: &PgPool, user_id: Uuid) -> Result<Entitlement> {
    sqlx::query("INSERT INTO entitlements (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(pool)
        .await
        .context("failed to insert default entitlement")?;

    let entitlement =
        sqlx::query_as::<_, Entitlement>("SELECT * FROM entitlements WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .context("failed to fetch entitlement")?;

    Ok(entitlement)
}

/// Set a user's tier. Only the billing process (or its admin stand-in)
/// should call this.
pub async fn set_entitlement_tier(
    pool: &PgPool,
    user_id: Uuid,
    tier: EntitlementTier,
) -> Result<Entitlement> {
    let entitlement = sqlx::query_as::<_, Entitlement>(
        "INSERT INTO entitlements (user_id, tier) VALUES ($1, $2) \
         ON CONFLICT (user_id) DO UPDATE SET tier = EXCLUDED.tier, updated_at = now() \
         RETURNING *",
    )
    .bind(user_id)
    .bind(tier)
    .fetch_one(pool)
    .await
    .context("failed to set entitlement tier")?;

    Ok(entitlement)
}
