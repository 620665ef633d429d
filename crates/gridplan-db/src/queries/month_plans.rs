//! Database query functions for the `month_plans` table.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::MonthPlanRow;

/// Fetch the month plan stored under `scope_key`.
pub async fn get_month_plan(pool: &PgPool, scope_key: &str) -> Result<Option<MonthPlanRow>> {
    let row = sqlx::query_as::<_, MonthPlanRow>("SELECT * FROM month_plans WHERE scope_key = $1")
        .bind(scope_key)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("failed to fetch month plan {scope_key}"))?;

    Ok(row)
}

/// Insert or replace the document stored under `scope_key`.
///
/// Returns the stored row with its bumped revision.
pub async fn upsert_month_plan(
    pool: &PgPool,
    scope_key: &str,
    document: &serde_json::Value,
) -> Result<MonthPlanRow> {
    let row = sqlx::query_as::<_, MonthPlanRow>(
        "INSERT INTO month_plans (scope_key, document) \
         VALUES ($1, $2) \
         ON CONFLICT (scope_key) DO UPDATE \
         SET document = EXCLUDED.document, \
             revision = month_plans.revision + 1, \
             updated_at = now() \
         RETURNING *",
    )
    .bind(scope_key)
    .bind(document)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to save month plan {scope_key}"))?;

    Ok(row)
}

/// Scope keys of every stored month plan.
pub async fn list_scope_keys(pool: &PgPool) -> Result<Vec<String>> {
    let keys = sqlx::query_scalar::<_, String>("SELECT scope_key FROM month_plans ORDER BY scope_key")
        .fetch_all(pool)
        .await
        .context("failed to list month plans")?;

    Ok(keys)
}
