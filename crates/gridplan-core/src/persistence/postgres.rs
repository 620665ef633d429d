use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::debug;

use gridplan_db::queries::month_plans as db;

use super::{PersistenceError, PlanPersistence};
use crate::keys::MonthKey;

/// Month plans stored in the `month_plans` table.
#[derive(Debug, Clone)]
pub struct PgPersistence {
    pool: PgPool,
}

impl PgPersistence {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PlanPersistence for PgPersistence {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn load(&self, scope: MonthKey) -> Result<Option<Value>, PersistenceError> {
        let row = db::get_month_plan(&self.pool, &scope.to_string())
            .await
            .map_err(|source| PersistenceError::Database { scope, source })?;
        Ok(row.map(|r| r.document))
    }

    async fn save(&self, scope: MonthKey, document: &Value) -> Result<(), PersistenceError> {
        let row = db::upsert_month_plan(&self.pool, &scope.to_string(), document)
            .await
            .map_err(|source| PersistenceError::Database { scope, source })?;
        debug!(scope = %scope, revision = row.revision, "month plan stored");
        Ok(())
    }

    async fn months(&self) -> Result<Vec<MonthKey>, PersistenceError> {
        let keys = db::list_scope_keys(&self.pool)
            .await
            .map_err(PersistenceError::Listing)?;
        Ok(super::month_keys(self.name(), keys))
    }
}
