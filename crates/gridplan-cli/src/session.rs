//! Opens a `Planner` on the configured storage backend.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;

use gridplan_core::media::LocalMediaService;
use gridplan_core::persistence::{FilePersistence, PgPersistence, PlanPersistence};
use gridplan_core::{MonthKey, Planner};
use gridplan_db::pool;

use crate::config::{GridplanConfig, Storage};

/// A connected storage backend. Call [`Session::close`] when done.
pub struct Session {
    persistence: Arc<dyn PlanPersistence>,
    pool: Option<PgPool>,
    capacity: usize,
    media: Arc<LocalMediaService>,
}

impl Session {
    pub async fn connect(config: &GridplanConfig) -> Result<Self> {
        let mut owned_pool = None;
        let persistence: Arc<dyn PlanPersistence> = match &config.storage {
            Storage::File { data_dir } => {
                tracing::debug!(data_dir = %data_dir.display(), "using file storage");
                Arc::new(FilePersistence::in_dir(data_dir))
            }
            Storage::Postgres(db_config) => {
                let db_pool = pool::create_pool(db_config).await?;
                owned_pool = Some(db_pool.clone());
                Arc::new(PgPersistence::new(db_pool))
            }
        };
        Ok(Self {
            persistence,
            pool: owned_pool,
            capacity: config.capacity,
            media: Arc::new(LocalMediaService::new(&config.media_dir)),
        })
    }

    /// Load the planner for `month` with the configured capacity and media store.
    pub async fn planner(&self, month: MonthKey) -> Result<Planner> {
        let planner = Planner::open(month, self.persistence.clone())
            .await
            .with_context(|| format!("failed to open month plan {month}"))?;
        Ok(planner
            .with_capacity(self.capacity)
            .with_media_service(self.media.clone()))
    }

    /// Months with a stored plan, oldest first.
    pub async fn stored_months(&self) -> Result<Vec<MonthKey>> {
        self.persistence
            .months()
            .await
            .with_context(|| format!("failed to list months in {} storage", self.persistence.name()))
    }

    pub async fn close(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
        }
    }
}
