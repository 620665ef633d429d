use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stored month plan document.
///
/// `document` is opaque at this layer: the engine owns its shape and the
/// database only keeps it durable under its scope key.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MonthPlanRow {
    pub scope_key: String,
    pub document: serde_json::Value,
    /// Incremented on every save.
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

