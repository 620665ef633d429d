//! The Persistence Service interface and its backends.
//!
//! A backend stores one opaque JSON document per [`MonthKey`]. Documents
//! are whole-month snapshots: every save replaces the previous one.
//!
//! - [`MemoryPersistence`] keeps documents in process (tests, dry runs).
//! - [`FilePersistence`] keeps all months in one JSON file on disk.
//! - [`PgPersistence`] keeps them in the `month_plans` table.

mod file;
mod memory;
mod postgres;

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::keys::MonthKey;

pub use file::FilePersistence;
pub use memory::MemoryPersistence;
pub use postgres::PgPersistence;

/// A load or save that did not complete.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode month plan {scope}: {source}")]
    Encode {
        scope: MonthKey,
        #[source]
        source: serde_json::Error,
    },

    #[error("stored month plan {scope} is malformed: {reason}")]
    Malformed { scope: MonthKey, reason: String },

    #[error("database error for month plan {scope}: {source:#}")]
    Database {
        scope: MonthKey,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to list stored month plans: {0:#}")]
    Listing(#[source] anyhow::Error),
}

/// Storage for month plan documents.
///
/// `save` replaces the whole document for `scope`. Implementations must
/// leave other scopes untouched.
#[async_trait]
pub trait PlanPersistence: Send + Sync {
    /// Short backend name for logs (e.g. "file", "postgres").
    fn name(&self) -> &str;

    /// The document stored under `scope`, or `None` if nothing was saved yet.
    async fn load(&self, scope: MonthKey) -> Result<Option<Value>, PersistenceError>;

    async fn save(&self, scope: MonthKey, document: &Value) -> Result<(), PersistenceError>;

    /// Every month with a stored document, oldest first.
    async fn months(&self) -> Result<Vec<MonthKey>, PersistenceError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn PlanPersistence) {}
};

/// Parse stored scope keys into sorted month keys. Keys that are not month
/// keys are skipped.
fn month_keys<I>(backend: &str, keys: I) -> Vec<MonthKey>
where
    I: IntoIterator<Item = String>,
{
    let mut months: Vec<MonthKey> = keys
        .into_iter()
        .filter_map(|key| match key.parse() {
            Ok(month) => Some(month),
            Err(_) => {
                tracing::warn!(backend, scope = %key, "ignoring stored plan with unknown scope key");
                None
            }
        })
        .collect();
    months.sort();
    months
}
