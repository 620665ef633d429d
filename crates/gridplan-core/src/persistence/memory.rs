use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{PersistenceError, PlanPersistence};
use crate::keys::MonthKey;

/// In-process document storage.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    documents: Mutex<HashMap<MonthKey, Value>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `document` already stored under `scope`.
    pub fn with_document(scope: MonthKey, document: Value) -> Self {
        Self {
            documents: Mutex::new(HashMap::from([(scope, document)])),
        }
    }

    /// A copy of the document currently stored under `scope`.
    pub async fn snapshot(&self, scope: MonthKey) -> Option<Value> {
        self.documents.lock().await.get(&scope).cloned()
    }
}

#[async_trait]
impl PlanPersistence for MemoryPersistence {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, scope: MonthKey) -> Result<Option<Value>, PersistenceError> {
        Ok(self.snapshot(scope).await)
    }

    async fn save(&self, scope: MonthKey, document: &Value) -> Result<(), PersistenceError> {
        self.documents.lock().await.insert(scope, document.clone());
        Ok(())
    }

    async fn months(&self) -> Result<Vec<MonthKey>, PersistenceError> {
        let mut months: Vec<MonthKey> = self.documents.lock().await.keys().copied().collect();
        months.sort();
        Ok(months)
    }
}
