//! The persisted month plan document.
//!
//! A document is a JSON object holding the bucket store under `posts` next
//! to planning fields this engine does not own (goals, pillars, analytics,
//! ...). Those siblings are kept verbatim and written back untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::DateBucketStore;
use crate::keys::{DateKey, MonthKey};
use crate::model::Post;
use crate::persistence::PersistenceError;

#[derive(Deserialize)]
struct DocumentIn {
    #[serde(default)]
    posts: Option<BTreeMap<DateKey, Vec<Post>>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Serialize)]
struct DocumentOut<'a> {
    posts: &'a BTreeMap<DateKey, Vec<Post>>,
    #[serde(flatten)]
    extra: &'a Map<String, Value>,
}

/// A month's schedule plus the sibling fields stored beside it.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthPlan {
    store: DateBucketStore,
    extra: Map<String, Value>,
}

impl MonthPlan {
    pub fn empty(month: MonthKey) -> Self {
        Self {
            store: DateBucketStore::new(month),
            extra: Map::new(),
        }
    }

    /// Decode a stored document, normalizing legacy post shapes and
    /// enforcing store invariants.
    pub fn from_document(month: MonthKey, document: Value) -> Result<Self, PersistenceError> {
        let decoded: DocumentIn =
            serde_json::from_value(document).map_err(|e| PersistenceError::Malformed {
                scope: month,
                reason: e.to_string(),
            })?;
        let store = DateBucketStore::from_buckets(month, decoded.posts.unwrap_or_default())
            .map_err(|e| PersistenceError::Malformed {
                scope: month,
                reason: e.to_string(),
            })?;
        Ok(Self {
            store,
            extra: decoded.extra,
        })
    }

    /// Encode for the persistence service.
    pub fn to_document(&self) -> Result<Value, PersistenceError> {
        serde_json::to_value(DocumentOut {
            posts: self.store.raw_buckets(),
            extra: &self.extra,
        })
        .map_err(|source| PersistenceError::Encode {
            scope: self.store.month(),
            source,
        })
    }

    pub fn month(&self) -> MonthKey {
        self.store.month()
    }

    pub fn store(&self) -> &DateBucketStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut DateBucketStore {
        &mut self.store
    }

    /// Sibling fields this engine carries but does not interpret.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}
