//! All month plans in one JSON file.
//!
//! The file is an object keyed by month key (`"2025-0"`, ...). A save
//! rewrites only its own entry, then replaces the file through a temporary
//! sibling and a rename so a crash never leaves a half-written file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::{PersistenceError, PlanPersistence};
use crate::keys::MonthKey;

/// File name used inside a data directory.
pub const DEFAULT_FILE_NAME: &str = "plans.json";

#[derive(Debug)]
pub struct FilePersistence {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Storage at `<dir>/plans.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(DEFAULT_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, Value>, PersistenceError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(PersistenceError::Io {
                    action: "read",
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Io {
            action: "parse",
            path: self.path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })
    }

    async fn write_all(&self, all: &BTreeMap<String, Value>) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec_pretty(all).map_err(|e| PersistenceError::Io {
            action: "serialize",
            path: self.path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(io_err("create directory", parent))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(io_err("create", &temp_path))?;
        file.write_all(&bytes)
            .await
            .map_err(io_err("write", &temp_path))?;
        file.sync_all()
            .await
            .map_err(io_err("sync", &temp_path))?;
        drop(file);

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(io_err("replace", &self.path))?;
        Ok(())
    }
}

fn io_err(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError {
    let path = path.to_path_buf();
    move |source| PersistenceError::Io {
        action,
        path,
        source,
    }
}

#[async_trait]
impl PlanPersistence for FilePersistence {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, scope: MonthKey) -> Result<Option<Value>, PersistenceError> {
        Ok(self.read_all().await?.remove(&scope.to_string()))
    }

    async fn save(&self, scope: MonthKey, document: &Value) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all().await?;
        all.insert(scope.to_string(), document.clone());
        self.write_all(&all).await?;
        debug!(scope = %scope, path = %self.path.display(), "month plan written");
        Ok(())
    }

    async fn months(&self) -> Result<Vec<MonthKey>, PersistenceError> {
        Ok(super::month_keys(self.name(), self.read_all().await?.into_keys()))
    }
}
