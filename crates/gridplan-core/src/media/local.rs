//! Media stored in a local directory, addressed by content hash.
//!
//! An upload lands at `<root>/<folder>/<sha256>.<ext>`. Its provider id is
//! `<folder>/<sha256>`, so identical bytes in one folder share a file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info};

use super::{DEFAULT_FOLDER, MediaError, MediaMetadata, MediaService};
use crate::model::MediaHandle;

#[derive(Debug, Clone)]
pub struct LocalMediaService {
    root: PathBuf,
    base_url: Option<String>,
}

impl LocalMediaService {
    /// Store under `root`, handing out `file://` URLs.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_url: None,
        }
    }

    /// Hand out `<base_url>/<folder>/<file>` URLs instead, for a root that
    /// is served over HTTP.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_owned());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn url_for(&self, folder: &str, file_name: &str, path: &Path) -> String {
        match &self.base_url {
            Some(base) => format!("{base}/{folder}/{file_name}"),
            None => format!("file://{}", path.display()),
        }
    }
}

/// Folder names are relative paths of plain segments.
fn check_folder(folder: &str) -> Result<(), MediaError> {
    let valid = !folder.is_empty()
        && folder.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        });
    if valid {
        Ok(())
    } else {
        Err(MediaError::Rejected(format!("invalid folder {folder:?}")))
    }
}

fn extension(metadata: &MediaMetadata) -> String {
    let from_name = metadata
        .filename
        .as_deref()
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase);
    if let Some(ext) = from_name {
        return ext;
    }
    let from_type = match metadata.content_type.as_deref() {
        Some("image/jpeg") => "jpg",
        Some("image/png") => "png",
        Some("image/gif") => "gif",
        Some("image/webp") => "webp",
        Some("video/mp4") => "mp4",
        Some("video/quicktime") => "mov",
        _ => "bin",
    };
    from_type.to_owned()
}

#[async_trait]
impl MediaService for LocalMediaService {
    fn name(&self) -> &str {
        "local"
    }

    async fn upload(&self, bytes: &[u8], metadata: &MediaMetadata) -> Result<MediaHandle, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Rejected("empty upload".into()));
        }
        let folder = metadata.folder.as_deref().unwrap_or(DEFAULT_FOLDER);
        check_folder(folder)?;

        let hash = hex::encode(Sha256::digest(bytes));
        let file_name = format!("{hash}.{}", extension(metadata));
        let dir = self.root.join(folder);
        let path = dir.join(&file_name);

        fs::create_dir_all(&dir).await.map_err(|source| MediaError::Io {
            action: "create directory",
            path: dir.clone(),
            source,
        })?;
        if fs::try_exists(&path).await.unwrap_or(false) {
            debug!(path = %path.display(), "media already stored");
        } else {
            fs::write(&path, bytes).await.map_err(|source| MediaError::Io {
                action: "write",
                path: path.clone(),
                source,
            })?;
            info!(path = %path.display(), size = bytes.len(), "media stored");
        }

        Ok(MediaHandle {
            url: self.url_for(folder, &file_name, &path),
            provider_id: Some(format!("{folder}/{hash}")),
        })
    }

    async fn delete(&self, provider_id: &str) -> Result<(), MediaError> {
        let (folder, hash) = provider_id
            .rsplit_once('/')
            .ok_or_else(|| MediaError::NotFound(provider_id.to_owned()))?;
        check_folder(folder)?;
        if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MediaError::NotFound(provider_id.to_owned()));
        }

        let dir = self.root.join(folder);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::NotFound(provider_id.to_owned()));
            }
            Err(source) => {
                return Err(MediaError::Io {
                    action: "read directory",
                    path: dir,
                    source,
                });
            }
        };

        while let Some(entry) = entries.next_entry().await.map_err(|source| MediaError::Io {
            action: "read directory",
            path: dir.clone(),
            source,
        })? {
            let path = entry.path();
            if path.file_stem().and_then(|s| s.to_str()) == Some(hash) {
                fs::remove_file(&path).await.map_err(|source| MediaError::Io {
                    action: "remove",
                    path: path.clone(),
                    source,
                })?;
                info!(path = %path.display(), "media removed");
                return Ok(());
            }
        }
        Err(MediaError::NotFound(provider_id.to_owned()))
    }
}
