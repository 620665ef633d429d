//! Media Service interface and draft uploads.
//!
//! Posts reference media through [`MediaHandle`]s returned by a
//! [`MediaService`]. A handle is only attached to a post once its upload
//! has completed; a failed or cancelled upload leaves the field unset.

mod local;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::model::{MediaHandle, PostInput};

pub use local::LocalMediaService;

/// Folder used when an upload does not name one.
pub const DEFAULT_FOLDER: &str = "content_planner";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("upload rejected: {0}")]
    Rejected(String),

    #[error("upload cancelled")]
    Cancelled,

    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no media stored under {0:?}")]
    NotFound(String),

    #[error("no media service configured")]
    Unavailable,
}

/// Descriptive data sent along with uploaded bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaMetadata {
    /// Original file name; its extension picks the stored extension.
    pub filename: Option<String>,
    pub content_type: Option<String>,
    /// Provider folder, [`DEFAULT_FOLDER`] when unset.
    pub folder: Option<String>,
}

/// Bytes waiting to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpload {
    pub bytes: Vec<u8>,
    pub metadata: MediaMetadata,
}

impl MediaUpload {
    pub fn new(bytes: impl Into<Vec<u8>>, filename: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            metadata: MediaMetadata {
                filename: Some(filename.into()),
                ..MediaMetadata::default()
            },
        }
    }
}

/// External store for images and video.
#[async_trait]
pub trait MediaService: Send + Sync {
    fn name(&self) -> &str;

    async fn upload(&self, bytes: &[u8], metadata: &MediaMetadata) -> Result<MediaHandle, MediaError>;

    async fn delete(&self, provider_id: &str) -> Result<(), MediaError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn MediaService) {}
};

/// Which media field of a post an upload is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSlot {
    Primary,
    Cover,
}

impl std::fmt::Display for MediaSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Primary => "media",
            Self::Cover => "cover media",
        })
    }
}

/// A post being composed: typed fields plus files not yet uploaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostDraft {
    pub input: PostInput,
    pub pending_media: Option<MediaUpload>,
    pub pending_cover: Option<MediaUpload>,
}

impl PostDraft {
    pub fn new(input: PostInput) -> Self {
        Self {
            input,
            ..Self::default()
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending_media.is_some() || self.pending_cover.is_some()
    }
}

/// Upload `upload`, giving up as soon as `cancel` fires.
pub async fn upload_with_cancel(
    service: &dyn MediaService,
    upload: &MediaUpload,
    cancel: &CancellationToken,
) -> Result<MediaHandle, MediaError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MediaError::Cancelled),
        result = service.upload(&upload.bytes, &upload.metadata) => result,
    }
}

/// Upload the draft's pending files into its input, primary first.
///
/// Each pending file is consumed. On success the handle is stored in the
/// matching input field. On failure that field is left unset, every other
/// field of the draft is kept, and the error names the slot; a pending
/// file not yet attempted stays pending.
pub async fn upload_draft_media(
    service: &dyn MediaService,
    draft: &mut PostDraft,
    cancel: &CancellationToken,
) -> Result<(), (MediaSlot, MediaError)> {
    if let Some(upload) = draft.pending_media.take() {
        draft.input.media = None;
        let handle = upload_with_cancel(service, &upload, cancel)
            .await
            .map_err(|e| (MediaSlot::Primary, e))?;
        draft.input.media = Some(handle);
    }
    if let Some(upload) = draft.pending_cover.take() {
        draft.input.cover_media = None;
        let handle = upload_with_cancel(service, &upload, cancel)
            .await
            .map_err(|e| (MediaSlot::Cover, e))?;
        draft.input.cover_media = Some(handle);
    }
    Ok(())
}
