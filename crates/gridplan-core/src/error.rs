//! Error taxonomy for engine commands.

use thiserror::Error;

use crate::keys::DateKey;
use crate::media::MediaError;
use crate::model::PostId;
use crate::overlay::OverlayError;
use crate::persistence::PersistenceError;

/// Every failure a [`crate::engine::Planner`] command can report.
///
/// `Validation` and `NotFound` guarantee the store was not touched.
/// `Persistence` means the in-memory plan changed but was not durably
/// stored; the plan stays dirty until a later save succeeds.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("post {post_id} not found on {date_key}")]
    NotFound { post_id: PostId, date_key: DateKey },

    #[error("media upload failed: {0}")]
    MediaUpload(MediaError),

    #[error("media delete failed: {0}")]
    MediaDelete(MediaError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Overlay(#[from] OverlayError),
}

impl PlanError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn not_found(post_id: &PostId, date_key: DateKey) -> Self {
        Self::NotFound {
            post_id: post_id.clone(),
            date_key,
        }
    }
}

pub type Result<T, E = PlanError> = std::result::Result<T, E>;
