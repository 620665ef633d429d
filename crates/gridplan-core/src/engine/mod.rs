//! The planner: the command surface over one month plan.
//!
//! A [`Planner`] owns the month plan, the reorder overlay and handles to
//! the persistence and media services. Every successful store mutation:
//!
//! 1. discards the reorder overlay,
//! 2. marks the plan dirty,
//! 3. awaits a save before the command returns.
//!
//! If the save fails the mutation stays applied in memory, the plan stays
//! dirty, and the command reports [`PlanError::Persistence`]; callers retry
//! with [`Planner::save`].

use std::sync::Arc;

use chrono::{NaiveTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{PlanError, Result};
use crate::feed::{self, DEFAULT_CAPACITY, FeedGrid};
use crate::keys::{DateKey, MonthKey};
use crate::media::{self, MediaError, MediaService, MediaSlot, PostDraft};
use crate::model::{Post, PostId, PostInput, PostPatch};
use crate::overlay::{ReorderOverlay, ReorderState};
use crate::persistence::PlanPersistence;
use crate::schedule::{self, MoveOutcome};
use crate::store::{DateBucketStore, MonthPlan};

pub struct Planner {
    plan: MonthPlan,
    overlay: ReorderOverlay,
    capacity: usize,
    persistence: Arc<dyn PlanPersistence>,
    media: Option<Arc<dyn MediaService>>,
    dirty: bool,
}

impl Planner {
    /// Load the plan for `month`, or start an empty one if none is stored.
    pub async fn open(month: MonthKey, persistence: Arc<dyn PlanPersistence>) -> Result<Self> {
        let plan = match persistence.load(month).await? {
            Some(document) => MonthPlan::from_document(month, document)?,
            None => MonthPlan::empty(month),
        };
        info!(
            month = %month,
            backend = persistence.name(),
            posts = plan.store().post_count(),
            "month plan loaded"
        );
        Ok(Self {
            plan,
            overlay: ReorderOverlay::new(),
            capacity: DEFAULT_CAPACITY,
            persistence,
            media: None,
            dirty: false,
        })
    }

    /// Grid slot count used by [`Self::derive_feed_grid`].
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self.overlay.reset();
        self
    }

    pub fn with_media_service(mut self, media: Arc<dyn MediaService>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn month(&self) -> MonthKey {
        self.plan.month()
    }

    pub fn plan(&self) -> &MonthPlan {
        &self.plan
    }

    pub fn store(&self) -> &DateBucketStore {
        self.plan.store()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether in-memory changes have not been stored yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // -----------------------------------------------------------------------
    // Scheduling commands
    // -----------------------------------------------------------------------

    pub async fn add_post(&mut self, date: DateKey, input: PostInput) -> Result<Post> {
        let post = schedule::add_post(self.plan.store_mut(), date, input, Utc::now())?;
        self.commit().await?;
        Ok(post)
    }

    /// Upload the draft's pending files, then add the post.
    ///
    /// When an upload fails nothing is added; the draft keeps its typed
    /// fields with the failed media field unset.
    pub async fn add_draft(
        &mut self,
        date: DateKey,
        draft: &mut PostDraft,
        cancel: &CancellationToken,
    ) -> Result<Post> {
        self.upload_draft_media(draft, cancel).await?;
        self.add_post(date, draft.input.clone()).await
    }

    pub async fn move_post(&mut self, post_id: &PostId, from: DateKey, to: DateKey) -> Result<MoveOutcome> {
        let outcome = schedule::move_post(self.plan.store_mut(), post_id, from, to, Utc::now())?;
        if outcome == MoveOutcome::Moved {
            self.commit().await?;
        }
        Ok(outcome)
    }

    pub async fn update_post(&mut self, post_id: &PostId, date: DateKey, patch: PostPatch) -> Result<Post> {
        let post = schedule::update_post(self.plan.store_mut(), post_id, date, patch, Utc::now())?;
        self.commit().await?;
        Ok(post)
    }

    pub async fn delete_post(&mut self, post_id: &PostId, date: DateKey) -> Result<Post> {
        let post = schedule::delete_post(self.plan.store_mut(), post_id, date)?;
        self.commit().await?;
        Ok(post)
    }

    /// Move a post and optionally change its time of day, saved once.
    pub async fn reschedule(
        &mut self,
        post_id: &PostId,
        from: DateKey,
        to: DateKey,
        time: Option<NaiveTime>,
    ) -> Result<Post> {
        let now = Utc::now();
        let store = self.plan.store_mut();
        let outcome = schedule::move_post(store, post_id, from, to, now)?;
        let post = match time {
            Some(time) => {
                let patch = PostPatch {
                    scheduled_time: Some(time),
                    ..PostPatch::default()
                };
                schedule::update_post(store, post_id, to, patch, now)?
            }
            None => {
                let post = store
                    .get(to, post_id)
                    .cloned()
                    .ok_or_else(|| PlanError::not_found(post_id, to))?;
                if outcome == MoveOutcome::Unchanged {
                    return Ok(post);
                }
                post
            }
        };
        self.commit().await?;
        Ok(post)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn list_for_date(&self, date: DateKey) -> &[Post] {
        self.store().list_for_date(date)
    }

    /// Every bucket of the month in date order.
    pub fn list_month(&self) -> impl Iterator<Item = (DateKey, &[Post])> {
        self.store().buckets()
    }

    pub fn find_post(&self, post_id: &PostId) -> Option<(DateKey, &Post)> {
        self.store().find(post_id)
    }

    /// The pure chronological grid, ignoring any overlay.
    pub fn derive_feed_grid(&self) -> FeedGrid {
        feed::derive(self.month(), self.store(), self.capacity)
    }

    /// The grid as currently displayed, overlay included.
    pub fn displayed_grid(&self) -> FeedGrid {
        let derived = self.derive_feed_grid();
        self.overlay.displayed(&derived).clone()
    }

    // -----------------------------------------------------------------------
    // Reorder overlay
    // -----------------------------------------------------------------------

    pub fn overlay_state(&self) -> &ReorderState {
        self.overlay.state()
    }

    pub fn arm_swap(&mut self, index: usize) -> Result<()> {
        let derived = self.derive_feed_grid();
        self.overlay.arm_swap(index, &derived)?;
        Ok(())
    }

    pub fn confirm_swap(&mut self, index: usize) -> Result<FeedGrid> {
        let derived = self.derive_feed_grid();
        self.overlay.confirm_swap(index, &derived)?;
        Ok(self.overlay.displayed(&derived).clone())
    }

    pub fn cancel_swap(&mut self) {
        self.overlay.cancel_swap();
    }

    /// Arm or confirm depending on the current state, like a click on a
    /// grid slot.
    pub fn select_slot(&mut self, index: usize) -> Result<()> {
        let derived = self.derive_feed_grid();
        self.overlay.select(index, &derived)?;
        Ok(())
    }

    /// Drop the overlay and return the pure derivation.
    pub fn reset_to_chronological(&mut self) -> FeedGrid {
        self.overlay.reset();
        debug!(month = %self.month(), "grid reset to chronological order");
        self.derive_feed_grid()
    }

    // -----------------------------------------------------------------------
    // Media
    // -----------------------------------------------------------------------

    fn media_service(&self) -> std::result::Result<&Arc<dyn MediaService>, MediaError> {
        self.media.as_ref().ok_or(MediaError::Unavailable)
    }

    /// Upload a draft's pending files into its input fields.
    pub async fn upload_draft_media(&self, draft: &mut PostDraft, cancel: &CancellationToken) -> Result<()> {
        if !draft.has_pending() {
            return Ok(());
        }
        let service = self.media_service().map_err(PlanError::MediaUpload)?;
        media::upload_draft_media(service.as_ref(), draft, cancel)
            .await
            .map_err(|(slot, source)| {
                warn!(slot = %slot, service = service.name(), error = %source, "media upload failed");
                PlanError::MediaUpload(source)
            })
    }

    /// Delete a post's media (or cover) from the media service and clear
    /// the field. The post is untouched if the delete fails.
    pub async fn remove_media(&mut self, post_id: &PostId, date: DateKey, slot: MediaSlot) -> Result<Post> {
        self.edit_post(post_id, date, PostPatch::default(), &[slot]).await
    }

    /// Apply `patch` and clear the media in `clear`, saved once.
    ///
    /// The patch, the post and every cleared slot are checked before any
    /// stored media is deleted, so a rejected edit deletes nothing. If a
    /// delete fails, slots already deleted are still cleared and saved and
    /// the rest of the edit is dropped.
    pub async fn edit_post(
        &mut self,
        post_id: &PostId,
        date: DateKey,
        mut patch: PostPatch,
        clear: &[MediaSlot],
    ) -> Result<Post> {
        schedule::check_update(self.store(), post_id, date, &patch)?;
        let post = self
            .store()
            .get(date, post_id)
            .ok_or_else(|| PlanError::not_found(post_id, date))?;

        let mut deletions = Vec::with_capacity(clear.len());
        for &slot in clear {
            let (handle, replacement) = match slot {
                MediaSlot::Primary => (post.media.as_ref(), &patch.media),
                MediaSlot::Cover => (post.cover_media.as_ref(), &patch.cover_media),
            };
            if replacement.is_some() {
                return Err(PlanError::validation(format!(
                    "{slot} cannot be both replaced and cleared"
                )));
            }
            let handle = handle.ok_or_else(|| PlanError::validation(format!("post {post_id} has no {slot}")))?;
            deletions.push((slot, handle.provider_id.clone()));
        }
        if deletions.iter().any(|(_, provider_id)| provider_id.is_some()) {
            self.media_service().map_err(PlanError::MediaDelete)?;
        }

        let mut cleared = PostPatch::default();
        for (slot, provider_id) in deletions {
            if let Some(provider_id) = provider_id {
                let service = self.media_service().map_err(PlanError::MediaDelete)?;
                if let Err(e) = service.delete(&provider_id).await {
                    warn!(post_id = %post_id, provider_id = %provider_id, error = %e, "media delete failed");
                    if !cleared.is_empty() {
                        self.update_post(post_id, date, cleared).await?;
                    }
                    return Err(PlanError::MediaDelete(e));
                }
            }
            match slot {
                MediaSlot::Primary => {
                    cleared.media = Some(None);
                    patch.media = Some(None);
                }
                MediaSlot::Cover => {
                    cleared.cover_media = Some(None);
                    patch.cover_media = Some(None);
                }
            }
        }

        if patch.is_empty() {
            return self
                .store()
                .get(date, post_id)
                .cloned()
                .ok_or_else(|| PlanError::not_found(post_id, date));
        }
        self.update_post(post_id, date, patch).await
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Store the current plan. Clears the dirty flag on success.
    pub async fn save(&mut self) -> Result<()> {
        let month = self.month();
        let document = self.plan.to_document()?;
        if let Err(e) = self.persistence.save(month, &document).await {
            warn!(month = %month, backend = self.persistence.name(), error = %e, "month plan not saved");
            return Err(e.into());
        }
        self.dirty = false;
        info!(month = %month, backend = self.persistence.name(), "month plan saved");
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if self.overlay.invalidate() {
            debug!(month = %self.month(), "reorder overlay discarded after store change");
        }
        self.dirty = true;
        self.save().await
    }
}
