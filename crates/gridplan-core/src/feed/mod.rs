//! Feed grid derivation.
//!
//! [`derive`] is a pure function of the store: it collects every post of
//! the month, keeps the grid-eligible ones, orders them by effective
//! timestamp and fits them into a fixed number of slots.

use chrono::NaiveDateTime;

use crate::keys::{DateKey, MonthKey};
use crate::model::{MediaHandle, Post};
use crate::store::DateBucketStore;

/// Slot count of the grid view.
pub const DEFAULT_CAPACITY: usize = 30;

/// The grid view lays slots out in rows of this many columns.
pub const GRID_COLUMNS: usize = 3;

/// Whether a post may appear in the feed grid: a grid type carrying media
/// or a cover.
pub fn is_eligible(post: &Post) -> bool {
    post.post_type.is_grid_type() && (post.media.is_some() || post.cover_media.is_some())
}

/// The handle shown as a slot's preview: the cover wins over the media,
/// for every post type.
pub fn preview_media(post: &Post) -> Option<&MediaHandle> {
    post.cover_media.as_ref().or(post.media.as_ref())
}

/// Ordering key for a post held in `bucket`.
///
/// Each part falls back on its own: a missing date uses the bucket's date,
/// a missing time uses 09:00.
pub fn effective_timestamp(post: &Post, bucket: DateKey) -> NaiveDateTime {
    let date = post.scheduled_date.unwrap_or_else(|| bucket.date());
    date.and_time(post.time_or_default())
}

/// Derive the feed grid for `month`.
///
/// Ties on the effective timestamp keep collection order (buckets by
/// ascending date, then list order), so the result is reproducible.
pub fn derive(month: MonthKey, store: &DateBucketStore, capacity: usize) -> FeedGrid {
    let mut eligible: Vec<(NaiveDateTime, &Post)> = store
        .posts()
        .filter(|(date, post)| month.contains(*date) && is_eligible(post))
        .map(|(date, post)| (effective_timestamp(post, date), post))
        .collect();

    // `sort_by_key` is stable.
    eligible.sort_by_key(|(ts, _)| *ts);

    let mut slots: Vec<Option<Post>> = eligible
        .into_iter()
        .take(capacity)
        .map(|(_, post)| Some(post.clone()))
        .collect();
    slots.resize(capacity, None);

    FeedGrid { slots }
}

/// A fixed-capacity feed preview. Empty slots are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedGrid {
    slots: Vec<Option<Post>>,
}

impl FeedGrid {
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Option<Post>] {
        &self.slots
    }

    /// The post in slot `index`; `None` for empty or out-of-range slots.
    pub fn get(&self, index: usize) -> Option<&Post> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Number of non-empty slots.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Preview URL of slot `index`, see [`preview_media`].
    pub fn preview_url(&self, index: usize) -> Option<&str> {
        self.get(index)
            .and_then(preview_media)
            .map(|handle| handle.url.as_str())
    }

    /// Slots grouped into rows of [`GRID_COLUMNS`].
    pub fn rows(&self) -> impl Iterator<Item = &[Option<Post>]> {
        self.slots.chunks(GRID_COLUMNS)
    }

    pub(crate) fn swap(&mut self, a: usize, b: usize) {
        self.slots.swap(a, b);
    }
}
