//! The date bucket store: the authoritative schedule for one month.
//!
//! Buckets map a [`DateKey`] to the posts scheduled on that date, in
//! insertion order. The store upholds two invariants at all times:
//!
//! - a bucket that exists is never empty;
//! - a post id appears in at most one bucket, at most once.
//!
//! Mutation is crate-private; callers go through [`crate::schedule`] or
//! [`crate::engine::Planner`].

mod document;

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::keys::{DateKey, MonthKey};
use crate::model::{Post, PostId};

pub use document::MonthPlan;

/// A broken store invariant, found while loading or checking a store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("bucket {0} is empty")]
    EmptyBucket(DateKey),

    #[error("bucket {date} lies outside month {month}")]
    OutsideMonth { date: DateKey, month: MonthKey },

    #[error("post {post_id} appears in both {first} and {second}")]
    DuplicatePost {
        post_id: PostId,
        first: DateKey,
        second: DateKey,
    },
}

/// Posts of one month, bucketed by date.
#[derive(Debug, Clone, PartialEq)]
pub struct DateBucketStore {
    month: MonthKey,
    buckets: BTreeMap<DateKey, Vec<Post>>,
}

impl DateBucketStore {
    /// An empty store for `month`.
    pub fn new(month: MonthKey) -> Self {
        Self {
            month,
            buckets: BTreeMap::new(),
        }
    }

    /// Build a store from raw buckets, dropping empty lists and rejecting
    /// anything else that breaks an invariant.
    pub fn from_buckets(
        month: MonthKey,
        mut buckets: BTreeMap<DateKey, Vec<Post>>,
    ) -> Result<Self, IntegrityError> {
        buckets.retain(|_, posts| !posts.is_empty());
        let store = Self { month, buckets };
        store.check_integrity()?;
        Ok(store)
    }

    pub fn month(&self) -> MonthKey {
        self.month
    }

    /// Posts scheduled on `date`, in bucket order. Empty when no bucket exists.
    pub fn list_for_date(&self, date: DateKey) -> &[Post] {
        self.buckets.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All buckets in ascending date order.
    pub fn buckets(&self) -> impl Iterator<Item = (DateKey, &[Post])> {
        self.buckets.iter().map(|(date, posts)| (*date, posts.as_slice()))
    }

    /// Every post paired with the bucket holding it: buckets in date order,
    /// posts in bucket order.
    pub fn posts(&self) -> impl Iterator<Item = (DateKey, &Post)> {
        self.buckets
            .iter()
            .flat_map(|(date, posts)| posts.iter().map(move |post| (*date, post)))
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn post_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Locate a post anywhere in the month.
    pub fn find(&self, post_id: &PostId) -> Option<(DateKey, &Post)> {
        self.posts().find(|(_, post)| &post.id == post_id)
    }

    /// The post with `post_id` inside the `date` bucket.
    pub fn get(&self, date: DateKey, post_id: &PostId) -> Option<&Post> {
        self.list_for_date(date).iter().find(|post| &post.id == post_id)
    }

    /// Verify every store invariant.
    pub fn check_integrity(&self) -> Result<(), IntegrityError> {
        let mut seen: HashMap<&PostId, DateKey> = HashMap::new();
        for (date, posts) in &self.buckets {
            if posts.is_empty() {
                return Err(IntegrityError::EmptyBucket(*date));
            }
            if !self.month.contains(*date) {
                return Err(IntegrityError::OutsideMonth {
                    date: *date,
                    month: self.month,
                });
            }
            for post in posts {
                if let Some(first) = seen.insert(&post.id, *date) {
                    return Err(IntegrityError::DuplicatePost {
                        post_id: post.id.clone(),
                        first,
                        second: *date,
                    });
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Crate-private mutation
    // -----------------------------------------------------------------------

    /// Append `post` to the end of the `date` bucket, creating it if needed.
    pub(crate) fn push(&mut self, date: DateKey, post: Post) -> &Post {
        let bucket = self.buckets.entry(date).or_default();
        bucket.push(post);
        &bucket[bucket.len() - 1]
    }

    /// Remove a post from the `date` bucket, dropping the bucket when it
    /// becomes empty.
    pub(crate) fn remove(&mut self, date: DateKey, post_id: &PostId) -> Option<Post> {
        let bucket = self.buckets.get_mut(&date)?;
        let index = bucket.iter().position(|post| &post.id == post_id)?;
        let post = bucket.remove(index);
        if bucket.is_empty() {
            self.buckets.remove(&date);
        }
        Some(post)
    }

    pub(crate) fn get_mut(&mut self, date: DateKey, post_id: &PostId) -> Option<&mut Post> {
        self.buckets
            .get_mut(&date)?
            .iter_mut()
            .find(|post| &post.id == post_id)
    }

    pub(crate) fn contains_id(&self, post_id: &PostId) -> bool {
        self.find(post_id).is_some()
    }

    pub(crate) fn raw_buckets(&self) -> &BTreeMap<DateKey, Vec<Post>> {
        &self.buckets
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::PostType;

    fn post(id: &str) -> Post {
        let now = Utc::now();
        Post {
            id: PostId::from(id),
            post_type: PostType::Post,
            category: None,
            pillar: None,
            topic: None,
            caption: None,
            notes: None,
            audio_link: None,
            media: None,
            cover_media: None,
            scheduled_date: None,
            scheduled_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn jan() -> MonthKey {
        MonthKey::new(2025, 0).unwrap()
    }

    fn day(d: u32) -> DateKey {
        DateKey::from_ymd(2025, 1, d).unwrap()
    }

    #[test]
    fn push_appends_and_remove_drops_empty_bucket() {
        let mut store = DateBucketStore::new(jan());
        store.push(day(3), post("a"));
        store.push(day(3), post("b"));
        let ids: Vec<_> = store.list_for_date(day(3)).iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);

        assert!(store.remove(day(3), &PostId::from("a")).is_some());
        assert_eq!(store.bucket_count(), 1);
        assert!(store.remove(day(3), &PostId::from("b")).is_some());
        assert_eq!(store.bucket_count(), 0);
        assert!(store.list_for_date(day(3)).is_empty());
    }

    #[test]
    fn remove_missing_is_none() {
        let mut store = DateBucketStore::new(jan());
        store.push(day(3), post("a"));
        assert!(store.remove(day(4), &PostId::from("a")).is_none());
        assert!(store.remove(day(3), &PostId::from("zzz")).is_none());
        assert_eq!(store.post_count(), 1);
    }

    #[test]
    fn find_reports_bucket() {
        let mut store = DateBucketStore::new(jan());
        store.push(day(9), post("a"));
        let (date, found) = store.find(&PostId::from("a")).unwrap();
        assert_eq!(date, day(9));
        assert_eq!(found.id.as_str(), "a");
    }

    #[test]
    fn from_buckets_drops_empty_lists() {
        let mut raw = BTreeMap::new();
        raw.insert(day(1), vec![]);
        raw.insert(day(2), vec![post("a")]);
        let store = DateBucketStore::from_buckets(jan(), raw).unwrap();
        assert_eq!(store.bucket_count(), 1);
    }

    #[test]
    fn from_buckets_rejects_duplicates() {
        let mut raw = BTreeMap::new();
        raw.insert(day(1), vec![post("a")]);
        raw.insert(day(2), vec![post("a")]);
        let err = DateBucketStore::from_buckets(jan(), raw).unwrap_err();
        assert!(matches!(err, IntegrityError::DuplicatePost { .. }));
    }

    #[test]
    fn from_buckets_rejects_other_months() {
        let mut raw = BTreeMap::new();
        raw.insert(DateKey::from_ymd(2025, 2, 1).unwrap(), vec![post("a")]);
        let err = DateBucketStore::from_buckets(jan(), raw).unwrap_err();
        assert!(matches!(err, IntegrityError::OutsideMonth { .. }));
    }
}
