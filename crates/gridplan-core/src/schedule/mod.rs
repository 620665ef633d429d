//! Scheduling operations against a [`DateBucketStore`].
//!
//! Every operation validates before touching the store, so a returned
//! error always means the store is unchanged. Timestamps come from the
//! caller (`now`) and are only ever written here.
//!
//! ```text
//! add_post    : input -> append to bucket(date)           (creates bucket)
//! move_post   : bucket(from) -> end of bucket(to)         (drops empty source,
//!                                                           syncs scheduled_date)
//! update_post : merge patch in place                      (id/created_at kept)
//! delete_post : remove from bucket(date)                  (drops empty bucket)
//! ```

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{PlanError, Result};
use crate::keys::DateKey;
use crate::model::{Post, PostId, PostInput, PostPatch, PostType, clean_text};
use crate::store::DateBucketStore;

/// Result of a [`move_post`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    /// Source and destination were the same bucket; nothing changed.
    Unchanged,
}

fn ensure_in_month(store: &DateBucketStore, date: DateKey) -> Result<()> {
    if store.month().contains(date) {
        Ok(())
    } else {
        Err(PlanError::validation(format!(
            "date {date} is outside month {}",
            store.month()
        )))
    }
}

fn parse_type(raw: &str) -> Result<PostType> {
    raw.parse()
        .map_err(|e: crate::model::PostTypeParseError| PlanError::validation(e.to_string()))
}

/// Create a post from `input` at the end of the `date` bucket.
///
/// The new post's `scheduled_date` is `date`.
pub fn add_post(
    store: &mut DateBucketStore,
    date: DateKey,
    input: PostInput,
    now: DateTime<Utc>,
) -> Result<Post> {
    ensure_in_month(store, date)?;
    let post_type = parse_type(&input.post_type)?;

    let mut id = PostId::generate();
    while store.contains_id(&id) {
        id = PostId::generate();
    }

    let post = Post {
        id,
        post_type,
        category: clean_text(input.category),
        pillar: clean_text(input.pillar),
        topic: clean_text(input.topic),
        caption: clean_text(input.caption),
        notes: clean_text(input.notes),
        audio_link: clean_text(input.audio_link),
        media: input.media,
        cover_media: input.cover_media,
        scheduled_date: Some(date.date()),
        scheduled_time: input.scheduled_time,
        created_at: now,
        updated_at: now,
    };

    debug!(post_id = %post.id, date_key = %date, post_type = %post.post_type, "post added");
    Ok(store.push(date, post).clone())
}

/// Move a post to the end of the `to` bucket.
///
/// The post must live in `from`. Moving within the same bucket is a
/// successful no-op. A moved post's `scheduled_date` becomes `to`; its
/// `scheduled_time` is kept.
pub fn move_post(
    store: &mut DateBucketStore,
    post_id: &PostId,
    from: DateKey,
    to: DateKey,
    now: DateTime<Utc>,
) -> Result<MoveOutcome> {
    ensure_in_month(store, from)?;
    ensure_in_month(store, to)?;
    if store.get(from, post_id).is_none() {
        return Err(PlanError::not_found(post_id, from));
    }
    if from == to {
        return Ok(MoveOutcome::Unchanged);
    }

    let mut post = store
        .remove(from, post_id)
        .ok_or_else(|| PlanError::not_found(post_id, from))?;
    post.scheduled_date = Some(to.date());
    post.updated_at = now;
    store.push(to, post);

    debug!(post_id = %post_id, from = %from, to = %to, "post moved");
    Ok(MoveOutcome::Moved)
}

/// Merge `patch` into the post in place.
///
/// `id`, `created_at` and `scheduled_date` are never changed here; use
/// [`move_post`] to change the date.
pub fn update_post(
    store: &mut DateBucketStore,
    post_id: &PostId,
    date: DateKey,
    patch: PostPatch,
    now: DateTime<Utc>,
) -> Result<Post> {
    let post_type = check_update(store, post_id, date, &patch)?;
    let post = store
        .get_mut(date, post_id)
        .ok_or_else(|| PlanError::not_found(post_id, date))?;

    if let Some(post_type) = post_type {
        post.post_type = post_type;
    }
    merge_text(&mut post.category, patch.category);
    merge_text(&mut post.pillar, patch.pillar);
    merge_text(&mut post.topic, patch.topic);
    merge_text(&mut post.caption, patch.caption);
    merge_text(&mut post.notes, patch.notes);
    merge_text(&mut post.audio_link, patch.audio_link);
    if let Some(media) = patch.media {
        post.media = media;
    }
    if let Some(cover) = patch.cover_media {
        post.cover_media = cover;
    }
    if let Some(time) = patch.scheduled_time {
        post.scheduled_time = Some(time);
    }
    post.updated_at = now;

    debug!(post_id = %post_id, date_key = %date, "post updated");
    Ok(post.clone())
}

/// Run every check [`update_post`] makes without touching the store.
///
/// Returns the parsed replacement type, if the patch carries one.
pub fn check_update(
    store: &DateBucketStore,
    post_id: &PostId,
    date: DateKey,
    patch: &PostPatch,
) -> Result<Option<PostType>> {
    ensure_in_month(store, date)?;
    let post_type = patch.post_type.as_deref().map(parse_type).transpose()?;
    if store.get(date, post_id).is_none() {
        return Err(PlanError::not_found(post_id, date));
    }
    Ok(post_type)
}

fn merge_text(field: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        *field = clean_text(Some(value));
    }
}

/// Remove a post. Deleting an absent post is an error, including a second
/// delete of the same post.
pub fn delete_post(store: &mut DateBucketStore, post_id: &PostId, date: DateKey) -> Result<Post> {
    ensure_in_month(store, date)?;
    let post = store
        .remove(date, post_id)
        .ok_or_else(|| PlanError::not_found(post_id, date))?;
    debug!(post_id = %post_id, date_key = %date, "post deleted");
    Ok(post)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveTime};

    use super::*;
    use crate::keys::MonthKey;
    use crate::model::MediaHandle;

    fn feb() -> DateBucketStore {
        DateBucketStore::new(MonthKey::new(2025, 1).unwrap())
    }

    fn day(d: u32) -> DateKey {
        DateKey::from_ymd(2025, 2, d).unwrap()
    }

    #[test]
    fn add_assigns_id_timestamps_and_date() {
        let mut store = feb();
        let now = Utc::now();
        let post = add_post(&mut store, day(10), PostInput::new("Reel").topic("hook"), now).unwrap();

        assert_eq!(post.post_type, PostType::Reel);
        assert_eq!(post.created_at, now);
        assert_eq!(post.updated_at, now);
        assert_eq!(post.scheduled_date, Some(day(10).date()));
        assert_eq!(store.list_for_date(day(10)), [post]);
    }

    #[test]
    fn add_appends_in_insertion_order() {
        let mut store = feb();
        let now = Utc::now();
        let late = NaiveTime::from_hms_opt(20, 0, 0).unwrap();
        let early = NaiveTime::from_hms_opt(7, 0, 0).unwrap();
        let a = add_post(&mut store, day(1), PostInput::new("Post").at(late), now).unwrap();
        let b = add_post(&mut store, day(1), PostInput::new("Post").at(early), now).unwrap();
        let ids: Vec<_> = store.list_for_date(day(1)).iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, [a.id, b.id]);
    }

    #[test]
    fn add_rejects_unknown_type_without_mutation() {
        let mut store = feb();
        let err = add_post(&mut store, day(1), PostInput::new("Tweet"), Utc::now()).unwrap_err();
        assert!(matches!(err, PlanError::Validation(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn add_rejects_other_month() {
        let mut store = feb();
        let march = DateKey::from_ymd(2025, 3, 1).unwrap();
        let err = add_post(&mut store, march, PostInput::new("Post"), Utc::now()).unwrap_err();
        assert!(matches!(err, PlanError::Validation(_)));
    }

    #[test]
    fn empty_text_is_normalized_to_none() {
        let mut store = feb();
        let mut input = PostInput::new("Post");
        input.caption = Some(String::new());
        let post = add_post(&mut store, day(2), input, Utc::now()).unwrap();
        assert_eq!(post.caption, None);
    }

    #[test]
    fn move_syncs_date_and_keeps_time() {
        let mut store = feb();
        let created = Utc::now();
        let time = NaiveTime::from_hms_opt(18, 15, 0).unwrap();
        let post = add_post(
            &mut store,
            day(10),
            PostInput::new("Reel")
                .media(MediaHandle::from_url("x"))
                .at(time),
            created,
        )
        .unwrap();

        let later = created + Duration::minutes(5);
        let outcome = move_post(&mut store, &post.id, day(10), day(12), later).unwrap();
        assert_eq!(outcome, MoveOutcome::Moved);

        assert!(store.list_for_date(day(10)).is_empty());
        assert_eq!(store.bucket_count(), 1);
        let moved = &store.list_for_date(day(12))[0];
        assert_eq!(moved.id, post.id);
        assert_eq!(moved.scheduled_date, Some(day(12).date()));
        assert_eq!(moved.scheduled_time, Some(time));
        assert_eq!(moved.created_at, created);
        assert_eq!(moved.updated_at, later);
    }

    #[test]
    fn move_appends_to_end_of_destination() {
        let mut store = feb();
        let now = Utc::now();
        let resident = add_post(&mut store, day(5), PostInput::new("Post"), now).unwrap();
        let mover = add_post(&mut store, day(4), PostInput::new("Post"), now).unwrap();

        move_post(&mut store, &mover.id, day(4), day(5), now).unwrap();
        let ids: Vec<_> = store.list_for_date(day(5)).iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, [resident.id, mover.id]);
    }

    #[test]
    fn move_same_bucket_is_noop() {
        let mut store = feb();
        let now = Utc::now();
        let post = add_post(&mut store, day(3), PostInput::new("Post"), now).unwrap();
        let later = now + Duration::hours(1);
        let outcome = move_post(&mut store, &post.id, day(3), day(3), later).unwrap();
        assert_eq!(outcome, MoveOutcome::Unchanged);
        assert_eq!(store.list_for_date(day(3))[0].updated_at, now);
    }

    #[test]
    fn move_from_wrong_bucket_is_not_found() {
        let mut store = feb();
        let now = Utc::now();
        let post = add_post(&mut store, day(3), PostInput::new("Post"), now).unwrap();
        let err = move_post(&mut store, &post.id, day(4), day(5), now).unwrap_err();
        assert!(matches!(err, PlanError::NotFound { .. }));
        assert_eq!(store.list_for_date(day(3)).len(), 1);
    }

    #[test]
    fn update_merges_and_preserves_identity() {
        let mut store = feb();
        let created = Utc::now();
        let post = add_post(
            &mut store,
            day(7),
            PostInput::new("Post").topic("old").caption("keep me"),
            created,
        )
        .unwrap();

        let later = created + Duration::seconds(30);
        let patch = PostPatch {
            post_type: Some("Carousel".into()),
            topic: Some("new".into()),
            notes: Some("remember".into()),
            ..PostPatch::default()
        };
        let updated = update_post(&mut store, &post.id, day(7), patch, later).unwrap();

        assert_eq!(updated.id, post.id);
        assert_eq!(updated.created_at, created);
        assert_eq!(updated.updated_at, later);
        assert_eq!(updated.post_type, PostType::Carousel);
        assert_eq!(updated.topic.as_deref(), Some("new"));
        assert_eq!(updated.caption.as_deref(), Some("keep me"));
        assert_eq!(updated.notes.as_deref(), Some("remember"));
        assert_eq!(store.list_for_date(day(7))[0], updated);
    }

    #[test]
    fn update_clears_with_empty_text_and_none_media() {
        let mut store = feb();
        let now = Utc::now();
        let post = add_post(
            &mut store,
            day(7),
            PostInput::new("Post")
                .caption("c")
                .media(MediaHandle::from_url("m")),
            now,
        )
        .unwrap();
        let patch = PostPatch {
            caption: Some(String::new()),
            media: Some(None),
            ..PostPatch::default()
        };
        let updated = update_post(&mut store, &post.id, day(7), patch, now).unwrap();
        assert_eq!(updated.caption, None);
        assert_eq!(updated.media, None);
    }

    #[test]
    fn update_with_bad_type_changes_nothing() {
        let mut store = feb();
        let now = Utc::now();
        let post = add_post(&mut store, day(7), PostInput::new("Post").topic("t"), now).unwrap();
        let patch = PostPatch {
            post_type: Some("Blog".into()),
            topic: Some("changed".into()),
            ..PostPatch::default()
        };
        let err = update_post(&mut store, &post.id, day(7), patch, now).unwrap_err();
        assert!(matches!(err, PlanError::Validation(_)));
        assert_eq!(store.list_for_date(day(7))[0], post);
    }

    #[test]
    fn update_missing_is_not_found() {
        let mut store = feb();
        let err = update_post(
            &mut store,
            &PostId::from("ghost"),
            day(7),
            PostPatch::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::NotFound { .. }));
    }

    #[test]
    fn delete_twice_fails_second_time() {
        let mut store = feb();
        let post = add_post(&mut store, day(8), PostInput::new("Story"), Utc::now()).unwrap();

        let removed = delete_post(&mut store, &post.id, day(8)).unwrap();
        assert_eq!(removed.id, post.id);
        assert_eq!(store.bucket_count(), 0);

        let err = delete_post(&mut store, &post.id, day(8)).unwrap_err();
        assert!(matches!(err, PlanError::NotFound { .. }));
    }

    mod sequences {
        use std::collections::BTreeMap;

        use chrono::Datelike;
        use proptest::prelude::*;

        use super::*;

        /// `pick` indexes the posts in date order; `wrong_day` aims the
        /// command at a bucket the post is not in.
        #[derive(Debug, Clone)]
        enum Op {
            Add { day: u32, valid_type: bool },
            Move { pick: usize, to: u32, wrong_day: bool },
            Delete { pick: usize, wrong_day: bool },
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                3 => (1..=28u32, prop::bool::weighted(0.9))
                    .prop_map(|(day, valid_type)| Op::Add { day, valid_type }),
                3 => (any::<usize>(), 1..=28u32, prop::bool::weighted(0.1))
                    .prop_map(|(pick, to, wrong_day)| Op::Move { pick, to, wrong_day }),
                2 => (any::<usize>(), prop::bool::weighted(0.1))
                    .prop_map(|(pick, wrong_day)| Op::Delete { pick, wrong_day }),
            ]
        }

        /// Expected bucket contents: day of month to ids in insertion order.
        type Buckets = BTreeMap<u32, Vec<PostId>>;

        fn nth(buckets: &Buckets, pick: usize) -> Option<(PostId, u32)> {
            let total: usize = buckets.values().map(Vec::len).sum();
            if total == 0 {
                return None;
            }
            buckets
                .iter()
                .flat_map(|(&d, ids)| ids.iter().map(move |id| (id.clone(), d)))
                .nth(pick % total)
        }

        fn other_day(d: u32) -> u32 {
            d % 28 + 1
        }

        fn take(buckets: &mut Buckets, d: u32, id: &PostId) {
            if let Some(ids) = buckets.get_mut(&d) {
                ids.retain(|i| i != id);
                if ids.is_empty() {
                    buckets.remove(&d);
                }
            }
        }

        fn apply(store: &mut DateBucketStore, expected: &mut Buckets, op: Op) -> Result<()> {
            let now = Utc::now();
            match op {
                Op::Add { day: d, valid_type } => {
                    let post_type = if valid_type { "Reel" } else { "Tweet" };
                    let post = add_post(store, day(d), PostInput::new(post_type), now)?;
                    expected.entry(d).or_default().push(post.id);
                }
                Op::Move { pick, to, wrong_day } => {
                    let Some((id, from)) = nth(expected, pick) else {
                        return Ok(());
                    };
                    let from = if wrong_day { other_day(from) } else { from };
                    if move_post(store, &id, day(from), day(to), now)? == MoveOutcome::Moved {
                        take(expected, from, &id);
                        expected.entry(to).or_default().push(id);
                    }
                }
                Op::Delete { pick, wrong_day } => {
                    let Some((id, d)) = nth(expected, pick) else {
                        return Ok(());
                    };
                    let d = if wrong_day { other_day(d) } else { d };
                    delete_post(store, &id, day(d))?;
                    take(expected, d, &id);
                }
            }
            Ok(())
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(128))]

            #[test]
            fn random_commands_keep_buckets_consistent(ops in prop::collection::vec(op(), 1..60)) {
                let mut store = feb();
                let mut expected = Buckets::new();

                for op in ops {
                    let rejected = match op {
                        Op::Add { valid_type, .. } => !valid_type,
                        Op::Move { wrong_day, .. } | Op::Delete { wrong_day, .. } => {
                            wrong_day && !expected.is_empty()
                        }
                    };
                    let before = store.clone();

                    let outcome = apply(&mut store, &mut expected, op);
                    prop_assert_eq!(outcome.is_err(), rejected);
                    if rejected {
                        prop_assert_eq!(&store, &before);
                    }

                    prop_assert!(store.check_integrity().is_ok(), "{:?}", store.check_integrity());
                    let actual: Buckets = store
                        .buckets()
                        .map(|(date, posts)| {
                            for post in posts {
                                assert_eq!(post.scheduled_date, Some(date.date()));
                            }
                            (date.date().day(), posts.iter().map(|p| p.id.clone()).collect())
                        })
                        .collect();
                    prop_assert_eq!(&actual, &expected);
                    let total: usize = expected.values().map(Vec::len).sum();
                    prop_assert_eq!(store.post_count(), total);
                }
            }
        }
    }
}
