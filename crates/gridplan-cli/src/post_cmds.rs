//! Handlers for `gridplan add`, `move`, `update`, `delete`, `list` and `months`.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use gridplan_core::media::{MediaMetadata, MediaSlot, MediaUpload, PostDraft};
use gridplan_core::schedule::MoveOutcome;
use gridplan_core::{DateKey, MediaHandle, MonthKey, Post, PostId, PostInput, PostPatch};

use crate::session::Session;
use crate::{AddArgs, PostFields, UpdateArgs};

// -----------------------------------------------------------------------
// Formatting
// -----------------------------------------------------------------------

fn media_marker(post: &Post) -> &'static str {
    match (&post.media, &post.cover_media) {
        (Some(_), Some(_)) => " [media+cover]",
        (Some(_), None) => " [media]",
        (None, Some(_)) => " [cover]",
        (None, None) => "",
    }
}

pub fn format_post(post: &Post) -> String {
    let time = post
        .scheduled_time
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    let label = post
        .topic
        .as_deref()
        .or(post.caption.as_deref())
        .unwrap_or("(untitled)");
    format!(
        "{}  {time}  {:<8} {label}{}",
        post.id,
        post.post_type.to_string(),
        media_marker(post)
    )
}

// -----------------------------------------------------------------------
// Uploads
// -----------------------------------------------------------------------

async fn read_upload(path: &Path) -> Result<MediaUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    Ok(MediaUpload {
        bytes,
        metadata: MediaMetadata {
            filename,
            ..MediaMetadata::default()
        },
    })
}

/// A token cancelled by the first Ctrl+C, so a slow upload can be abandoned.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling upload...");
            cancel_clone.cancel();
        }
    });
    cancel
}

fn apply_fields(input: &mut PostInput, fields: PostFields) {
    input.category = fields.category;
    input.pillar = fields.pillar;
    input.topic = fields.topic;
    input.caption = fields.caption;
    input.notes = fields.notes;
    input.audio_link = fields.audio_link;
}

// -----------------------------------------------------------------------
// gridplan add
// -----------------------------------------------------------------------

pub async fn run_add(session: &Session, args: AddArgs) -> Result<()> {
    let mut planner = session.planner(args.date.month()).await?;

    let mut input = PostInput::new(args.post_type);
    apply_fields(&mut input, args.fields);
    input.scheduled_time = args.time;
    input.media = args.media.map(MediaHandle::from_url);
    input.cover_media = args.cover.map(MediaHandle::from_url);

    let mut draft = PostDraft::new(input);
    if let Some(path) = &args.upload {
        draft.pending_media = Some(read_upload(path).await?);
    }
    if let Some(path) = &args.upload_cover {
        draft.pending_cover = Some(read_upload(path).await?);
    }

    let post = if draft.has_pending() {
        let cancel = cancel_on_ctrl_c();
        planner
            .add_draft(args.date, &mut draft, &cancel)
            .await
            .context("post not added")?
    } else {
        planner.add_post(args.date, draft.input).await?
    };

    println!("Added to {}:", args.date);
    println!("  {}", format_post(&post));
    Ok(())
}

// -----------------------------------------------------------------------
// gridplan move
// -----------------------------------------------------------------------

pub async fn run_move(
    session: &Session,
    post_id: &str,
    from: DateKey,
    to: DateKey,
    time: Option<NaiveTime>,
) -> Result<()> {
    let mut planner = session.planner(from.month()).await?;
    let post_id = PostId::from(post_id);

    if time.is_some() {
        let post = planner.reschedule(&post_id, from, to, time).await?;
        println!("Rescheduled to {to}:");
        println!("  {}", format_post(&post));
        return Ok(());
    }

    match planner.move_post(&post_id, from, to).await? {
        MoveOutcome::Moved => println!("Moved {post_id} from {from} to {to}."),
        MoveOutcome::Unchanged => println!("{post_id} is already on {to}; nothing to do."),
    }
    Ok(())
}

// -----------------------------------------------------------------------
// gridplan update
// -----------------------------------------------------------------------

pub async fn run_update(session: &Session, args: UpdateArgs) -> Result<()> {
    let mut planner = session.planner(args.date.month()).await?;
    let post_id = PostId::from(args.post_id.as_str());

    let fields = args.fields;
    let patch = PostPatch {
        post_type: args.post_type,
        category: fields.category,
        pillar: fields.pillar,
        topic: fields.topic,
        caption: fields.caption,
        notes: fields.notes,
        audio_link: fields.audio_link,
        media: args.media.map(|url| Some(MediaHandle::from_url(url))),
        cover_media: args.cover.map(|url| Some(MediaHandle::from_url(url))),
        scheduled_time: args.time,
    };
    let clear: Vec<MediaSlot> = [
        (args.clear_media, MediaSlot::Primary),
        (args.clear_cover, MediaSlot::Cover),
    ]
    .into_iter()
    .filter_map(|(wanted, slot)| wanted.then_some(slot))
    .collect();

    // Cleared media is deleted from storage only once the edit validates.
    let post = planner.edit_post(&post_id, args.date, patch, &clear).await?;

    println!("Updated:");
    println!("  {}", format_post(&post));
    Ok(())
}

// -----------------------------------------------------------------------
// gridplan delete
// -----------------------------------------------------------------------

pub async fn run_delete(session: &Session, post_id: &str, date: DateKey) -> Result<()> {
    let mut planner = session.planner(date.month()).await?;
    let post = planner.delete_post(&PostId::from(post_id), date).await?;
    println!("Deleted from {date}:");
    println!("  {}", format_post(&post));
    Ok(())
}

// -----------------------------------------------------------------------
// gridplan list
// -----------------------------------------------------------------------

/// What `gridplan list` shows: one day or a whole month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTarget {
    Day(DateKey),
    Month(MonthKey),
}

impl std::str::FromStr for ListTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(date) = s.parse::<DateKey>() {
            return Ok(Self::Day(date));
        }
        s.parse::<MonthKey>().map(Self::Month).map_err(|_| {
            format!("expected a date (YYYY-MM-DD) or a month key (YEAR-MONTHINDEX, e.g. 2025-0), got {s:?}")
        })
    }
}

pub async fn run_list(session: &Session, target: ListTarget, json: bool) -> Result<()> {
    let month = match target {
        ListTarget::Day(date) => date.month(),
        ListTarget::Month(month) => month,
    };
    let planner = session.planner(month).await?;

    if json {
        let value = match target {
            ListTarget::Day(date) => serde_json::to_value(planner.list_for_date(date))?,
            ListTarget::Month(_) => {
                let mut document = planner.plan().to_document()?;
                document["posts"].take()
            }
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match target {
        ListTarget::Day(date) => {
            let posts = planner.list_for_date(date);
            if posts.is_empty() {
                println!("Nothing scheduled on {date}.");
            }
            for post in posts {
                println!("{}", format_post(post));
            }
        }
        ListTarget::Month(month) => {
            if planner.store().is_empty() {
                println!("Nothing scheduled in {month}.");
            }
            for (date, posts) in planner.list_month() {
                println!("{date}");
                for post in posts {
                    println!("  {}", format_post(post));
                }
            }
        }
    }
    Ok(())
}

// -----------------------------------------------------------------------
// gridplan months
// -----------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MonthSummary {
    month: MonthKey,
    posts: usize,
    days: usize,
}

pub async fn run_months(session: &Session, json: bool) -> Result<()> {
    let mut summaries = Vec::new();
    for month in session.stored_months().await? {
        let planner = session.planner(month).await?;
        summaries.push(MonthSummary {
            month,
            posts: planner.store().post_count(),
            days: planner.store().bucket_count(),
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    if summaries.is_empty() {
        println!("No month plans stored yet.");
    }
    for summary in &summaries {
        println!(
            "{:<8} {:>3} posts on {:>2} days",
            summary.month.to_string(),
            summary.posts,
            summary.days
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use gridplan_core::PostType;

    #[test]
    fn list_target_parses_both_forms() {
        assert_eq!(
            "2025-01-15".parse::<ListTarget>().unwrap(),
            ListTarget::Day("2025-01-15".parse().unwrap())
        );
        assert_eq!(
            "2025-0".parse::<ListTarget>().unwrap(),
            ListTarget::Month(MonthKey::new(2025, 0).unwrap())
        );
        assert!("January".parse::<ListTarget>().is_err());
    }

    #[test]
    fn format_post_shows_time_type_and_media() {
        let now = Utc::now();
        let post = Post {
            id: PostId::from("abc"),
            post_type: PostType::Reel,
            category: None,
            pillar: None,
            topic: Some("Studio tour".into()),
            caption: None,
            notes: None,
            audio_link: None,
            media: Some(MediaHandle::from_url("https://x/v.mp4")),
            cover_media: None,
            scheduled_date: None,
            scheduled_time: NaiveTime::from_hms_opt(18, 30, 0),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(format_post(&post), "abc  18:30  Reel     Studio tour [media]");
    }
}
