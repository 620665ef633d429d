//! Tolerant on-disk shape for posts.
//!
//! Documents written by earlier versions of the planner use several field
//! names and value shapes for the same concept. Everything is folded into
//! the canonical [`Post`] here so the rest of the engine only ever sees one
//! shape.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use super::{MediaHandle, Post, PostId, PostType, PostTypeParseError, clean_text};

/// Errors raised while normalizing a stored post.
#[derive(Debug, Error)]
pub enum PostDecodeError {
    #[error(transparent)]
    InvalidType(#[from] PostTypeParseError),

    #[error("invalid scheduled date {0:?}")]
    InvalidDate(String),

    #[error("invalid scheduled time {0:?} (expected HH:MM)")]
    InvalidTime(String),

    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdWire {
    Text(String),
    Int(i64),
    Float(f64),
}

impl IdWire {
    fn into_id(self) -> Option<PostId> {
        match self {
            Self::Text(s) if s.is_empty() => None,
            Self::Text(s) => Some(PostId::from(s)),
            Self::Int(n) => Some(PostId::from(n.to_string())),
            Self::Float(n) if n.fract() == 0.0 => Some(PostId::from(format!("{n:.0}"))),
            Self::Float(n) => Some(PostId::from(n.to_string())),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MediaWire {
    Url(String),
    Handle {
        url: Option<String>,
        #[serde(default, alias = "providerId", alias = "public_id", alias = "publicId", alias = "id")]
        provider_id: Option<String>,
    },
}

impl MediaWire {
    fn into_handle(self) -> Option<MediaHandle> {
        let (url, provider_id) = match self {
            Self::Url(url) => (url, None),
            Self::Handle { url, provider_id } => (url?, clean_text(provider_id)),
        };
        if url.is_empty() {
            return None;
        }
        Some(MediaHandle { url, provider_id })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostWire {
    #[serde(default)]
    id: Option<IdWire>,
    #[serde(rename = "type")]
    post_type: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    pillar: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default, alias = "audio_link")]
    audio_link: Option<String>,
    #[serde(default, alias = "image", alias = "imageUrl", alias = "image_url")]
    media: Option<MediaWire>,
    #[serde(default, alias = "reelCover", alias = "coverImage", alias = "cover_image")]
    cover_media: Option<MediaWire>,
    #[serde(default, alias = "date")]
    scheduled_date: Option<String>,
    #[serde(default, alias = "time")]
    scheduled_time: Option<String>,
    #[serde(default, alias = "created_at")]
    created_at: Option<String>,
    #[serde(default, alias = "updated_at")]
    updated_at: Option<String>,
}

fn parse_date(raw: &str) -> Result<NaiveDate, PostDecodeError> {
    // Accept a bare date or the date part of an ISO timestamp.
    let date_part = match raw.get(10..11) {
        Some("T") | Some(" ") => &raw[..10],
        _ => raw,
    };
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| PostDecodeError::InvalidDate(raw.to_owned()))
}

fn parse_time(raw: &str) -> Result<NaiveTime, PostDecodeError> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| PostDecodeError::InvalidTime(raw.to_owned()))
}

/// RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS[.f]` read as UTC.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, PostDecodeError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|_| PostDecodeError::InvalidTimestamp(raw.to_owned()))
}

impl TryFrom<PostWire> for Post {
    type Error = PostDecodeError;

    fn try_from(wire: PostWire) -> Result<Self, Self::Error> {
        let post_type: PostType = wire.post_type.parse()?;
        let scheduled_date = clean_text(wire.scheduled_date)
            .map(|raw| parse_date(&raw))
            .transpose()?;
        let scheduled_time = clean_text(wire.scheduled_time)
            .map(|raw| parse_time(&raw))
            .transpose()?;
        let created_at = clean_text(wire.created_at)
            .map(|raw| parse_timestamp(&raw))
            .transpose()?
            .unwrap_or_default();
        let updated_at = clean_text(wire.updated_at)
            .map(|raw| parse_timestamp(&raw))
            .transpose()?
            .unwrap_or(created_at);

        Ok(Post {
            id: wire
                .id
                .and_then(IdWire::into_id)
                .unwrap_or_else(PostId::generate),
            post_type,
            category: clean_text(wire.category),
            pillar: clean_text(wire.pillar),
            topic: clean_text(wire.topic),
            caption: clean_text(wire.caption),
            notes: clean_text(wire.notes),
            audio_link: clean_text(wire.audio_link),
            media: wire.media.and_then(MediaWire::into_handle),
            cover_media: wire.cover_media.and_then(MediaWire::into_handle),
            scheduled_date,
            scheduled_time,
            created_at,
            updated_at,
        })
    }
}
