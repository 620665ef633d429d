//! The Post Record and the input shapes used to create and edit it.

mod wire;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

pub use wire::PostDecodeError;

/// Time of day used when a post has no explicit `scheduled_time` (09:00).
pub fn default_scheduled_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Kind of content a post represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostType {
    Post,
    Reel,
    Carousel,
    Story,
}

impl PostType {
    pub const ALL: [PostType; 4] = [Self::Post, Self::Reel, Self::Carousel, Self::Story];

    /// Whether posts of this type can ever appear in the feed grid.
    /// Stories live outside the grid.
    pub fn is_grid_type(self) -> bool {
        !matches!(self, Self::Story)
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Post => "Post",
            Self::Reel => "Reel",
            Self::Carousel => "Carousel",
            Self::Story => "Story",
        };
        f.write_str(s)
    }
}

impl FromStr for PostType {
    type Err = PostTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "post" => Ok(Self::Post),
            "reel" => Ok(Self::Reel),
            "carousel" => Ok(Self::Carousel),
            "story" => Ok(Self::Story),
            _ => Err(PostTypeParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`PostType`] string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostTypeParseError(pub String);

impl fmt::Display for PostTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid post type: {:?} (expected Post, Reel, Carousel, or Story)",
            self.0
        )
    }
}

impl std::error::Error for PostTypeParseError {}

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// Opaque post identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    /// A fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PostId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for PostId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Reference to an asset held by the media service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaHandle {
    pub url: String,
    /// Identifier assigned by the media provider, needed to delete the asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

impl MediaHandle {
    /// A handle for an externally hosted asset with no provider id.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            provider_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Post Record
// ---------------------------------------------------------------------------

/// One piece of scheduled content.
///
/// Deserialization goes through a tolerant wire shape (see [`PostDecodeError`])
/// so legacy documents normalize into this single form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "wire::PostWire")]
pub struct Post {
    pub id: PostId,
    #[serde(rename = "type")]
    pub post_type: PostType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pillar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_media: Option<MediaHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_time"
    )]
    pub scheduled_time: Option<NaiveTime>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// The scheduled time of day, or [`default_scheduled_time`].
    pub fn time_or_default(&self) -> NaiveTime {
        self.scheduled_time.unwrap_or_else(default_scheduled_time)
    }
}

fn serialize_time<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
    match time {
        Some(t) => serializer.serialize_str(&t.format("%H:%M").to_string()),
        None => serializer.serialize_none(),
    }
}

/// Normalize free text: an empty string means "not set".
pub(crate) fn clean_text(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Fields supplied by the presentation layer when creating a post.
///
/// `post_type` is raw text and is validated when the post is added. The
/// scheduled date always comes from the bucket the post is added to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostInput {
    #[serde(rename = "type")]
    pub post_type: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub pillar: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub audio_link: Option<String>,
    #[serde(default)]
    pub media: Option<MediaHandle>,
    #[serde(default)]
    pub cover_media: Option<MediaHandle>,
    #[serde(default)]
    pub scheduled_time: Option<NaiveTime>,
}

impl PostInput {
    pub fn new(post_type: impl Into<String>) -> Self {
        Self {
            post_type: post_type.into(),
            ..Self::default()
        }
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn media(mut self, handle: MediaHandle) -> Self {
        self.media = Some(handle);
        self
    }

    pub fn cover_media(mut self, handle: MediaHandle) -> Self {
        self.cover_media = Some(handle);
        self
    }

    pub fn at(mut self, time: NaiveTime) -> Self {
        self.scheduled_time = Some(time);
        self
    }
}

/// A partial update merged into an existing post.
///
/// `None` leaves a field untouched. For text fields `Some("")` clears the
/// value; media fields use an explicit inner `None` to clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostPatch {
    pub post_type: Option<String>,
    pub category: Option<String>,
    pub pillar: Option<String>,
    pub topic: Option<String>,
    pub caption: Option<String>,
    pub notes: Option<String>,
    pub audio_link: Option<String>,
    pub media: Option<Option<MediaHandle>>,
    pub cover_media: Option<Option<MediaHandle>>,
    pub scheduled_time: Option<NaiveTime>,
}

impl PostPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_type_display_roundtrip() {
        for v in PostType::ALL {
            let parsed: PostType = v.to_string().parse().expect("should parse");
            assert_eq!(v, parsed);
        }
    }

    #[test]
    fn post_type_accepts_lowercase() {
        assert_eq!("reel".parse::<PostType>().unwrap(), PostType::Reel);
    }

    #[test]
    fn post_type_invalid() {
        let err = "Tweet".parse::<PostType>().unwrap_err();
        assert!(err.to_string().contains("Tweet"));
    }

    #[test]
    fn story_is_not_a_grid_type() {
        assert!(!PostType::Story.is_grid_type());
        assert!(PostType::Carousel.is_grid_type());
    }

    #[test]
    fn default_time_is_nine() {
        assert_eq!(default_scheduled_time().format("%H:%M").to_string(), "09:00");
    }

    #[test]
    fn empty_patch() {
        assert!(PostPatch::default().is_empty());
        let patch = PostPatch {
            topic: Some("x".into()),
            ..PostPatch::default()
        };
        assert!(!patch.is_empty());
    }
}
