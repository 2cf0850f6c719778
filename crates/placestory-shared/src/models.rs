use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::{
    CAPTURED_PHOTO_CONTENT_TYPE, CAPTURED_PHOTO_FILE_NAME, RECORDED_VIDEO_CONTENT_TYPE,
    RECORDED_VIDEO_FILE_NAME,
};
use crate::types::{AuthorId, LikeId, PlaceId, StoryId};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "avif", "svg"];

/// Whether a story is shown as a still image or played as a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Guess the kind from an asset locator's file extension.
    ///
    /// Anything that is not a known image extension is treated as video,
    /// matching how the feed serves recorded clips.
    pub fn infer_from_locator(locator: &str) -> Self {
        let path = locator
            .split(['?', '#'])
            .next()
            .unwrap_or(locator);
        let ext = path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match ext {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => Self::Image,
            _ => Self::Video,
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let ct = content_type.trim().to_ascii_lowercase();
        if ct.starts_with("image/") {
            Some(Self::Image)
        } else if ct.starts_with("video/") {
            Some(Self::Video)
        } else {
            None
        }
    }

    pub fn is_video(self) -> bool {
        matches!(self, Self::Video)
    }
}

/// Denormalized profile of a story's author as embedded in feed results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorProfile {
    pub id: AuthorId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

impl AuthorProfile {
    pub fn new(id: AuthorId) -> Self {
        Self {
            id,
            username: None,
            first_name: None,
            last_name: None,
            profile_picture: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.first_name.as_deref())
            .filter(|s| !s.is_empty())
            .unwrap_or("User")
    }

    /// Avatar fallback letters when there is no profile picture.
    pub fn initials(&self) -> String {
        let first = |s: &Option<String>| s.as_deref().and_then(|v| v.chars().next());

        let letters: String = match (first(&self.first_name), first(&self.last_name)) {
            (Some(f), Some(l)) => [f, l].iter().collect(),
            (Some(f), None) => f.to_string(),
            (None, Some(l)) => l.to_string(),
            (None, None) => first(&self.username)
                .map(|c| c.to_string())
                .unwrap_or_else(|| "U".to_string()),
        };
        letters.to_uppercase()
    }
}

/// The viewer's like relation to a story.
///
/// On the wire this is the relation id, with `-1` or `null` meaning
/// "not liked".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewerLike {
    #[default]
    NotLiked,
    /// Optimistically shown as liked while the create request is in flight.
    Pending,
    Liked(LikeId),
    /// Optimistically shown as not liked while relation `LikeId` is being
    /// deleted.
    Unliking(LikeId),
}

impl ViewerLike {
    pub fn is_liked(&self) -> bool {
        matches!(self, Self::Pending | Self::Liked(_))
    }

    /// A create or delete request for this relation has not settled yet.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Pending | Self::Unliking(_))
    }
}

impl Serialize for ViewerLike {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Liked(id) | Self::Unliking(id) => serializer.serialize_i64(id.0),
            Self::NotLiked | Self::Pending => serializer.serialize_i64(-1),
        }
    }
}

impl<'de> Deserialize<'de> for ViewerLike {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(match raw {
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(id) if id >= 0 => Self::Liked(LikeId(id)),
                _ => Self::NotLiked,
            },
            // A bare flag carries no relation id to undo, so it cannot be toggled.
            _ => Self::NotLiked,
        })
    }
}

/// One persisted story as returned by the remote story API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoryRecord {
    pub id: StoryId,
    #[serde(rename = "bot_client")]
    pub author: AuthorProfile,
    #[serde(rename = "story")]
    pub media_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_kind: Option<MediaKind>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "likes_count", default)]
    pub like_count: u64,
    #[serde(rename = "has_user_liked", default)]
    pub viewer_like: ViewerLike,
    #[serde(default)]
    pub place: Option<PlaceId>,
}

impl StoryRecord {
    pub fn author_id(&self) -> AuthorId {
        self.author.id
    }

    /// The explicit kind when known, otherwise inferred from the locator.
    pub fn kind(&self) -> MediaKind {
        self.media_kind
            .unwrap_or_else(|| MediaKind::infer_from_locator(&self.media_url))
    }
}

/// All stories of one author, presented together in one playback session.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryGroup {
    pub author: AuthorProfile,
    pub stories: Vec<StoryRecord>,
}

impl StoryGroup {
    pub fn author_id(&self) -> AuthorId {
        self.author.id
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }
}

/// A finished binary payload ready for upload: a recording, a still
/// capture, or a file picked from the gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaBlob {
    pub data: Bytes,
    pub kind: MediaKind,
    pub content_type: String,
    pub file_name: String,
}

impl MediaBlob {
    pub fn recorded_video(data: Bytes) -> Self {
        Self {
            data,
            kind: MediaKind::Video,
            content_type: RECORDED_VIDEO_CONTENT_TYPE.to_string(),
            file_name: RECORDED_VIDEO_FILE_NAME.to_string(),
        }
    }

    pub fn captured_photo(data: Bytes) -> Self {
        Self {
            data,
            kind: MediaKind::Image,
            content_type: CAPTURED_PHOTO_CONTENT_TYPE.to_string(),
            file_name: CAPTURED_PHOTO_FILE_NAME.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
