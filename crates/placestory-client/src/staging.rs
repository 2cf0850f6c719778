use std::path::{Path, PathBuf};

use bytes::Bytes;
use placestory_media::Recording;
use placestory_shared::{MediaBlob, MediaKind, StoryError};
use tracing::debug;

use crate::error::ClientError;

/// Where a staged file came from.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    Recorded { elapsed_secs: u32 },
    Photo,
    Gallery { path: PathBuf },
}

/// A file ready to hand to the upload pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedMedia {
    pub blob: MediaBlob,
    pub source: MediaSource,
}

impl StagedMedia {
    /// Stage a finished recording. An empty take must be retaken.
    pub fn from_recording(recording: Recording) -> Result<Self, StoryError> {
        if recording.is_empty() {
            return Err(StoryError::CaptureEmpty);
        }
        Ok(Self {
            source: MediaSource::Recorded {
                elapsed_secs: recording.elapsed_secs,
            },
            blob: recording.blob,
        })
    }

    pub fn from_photo(blob: MediaBlob) -> Result<Self, StoryError> {
        if blob.is_empty() {
            return Err(StoryError::CaptureEmpty);
        }
        Ok(Self {
            blob,
            source: MediaSource::Photo,
        })
    }

    /// Stage a gallery pick. `declared` is the picker's content kind; when
    /// absent the kind follows the file extension.
    pub async fn from_gallery(
        path: impl AsRef<Path>,
        declared: Option<MediaKind>,
    ) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("story")
            .to_string();
        let content_type = content_type_for(&file_name);
        let kind = declared
            .or_else(|| MediaKind::from_content_type(content_type))
            .unwrap_or_else(|| MediaKind::infer_from_locator(&file_name));

        debug!(file = %file_name, bytes = data.len(), kind = ?kind, "Staged gallery file");
        Ok(Self {
            blob: MediaBlob {
                data: Bytes::from(data),
                kind,
                content_type: content_type.to_string(),
                file_name,
            },
            source: MediaSource::Gallery {
                path: path.to_path_buf(),
            },
        })
    }

    pub fn kind(&self) -> MediaKind {
        self.blob.kind
    }

    pub fn into_blob(self) -> MediaBlob {
        self.blob
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}
