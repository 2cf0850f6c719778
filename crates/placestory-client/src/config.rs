//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so the CLI can run against the public API
//! with only an init-data credential supplied.

use placestory_shared::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_UPLOAD_CHUNK_SIZE, MIN_UPLOAD_CHUNK_SIZE,
};
use placestory_shared::AuthorId;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root of the story REST API, without trailing slash.
    /// Env: `STORY_API_BASE_URL`
    /// Default: `https://foydabor.uz/api`
    pub api_base_url: String,

    /// Telegram Mini App init data, sent as `Authorization: tma <data>`.
    /// Env: `TMA_INIT_DATA`
    /// Default: none (requests go out unauthenticated).
    pub init_data: Option<String>,

    /// Size of each upload body chunk; progress is reported per chunk.
    /// Env: `STORY_UPLOAD_CHUNK_SIZE`
    /// Default: 64 KiB, minimum 1 KiB.
    pub upload_chunk_size: usize,

    /// Id of the signed-in user, needed for likes and deletes.
    /// Env: `STORY_VIEWER_ID`
    /// Default: none.
    pub viewer_id: Option<AuthorId>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            init_data: None,
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
            viewer_id: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("STORY_API_BASE_URL").filter(|u| !u.trim().is_empty()) {
            config.api_base_url = url.trim().trim_end_matches('/').to_string();
        }

        if let Some(data) = lookup("TMA_INIT_DATA").filter(|d| !d.is_empty()) {
            config.init_data = Some(data);
        }

        if let Some(raw) = lookup("STORY_UPLOAD_CHUNK_SIZE") {
            match raw.trim().parse::<usize>() {
                Ok(size) if size >= MIN_UPLOAD_CHUNK_SIZE => config.upload_chunk_size = size,
                Ok(size) => {
                    tracing::warn!(
                        value = size,
                        min = MIN_UPLOAD_CHUNK_SIZE,
                        "STORY_UPLOAD_CHUNK_SIZE below minimum, using default"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        value = %raw,
                        error = %e,
                        "Invalid STORY_UPLOAD_CHUNK_SIZE, using default"
                    );
                }
            }
        }

        if let Some(raw) = lookup("STORY_VIEWER_ID") {
            match raw.parse::<AuthorId>() {
                Ok(id) => config.viewer_id = Some(id),
                Err(e) => {
                    tracing::warn!(value = %raw, error = %e, "Invalid STORY_VIEWER_ID, ignoring");
                }
            }
        }

        config
    }
}
