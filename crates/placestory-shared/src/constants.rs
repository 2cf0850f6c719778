/// Application name
pub const APP_NAME: &str = "Placestory";

/// Hard ceiling on a single video recording, in seconds
pub const MAX_RECORDING_SECS: u32 = 60;

/// Interval at which the platform encoder flushes a data chunk (ms)
pub const RECORDER_TIMESLICE_MS: u64 = 100;

/// How long an image story stays on screen (ms)
pub const IMAGE_STORY_DURATION_MS: u64 = 5000;

/// Sampling period of the image progress bar (ms)
pub const IMAGE_PROGRESS_SAMPLE_MS: u64 = 50;

/// A press released within this window counts as a tap, not a hold (ms)
pub const TAP_MAX_HOLD_MS: u64 = 250;

/// Downward drag distance that dismisses the story viewer
pub const DISMISS_DRAG_THRESHOLD: f64 = 150.0;

/// Playback rates for video stories
pub const NORMAL_PLAYBACK_RATE: f64 = 1.0;
pub const FAST_FORWARD_PLAYBACK_RATE: f64 = 2.0;

/// JPEG quality factor for still captures (0-100)
pub const PHOTO_JPEG_QUALITY: u8 = 90;

/// Container produced by the video recorder
pub const RECORDED_VIDEO_CONTENT_TYPE: &str = "video/webm";
pub const RECORDED_VIDEO_FILE_NAME: &str = "story.webm";

/// Encoding of captured photos
pub const CAPTURED_PHOTO_CONTENT_TYPE: &str = "image/jpeg";
pub const CAPTURED_PHOTO_FILE_NAME: &str = "story.jpg";

/// Default remote API root
pub const DEFAULT_API_BASE_URL: &str = "https://foydabor.uz/api";

/// Default size of one upload body chunk (64 KiB)
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Smallest upload chunk accepted from configuration (1 KiB)
pub const MIN_UPLOAD_CHUNK_SIZE: usize = 1024;

/// Multipart field names of the story-creation endpoint
pub const UPLOAD_FIELD_STORY: &str = "story";
pub const UPLOAD_FIELD_PLACE: &str = "place";
