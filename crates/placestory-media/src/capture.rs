use std::sync::Arc;

use async_trait::async_trait;
use placestory_shared::types::Facing;
use placestory_shared::StoryError;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::still::VideoFrame;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("No matching camera available: {0}")]
    DeviceUnavailable(String),

    #[error("No active camera stream")]
    NoActiveStream,

    #[error("Torch control failed: {0}")]
    Torch(String),

    #[error("Frame grab failed: {0}")]
    Frame(String),
}

impl From<CaptureError> for StoryError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::PermissionDenied(msg) => StoryError::PermissionDenied(msg),
            CaptureError::DeviceUnavailable(msg) => StoryError::DeviceUnavailable(msg),
            other => StoryError::DeviceUnavailable(other.to_string()),
        }
    }
}

/// Answer of the platform permission layer for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    /// Undetermined; acquiring will show the platform prompt.
    Prompt,
}

#[async_trait]
pub trait PermissionProbe: Send + Sync {
    async fn camera_permission(&self) -> PermissionState;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub facing: Facing,
    pub audio: bool,
}

impl CaptureConstraints {
    pub fn video_with_audio(facing: Facing) -> Self {
        Self {
            facing,
            audio: true,
        }
    }
}

/// A live camera + microphone stream handed out by a [`CameraDevice`].
///
/// Methods take `&self`; implementations hold their hardware handles behind
/// interior mutability so the same stream can feed a preview and an encoder.
pub trait LiveStream: Send + Sync {
    fn id(&self) -> &str;

    /// Stop every audio and video track. Must be idempotent.
    fn stop_all_tracks(&self);

    fn is_active(&self) -> bool;

    /// Whether the active video track advertises torch capability.
    fn supports_torch(&self) -> bool;

    fn apply_torch(&self, enabled: bool) -> Result<(), CaptureError>;

    /// Current video frame as packed RGB8.
    fn grab_frame(&self) -> Result<VideoFrame, CaptureError>;
}

#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Request camera and microphone access. May wait on a user prompt
    /// indefinitely.
    async fn open(
        &self,
        constraints: CaptureConstraints,
    ) -> Result<Arc<dyn LiveStream>, CaptureError>;
}

/// Consumer of the live stream, e.g. the viewfinder.
pub trait PreviewSurface: Send {
    fn attach(&mut self, stream: Arc<dyn LiveStream>);
    fn detach(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorchOutcome {
    Applied(bool),
    /// The camera has no torch; the UI shows a warning and nothing changes.
    Unsupported,
}

/// Owns the camera/microphone stream for one recording screen.
///
/// At most one stream is held at a time. Re-acquisition stops the previous
/// stream's tracks before opening the new one, and dropping the session
/// releases whatever is still held.
pub struct CaptureSession {
    device: Arc<dyn CameraDevice>,
    permissions: Option<Arc<dyn PermissionProbe>>,
    preview: Option<Box<dyn PreviewSurface>>,
    facing: Facing,
    torch_enabled: bool,
    stream: Option<Arc<dyn LiveStream>>,
}

impl CaptureSession {
    pub fn new(device: Arc<dyn CameraDevice>) -> Self {
        Self {
            device,
            permissions: None,
            preview: None,
            facing: Facing::default(),
            torch_enabled: false,
            stream: None,
        }
    }

    pub fn with_permissions(mut self, probe: Arc<dyn PermissionProbe>) -> Self {
        self.permissions = Some(probe);
        self
    }

    pub fn with_preview(mut self, preview: Box<dyn PreviewSurface>) -> Self {
        self.preview = Some(preview);
        self
    }

    /// Acquire a stream for `facing`, replacing any stream already held.
    pub async fn acquire(&mut self, facing: Facing) -> Result<(), CaptureError> {
        if let Some(probe) = &self.permissions {
            if probe.camera_permission().await == PermissionState::Denied {
                error!("Camera permission denied by the platform");
                return Err(CaptureError::PermissionDenied(
                    "allow camera access in the app settings".into(),
                ));
            }
        }

        self.release();

        let stream = self
            .device
            .open(CaptureConstraints::video_with_audio(facing))
            .await
            .map_err(|e| {
                error!(%facing, error = %e, "Camera acquisition failed");
                e
            })?;

        info!(%facing, stream = stream.id(), "Camera stream acquired");

        if let Some(preview) = self.preview.as_mut() {
            preview.attach(stream.clone());
        }
        self.facing = facing;
        self.torch_enabled = false;
        self.stream = Some(stream);
        Ok(())
    }

    /// Stop every track of the held stream. Safe to call repeatedly.
    pub fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop_all_tracks();
            if let Some(preview) = self.preview.as_mut() {
                preview.detach();
            }
            self.torch_enabled = false;
            debug!(stream = stream.id(), "Camera stream released");
        }
    }

    pub async fn switch_facing(&mut self) -> Result<(), CaptureError> {
        let next = self.facing.flipped();
        debug!(from = %self.facing, to = %next, "Switching camera");
        self.acquire(next).await
    }

    pub fn toggle_torch(&mut self, enabled: bool) -> Result<TorchOutcome, CaptureError> {
        let stream = self.stream.as_ref().ok_or(CaptureError::NoActiveStream)?;

        if !stream.supports_torch() {
            warn!(facing = %self.facing, "Flash is not supported on this camera");
            return Ok(TorchOutcome::Unsupported);
        }

        stream.apply_torch(enabled)?;
        self.torch_enabled = enabled;
        debug!(enabled, "Torch state changed");
        Ok(TorchOutcome::Applied(enabled))
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn torch_enabled(&self) -> bool {
        self.torch_enabled
    }

    pub fn stream(&self) -> Option<Arc<dyn LiveStream>> {
        self.stream.clone()
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}
