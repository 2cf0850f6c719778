use thiserror::Error;

/// User-facing failures of the story subsystem.
///
/// Lower layers keep their own error types and convert into this one at the
/// point where the UI decides how to present the failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoryError {
    #[error("Camera and microphone access is required: {0}")]
    PermissionDenied(String),

    #[error("Camera is unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Nothing was captured, please retake")]
    CaptureEmpty,

    #[error("{message}")]
    UploadFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("Like toggle failed: {0}")]
    LikeToggleFailed(String),

    #[error("Failed to delete story: {0}")]
    DeleteFailed(String),
}

/// How the UI surfaces a [`StoryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    /// Modal alert; the user must re-initiate the action.
    BlockingAlert,
    /// Reject the send and ask the user to capture again.
    PromptRetake,
    /// Recovered locally, nothing shown.
    Silent,
}

impl StoryError {
    pub fn upload(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::UploadFailed {
            status,
            message: message.into(),
        }
    }

    pub fn presentation(&self) -> Presentation {
        match self {
            Self::PermissionDenied(_)
            | Self::DeviceUnavailable(_)
            | Self::UploadFailed { .. }
            | Self::DeleteFailed(_) => Presentation::BlockingAlert,
            Self::CaptureEmpty => Presentation::PromptRetake,
            Self::LikeToggleFailed(_) => Presentation::Silent,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UploadFailed { status, .. } => *status,
            _ => None,
        }
    }
}
