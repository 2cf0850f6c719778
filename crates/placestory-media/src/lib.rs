//! # placestory-media
//!
//! Camera capture, recording and story playback for the story viewer.
//!
//! Platform primitives (camera device, live stream, encoder, video surface,
//! permission layer) are traits so the state machines here can run against
//! a browser bridge, a native backend, or test fakes.

pub mod capture;
pub mod playback;
pub mod recorder;
pub mod session;
pub mod still;

pub use capture::{
    CameraDevice, CaptureConstraints, CaptureError, CaptureSession, LiveStream, PermissionProbe,
    PermissionState, PreviewSurface, TorchOutcome,
};
pub use playback::{
    ExitReason, LifecycleToken, Overlay, PlaybackEngine, PlaybackError, Side, StorySurface,
};
pub use recorder::{
    format_elapsed, MediaEncoder, Recorder, RecorderError, RecorderState, Recording,
    RecordingClock,
};
pub use session::{PlaybackInput, PlaybackSession};
pub use still::{capture_still, encode_jpeg, VideoFrame};
