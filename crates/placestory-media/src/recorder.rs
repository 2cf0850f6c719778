use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use placestory_shared::constants::{MAX_RECORDING_SECS, RECORDER_TIMESLICE_MS};
use placestory_shared::{MediaBlob, StoryError};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use crate::capture::{CaptureError, LiveStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Paused,
    Stopped,
}

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Cannot {action} while recorder is {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: RecorderState,
    },

    #[error("Nothing was captured")]
    CaptureEmpty,

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Still capture failed: {0}")]
    Still(String),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

impl From<RecorderError> for StoryError {
    fn from(err: RecorderError) -> Self {
        match err {
            RecorderError::CaptureEmpty => StoryError::CaptureEmpty,
            RecorderError::Capture(e) => e.into(),
            other => StoryError::DeviceUnavailable(other.to_string()),
        }
    }
}

/// Platform encoder turning a live stream into container chunks
/// (MediaRecorder on the web).
///
/// While started, the platform delivers chunks to
/// [`Recorder::push_chunk`] roughly once per timeslice.
pub trait MediaEncoder: Send {
    fn start(&mut self, stream: &dyn LiveStream, timeslice: Duration)
        -> Result<(), RecorderError>;
    fn pause(&mut self);
    fn resume(&mut self);
    /// Stop encoding and return chunks still buffered in the encoder.
    fn stop(&mut self) -> Vec<Bytes>;
}

/// A finished take.
#[derive(Debug, Clone)]
pub struct Recording {
    pub blob: MediaBlob,
    pub elapsed_secs: u32,
}

impl Recording {
    pub fn is_empty(&self) -> bool {
        self.blob.is_empty()
    }
}

/// Chunks accumulated between start and stop of one take.
#[derive(Debug, Default)]
struct RecordingBuffer {
    chunks: Vec<Bytes>,
    len: usize,
}

impl RecordingBuffer {
    fn push(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.len += chunk.len();
        self.chunks.push(chunk);
    }

    fn clear(&mut self) {
        self.chunks.clear();
        self.len = 0;
    }

    /// Concatenate into one immutable blob and empty the accumulator.
    fn finalize(&mut self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.len);
        for chunk in self.chunks.drain(..) {
            out.extend_from_slice(&chunk);
        }
        self.len = 0;
        out.freeze()
    }
}

/// Video recorder state machine.
///
/// `idle → recording → (paused ⇄ recording) → stopped`. The elapsed counter
/// is advanced by [`Recorder::tick_second`] (see [`RecordingClock`]) and the
/// take is force-stopped at [`MAX_RECORDING_SECS`].
pub struct Recorder<E: MediaEncoder> {
    encoder: E,
    state: RecorderState,
    buffer: RecordingBuffer,
    elapsed_secs: u32,
}

impl<E: MediaEncoder> Recorder<E> {
    pub fn new(encoder: E) -> Self {
        Self {
            encoder,
            state: RecorderState::Idle,
            buffer: RecordingBuffer::default(),
            elapsed_secs: 0,
        }
    }

    pub fn start(&mut self, stream: &dyn LiveStream) -> Result<(), RecorderError> {
        self.expect_state("start", &[RecorderState::Idle])?;

        self.buffer.clear();
        self.elapsed_secs = 0;
        self.encoder
            .start(stream, Duration::from_millis(RECORDER_TIMESLICE_MS))?;
        self.state = RecorderState::Recording;

        info!(stream = stream.id(), "Recording started");
        Ok(())
    }

    /// Accept a chunk from the encoder. Ignored outside an active take.
    pub fn push_chunk(&mut self, chunk: Bytes) {
        match self.state {
            RecorderState::Recording | RecorderState::Paused => self.buffer.push(chunk),
            state => debug!(?state, len = chunk.len(), "Dropping late encoder chunk"),
        }
    }

    pub fn pause(&mut self) -> Result<(), RecorderError> {
        self.expect_state("pause", &[RecorderState::Recording])?;
        self.encoder.pause();
        self.state = RecorderState::Paused;
        debug!(elapsed = self.elapsed_secs, "Recording paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), RecorderError> {
        self.expect_state("resume", &[RecorderState::Paused])?;
        self.encoder.resume();
        self.state = RecorderState::Recording;
        debug!(elapsed = self.elapsed_secs, "Recording resumed");
        Ok(())
    }

    /// Finalize the take. A take with no data yields an empty blob; the
    /// upload path rejects it as [`StoryError::CaptureEmpty`].
    pub fn stop(&mut self) -> Result<Recording, RecorderError> {
        self.expect_state("stop", &[RecorderState::Recording, RecorderState::Paused])?;

        for chunk in self.encoder.stop() {
            self.buffer.push(chunk);
        }
        let data = self.buffer.finalize();
        self.state = RecorderState::Stopped;

        if data.is_empty() {
            warn!(elapsed = self.elapsed_secs, "Recording stopped with no data");
        } else {
            info!(
                elapsed = self.elapsed_secs,
                bytes = data.len(),
                "Recording stopped"
            );
        }

        Ok(Recording {
            blob: MediaBlob::recorded_video(data),
            elapsed_secs: self.elapsed_secs,
        })
    }

    /// One second of wall time has passed. Returns the finished take when
    /// this tick hit the recording cap.
    pub fn tick_second(&mut self) -> Option<Recording> {
        if self.state != RecorderState::Recording {
            return None;
        }

        self.elapsed_secs += 1;
        if self.elapsed_secs < MAX_RECORDING_SECS {
            return None;
        }

        info!(cap = MAX_RECORDING_SECS, "Recording cap reached, stopping");
        self.stop().ok()
    }

    /// Discard the current take and return to idle (retake).
    pub fn reset(&mut self) {
        if matches!(self.state, RecorderState::Recording | RecorderState::Paused) {
            let _ = self.encoder.stop();
        }
        self.buffer.clear();
        self.elapsed_secs = 0;
        self.state = RecorderState::Idle;
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len
    }

    fn expect_state(
        &self,
        action: &'static str,
        allowed: &[RecorderState],
    ) -> Result<(), RecorderError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(RecorderError::InvalidTransition {
                action,
                state: self.state,
            })
        }
    }
}

/// Drives [`Recorder::tick_second`] once per second while a take is live.
///
/// The task ends when the recorder leaves the recording states; if the cap
/// stopped the take, the recording is sent on `auto_stopped`. Dropping the
/// clock aborts the task.
pub struct RecordingClock {
    handle: JoinHandle<()>,
}

impl RecordingClock {
    pub fn spawn<E>(
        recorder: Arc<Mutex<Recorder<E>>>,
        auto_stopped: mpsc::Sender<Recording>,
    ) -> Self
    where
        E: MediaEncoder + 'static,
    {
        let handle = tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut ticks = interval_at(Instant::now() + period, period);

            loop {
                ticks.tick().await;

                let mut guard = recorder.lock().await;
                match guard.state() {
                    RecorderState::Idle | RecorderState::Stopped => break,
                    RecorderState::Paused => continue,
                    RecorderState::Recording => {}
                }

                if let Some(recording) = guard.tick_second() {
                    drop(guard);
                    if auto_stopped.send(recording).await.is_err() {
                        warn!("Auto-stopped recording had no receiver");
                    }
                    break;
                }
            }
        });

        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RecordingClock {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Render elapsed seconds as `m:ss`.
pub fn format_elapsed(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
