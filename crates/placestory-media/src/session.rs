use std::time::Duration;

use placestory_shared::constants::IMAGE_PROGRESS_SAMPLE_MS;
use placestory_shared::{StoryId, StoryRecord};
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::debug;

use crate::playback::{ExitReason, LifecycleToken, PlaybackEngine, Side, StorySurface};

/// Events fed into a running [`PlaybackSession`] by the UI and the video
/// element.
#[derive(Debug, Clone)]
pub enum PlaybackInput {
    TimeUpdate {
        token: LifecycleToken,
        current_secs: f64,
        duration_secs: f64,
    },
    Ended {
        token: LifecycleToken,
    },
    PointerDown(Side),
    PointerUp,
    DragEnd {
        offset_y: f64,
    },
    ToggleMute,
    UpdateStory(StoryRecord),
    /// A story was deleted; closes the viewer if it is part of this group.
    StoryDeleted(StoryId),
    Close,
}

/// Runs a [`PlaybackEngine`] on the tokio clock until the viewer exits.
///
/// A 50 ms sampler feeds image progress; it is reset whenever the active
/// lifecycle changes so each story's samples start from its own mount time.
pub struct PlaybackSession<S: StorySurface> {
    engine: PlaybackEngine<S>,
    inputs: mpsc::Receiver<PlaybackInput>,
}

impl<S: StorySurface> PlaybackSession<S> {
    pub fn new(engine: PlaybackEngine<S>) -> (Self, mpsc::Sender<PlaybackInput>) {
        let (tx, rx) = mpsc::channel(64);
        (
            Self {
                engine,
                inputs: rx,
            },
            tx,
        )
    }

    pub async fn run(mut self) -> (ExitReason, PlaybackEngine<S>) {
        let period = Duration::from_millis(IMAGE_PROGRESS_SAMPLE_MS);
        let mut sampler = interval(period);
        sampler.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.engine.start(Instant::now());
        let mut lifecycle = self.engine.token();

        let reason = loop {
            if let Some(reason) = self.engine.exit() {
                break reason;
            }

            tokio::select! {
                _ = sampler.tick() => {
                    if let Some(token) = self.engine.token() {
                        self.engine.sample(token, Instant::now());
                    }
                }
                input = self.inputs.recv() => match input {
                    Some(input) => self.handle(input),
                    // Every sender dropped: the screen went away.
                    None => self.engine.close(),
                },
            }

            let current = self.engine.token();
            if current != lifecycle {
                sampler.reset();
                lifecycle = current;
            }
        };

        debug!(?reason, "Playback session finished");
        (reason, self.engine)
    }

    fn handle(&mut self, input: PlaybackInput) {
        let now = Instant::now();
        match input {
            PlaybackInput::TimeUpdate {
                token,
                current_secs,
                duration_secs,
            } => self.engine.time_update(token, current_secs, duration_secs),
            PlaybackInput::Ended { token } => self.engine.media_ended(token, now),
            PlaybackInput::PointerDown(side) => self.engine.pointer_down(side, now),
            PlaybackInput::PointerUp => self.engine.pointer_up(now),
            PlaybackInput::DragEnd { offset_y } => self.engine.drag_end(offset_y),
            PlaybackInput::ToggleMute => {
                self.engine.toggle_mute();
            }
            PlaybackInput::UpdateStory(story) => self.engine.update_story(story),
            PlaybackInput::StoryDeleted(id) => {
                self.engine.story_deleted(id);
            }
            PlaybackInput::Close => self.engine.close(),
        }
    }
}
