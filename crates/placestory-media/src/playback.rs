use std::time::Duration;

use placestory_shared::constants::{
    DISMISS_DRAG_THRESHOLD, FAST_FORWARD_PLAYBACK_RATE, IMAGE_STORY_DURATION_MS,
    NORMAL_PLAYBACK_RATE, TAP_MAX_HOLD_MS,
};
use placestory_shared::{AuthorId, MediaKind, StoryGroup, StoryId, StoryRecord};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("Story group has no stories")]
    EmptyGroup,

    #[error("Initial index {index} is out of range for {len} stories")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overlay {
    #[default]
    None,
    Paused,
    FastForward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The last story finished on its own or was tapped past.
    Exhausted,
    Closed,
    Dismissed,
}

/// Identifies one story lifecycle. Media events and timer samples carry the
/// token of the lifecycle they belong to; anything tagged with a token that
/// is no longer current is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleToken {
    index: usize,
    epoch: u64,
}

impl LifecycleToken {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Where stories are rendered: an `<img>`/`<video>` pair on the web.
pub trait StorySurface: Send {
    /// Present `story`; videos load and autoplay. Time-update and ended
    /// events for this story must be reported with `token`.
    fn show(&mut self, story: &StoryRecord, kind: MediaKind, token: LifecycleToken);
    fn play(&mut self);
    fn pause(&mut self);
    fn set_playback_rate(&mut self, rate: f64);
    fn set_muted(&mut self, muted: bool);
}

struct ActiveStory {
    token: LifecycleToken,
    kind: MediaKind,
    started_at: Instant,
}

struct HeldPointer {
    side: Side,
    since: Instant,
}

/// Auto-advancing viewer for one author's stories.
///
/// Every index change tears down the active story lifecycle (rate reset to
/// 1x, overlay cleared, token invalidated) before the next one begins, so a
/// timer or media event from the previous story cannot advance twice.
pub struct PlaybackEngine<S: StorySurface> {
    author: AuthorId,
    stories: Vec<StoryRecord>,
    surface: S,
    current_index: usize,
    progress: f64,
    overlay: Overlay,
    muted: bool,
    epoch: u64,
    active: Option<ActiveStory>,
    held: Option<HeldPointer>,
    started: bool,
    exit: Option<ExitReason>,
    on_watched: Box<dyn FnMut(AuthorId) + Send>,
}

impl<S: StorySurface> PlaybackEngine<S> {
    pub fn new(
        group: StoryGroup,
        surface: S,
        on_watched: impl FnMut(AuthorId) + Send + 'static,
    ) -> Result<Self, PlaybackError> {
        Self::with_initial_index(group, 0, surface, on_watched)
    }

    pub fn with_initial_index(
        group: StoryGroup,
        initial_index: usize,
        surface: S,
        on_watched: impl FnMut(AuthorId) + Send + 'static,
    ) -> Result<Self, PlaybackError> {
        if group.is_empty() {
            return Err(PlaybackError::EmptyGroup);
        }
        if initial_index >= group.len() {
            return Err(PlaybackError::IndexOutOfRange {
                index: initial_index,
                len: group.len(),
            });
        }

        Ok(Self {
            author: group.author_id(),
            stories: group.stories,
            surface,
            current_index: initial_index,
            progress: 0.0,
            overlay: Overlay::None,
            muted: true,
            epoch: 0,
            active: None,
            held: None,
            started: false,
            exit: None,
            on_watched: Box::new(on_watched),
        })
    }

    /// Mount: mark the author watched and begin the initial story.
    pub fn start(&mut self, now: Instant) {
        if self.started {
            return;
        }
        self.started = true;
        (self.on_watched)(self.author);
        info!(author = %self.author, stories = self.stories.len(), "Story viewer opened");
        self.begin(self.current_index, now);
    }

    /// Image progress sample. Drives the 5 s image timer.
    pub fn sample(&mut self, token: LifecycleToken, now: Instant) {
        if !self.started {
            return;
        }
        let Some(active) = self.live(token) else {
            return;
        };
        if active.kind != MediaKind::Image {
            return;
        }

        let elapsed = now.saturating_duration_since(active.started_at);
        let total = Duration::from_millis(IMAGE_STORY_DURATION_MS);
        self.progress = (elapsed.as_secs_f64() / total.as_secs_f64() * 100.0).min(100.0);

        if elapsed >= total {
            self.advance(now);
        }
    }

    /// Video time-update event.
    pub fn time_update(&mut self, token: LifecycleToken, current_secs: f64, duration_secs: f64) {
        let Some(active) = self.live(token) else {
            return;
        };
        if active.kind != MediaKind::Video {
            return;
        }
        if duration_secs.is_finite() && duration_secs > 0.0 {
            self.progress = (current_secs / duration_secs * 100.0).clamp(0.0, 100.0);
        }
    }

    /// Video reached its end.
    pub fn media_ended(&mut self, token: LifecycleToken, now: Instant) {
        if self.started && self.live(token).is_some() {
            self.advance(now);
        }
    }

    /// Start of a press-and-hold. Left pauses, right plays at 2x. Videos only.
    pub fn press(&mut self, side: Side) {
        if !self.showing_video() {
            return;
        }
        match side {
            Side::Left => {
                self.surface.pause();
                self.overlay = Overlay::Paused;
            }
            Side::Right => {
                self.surface.set_playback_rate(FAST_FORWARD_PLAYBACK_RATE);
                self.overlay = Overlay::FastForward;
            }
        }
    }

    /// End of a press-and-hold: normal rate, playing, no overlay.
    pub fn release(&mut self) {
        if !self.showing_video() {
            return;
        }
        self.surface.set_playback_rate(NORMAL_PLAYBACK_RATE);
        self.surface.play();
        self.overlay = Overlay::None;
    }

    pub fn tap(&mut self, side: Side, now: Instant) {
        if !self.started || self.exit.is_some() {
            return;
        }
        match side {
            Side::Left if self.current_index > 0 => self.begin(self.current_index - 1, now),
            Side::Left => {}
            Side::Right => self.advance(now),
        }
    }

    /// Raw pointer down on one half of the viewport.
    pub fn pointer_down(&mut self, side: Side, now: Instant) {
        self.held = Some(HeldPointer { side, since: now });
        self.press(side);
    }

    /// Raw pointer up. A short press is a tap; a long one only releases.
    pub fn pointer_up(&mut self, now: Instant) {
        let Some(held) = self.held.take() else {
            return;
        };
        self.release();
        if now.saturating_duration_since(held.since) < Duration::from_millis(TAP_MAX_HOLD_MS) {
            self.tap(held.side, now);
        }
    }

    /// Vertical drag finished with a downward offset of `offset_y`.
    pub fn drag_end(&mut self, offset_y: f64) {
        if offset_y > DISMISS_DRAG_THRESHOLD {
            self.finish(ExitReason::Dismissed);
        }
    }

    pub fn close(&mut self) {
        self.finish(ExitReason::Closed);
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        if self.showing_video() {
            self.surface.set_muted(self.muted);
        }
        self.muted
    }

    /// Replace a story in place, e.g. after a like toggle.
    pub fn update_story(&mut self, story: StoryRecord) {
        if let Some(slot) = self.stories.iter_mut().find(|s| s.id == story.id) {
            *slot = story;
        }
    }

    /// A story was deleted elsewhere. Closes the viewer if it belongs to this
    /// group. Returns whether it did.
    pub fn story_deleted(&mut self, id: StoryId) -> bool {
        if self.exit.is_some() || !self.stories.iter().any(|s| s.id == id) {
            return false;
        }
        debug!(story_id = %id, "Open story was deleted");
        self.finish(ExitReason::Closed);
        true
    }

    pub fn token(&self) -> Option<LifecycleToken> {
        self.active.as_ref().map(|a| a.token)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_story(&self) -> &StoryRecord {
        &self.stories[self.current_index]
    }

    pub fn current_story_id(&self) -> StoryId {
        self.current_story().id
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn overlay(&self) -> Overlay {
        self.overlay
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn exit(&self) -> Option<ExitReason> {
        self.exit
    }

    pub fn stories(&self) -> &[StoryRecord] {
        &self.stories
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    fn live(&self, token: LifecycleToken) -> Option<&ActiveStory> {
        self.active.as_ref().filter(|a| a.token == token)
    }

    fn showing_video(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.kind == MediaKind::Video)
    }

    fn advance(&mut self, now: Instant) {
        if self.current_index + 1 < self.stories.len() {
            self.begin(self.current_index + 1, now);
        } else {
            self.finish(ExitReason::Exhausted);
        }
    }

    fn begin(&mut self, index: usize, now: Instant) {
        self.teardown();

        self.epoch += 1;
        self.current_index = index;
        self.progress = 0.0;

        let token = LifecycleToken {
            index,
            epoch: self.epoch,
        };
        let story = &self.stories[index];
        let kind = story.kind();

        self.surface.show(story, kind, token);
        if kind.is_video() {
            self.surface.set_playback_rate(NORMAL_PLAYBACK_RATE);
            self.surface.set_muted(self.muted);
            self.surface.play();
        }

        debug!(index, story_id = %story.id, ?kind, "Story lifecycle started");
        self.active = Some(ActiveStory {
            token,
            kind,
            started_at: now,
        });
    }

    fn teardown(&mut self) {
        if let Some(active) = self.active.take() {
            if active.kind.is_video() {
                self.surface.set_playback_rate(NORMAL_PLAYBACK_RATE);
                self.surface.pause();
            }
            debug!(index = active.token.index, "Story lifecycle ended");
        }
        self.overlay = Overlay::None;
        self.held = None;
    }

    fn finish(&mut self, reason: ExitReason) {
        if self.exit.is_some() {
            return;
        }
        self.teardown();
        self.exit = Some(reason);
        (self.on_watched)(self.author);
        info!(author = %self.author, ?reason, index = self.current_index, "Story viewer closed");
    }
}
