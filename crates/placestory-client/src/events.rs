use placestory_media::PlaybackInput;
use placestory_shared::{StoryId, StoryRecord};
use tokio::sync::mpsc;
use tracing::{debug, error};

pub const STORY_ADDED: &str = "story-added";
pub const STORY_UPDATED: &str = "story-updated";
pub const STORY_DELETED: &str = "story-deleted";

/// Change notifications sent from actions (upload, like, delete) to the
/// screen that owns the story feed.
#[derive(Debug, Clone, PartialEq)]
pub enum StoryEvent {
    Added(StoryRecord),
    Updated(StoryRecord),
    Deleted(StoryId),
}

impl StoryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Added(_) => STORY_ADDED,
            Self::Updated(_) => STORY_UPDATED,
            Self::Deleted(_) => STORY_DELETED,
        }
    }

    /// What an open story viewer needs to hear about this change, if
    /// anything. New stories do not join a running session.
    pub fn playback_input(&self) -> Option<PlaybackInput> {
        match self {
            Self::Added(_) => None,
            Self::Updated(story) => Some(PlaybackInput::UpdateStory(story.clone())),
            Self::Deleted(id) => Some(PlaybackInput::StoryDeleted(*id)),
        }
    }

    pub fn story_id(&self) -> StoryId {
        match self {
            Self::Added(story) | Self::Updated(story) => story.id,
            Self::Deleted(id) => *id,
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<StoryEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<StoryEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Send an event, logging instead of failing when the feed is gone.
pub fn emit_event(tx: &EventSender, event: StoryEvent) {
    let name = event.name();
    let story_id = event.story_id();
    match tx.send(event) {
        Ok(()) => debug!(event = name, story_id = %story_id, "Event emitted"),
        Err(e) => error!(event = name, story_id = %story_id, "Failed to emit event: {}", e),
    }
}
