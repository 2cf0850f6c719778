//! Story screen state shared by the CLI and embedding front ends.
//!
//! [`AppState`] owns the API handle, the grouped feed, the upload pipeline
//! and the event channel that keeps the feed in step with actions.

use std::sync::Arc;

use placestory_media::PlaybackInput;
use tokio::sync::mpsc;

use placestory_shared::{AuthorId, PlaceId, StoryError, StoryId, StoryRecord};
use tracing::{debug, info, warn};

use crate::actions;
use crate::api::{HttpStoryApi, SharedApi};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::{self, EventReceiver, EventSender, StoryEvent};
use crate::feed::{SharedFeed, StoryFeed};
use crate::staging::StagedMedia;
use crate::upload::UploadPipeline;

/// Central story state.
pub struct AppState {
    pub config: ClientConfig,

    /// Remote story API (HTTP in production, fakes in tests).
    pub api: SharedApi,

    /// Stories grouped by author plus the watched-author set.
    pub feed: SharedFeed,

    /// Single-slot upload pipeline; publishes `Added` on success.
    pub uploads: UploadPipeline,

    events_tx: EventSender,
    events_rx: EventReceiver,

    /// Input channel of the story viewer currently open, if any.
    viewer_inputs: Option<mpsc::Sender<PlaybackInput>>,
}

impl AppState {
    /// Build state talking to the HTTP API described by `config`.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let api: SharedApi = Arc::new(HttpStoryApi::new(&config)?);
        Ok(Self::with_api(config, api))
    }

    pub fn with_api(config: ClientConfig, api: SharedApi) -> Self {
        let (events_tx, events_rx) = events::channel();
        Self {
            uploads: UploadPipeline::new(api.clone()).with_events(events_tx.clone()),
            feed: StoryFeed::new().into_shared(),
            config,
            api,
            events_tx,
            events_rx,
            viewer_inputs: None,
        }
    }

    pub fn viewer(&self) -> Result<AuthorId, ClientError> {
        self.config
            .viewer_id
            .ok_or_else(|| ClientError::Config("STORY_VIEWER_ID is not set".into()))
    }

    /// Fetch stories (optionally for one place) and regroup the feed.
    pub async fn refresh(&self, place: Option<PlaceId>) -> Result<usize, ClientError> {
        let stories = self.api.list_stories(place).await?;
        let count = stories.len();
        let mut feed = self
            .feed
            .lock()
            .map_err(|e| ClientError::Config(format!("Lock poisoned: {e}")))?;
        feed.replace_all(stories);
        info!(stories = count, groups = feed.groups().len(), "Feed refreshed");
        Ok(count)
    }

    /// Forward story changes to an open viewer (see
    /// [`PlaybackSession`](placestory_media::PlaybackSession)) until it closes.
    pub fn attach_viewer(&mut self, inputs: mpsc::Sender<PlaybackInput>) {
        self.viewer_inputs = Some(inputs);
    }

    /// Apply events emitted by uploads and actions to the feed and to the
    /// open viewer.
    pub fn sync_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.forward_to_viewer(&event);
            match self.feed.lock() {
                Ok(mut feed) => feed.apply(event),
                Err(_) => continue,
            }
            applied += 1;
        }
        if applied > 0 {
            debug!(applied, "Applied story events");
        }
        applied
    }

    pub async fn upload(
        &self,
        staged: StagedMedia,
        place: Option<PlaceId>,
        on_progress: impl Fn(u8) + Send + Sync + 'static,
    ) -> Result<StoryRecord, StoryError> {
        self.uploads
            .upload(staged.into_blob(), place, on_progress)
            .await
    }

    pub async fn toggle_like(&self, story: StoryId) -> Result<StoryRecord, StoryError> {
        let viewer = self
            .viewer()
            .map_err(|e| StoryError::LikeToggleFailed(e.to_string()))?;
        actions::toggle_like(self.api.as_ref(), &self.feed, story, viewer, Some(&self.events_tx))
            .await
    }

    pub async fn delete_story(&self, story: StoryId) -> Result<StoryRecord, StoryError> {
        let viewer = self
            .viewer()
            .map_err(|e| StoryError::DeleteFailed(e.to_string()))?;
        actions::delete_story(self.api.as_ref(), &self.feed, story, viewer, Some(&self.events_tx))
            .await
    }

    fn forward_to_viewer(&mut self, event: &StoryEvent) {
        let (Some(inputs), Some(input)) = (&self.viewer_inputs, event.playback_input()) else {
            return;
        };
        match inputs.try_send(input) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Story viewer closed, detaching");
                self.viewer_inputs = None;
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(story_id = %event.story_id(), "Story viewer input queue full, dropping event");
            }
        }
    }

    /// Callback for the playback engine's watched notification.
    pub fn watched_callback(&self) -> impl FnMut(AuthorId) + Send + 'static {
        let feed = self.feed.clone();
        move |author| {
            if let Ok(mut feed) = feed.lock() {
                feed.mark_watched(author);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::tests::FakeApi;
    use bytes::Bytes;
    use placestory_shared::MediaBlob;

    fn state(viewer: Option<i64>) -> AppState {
        let config = ClientConfig {
            viewer_id: viewer.map(AuthorId),
            ..ClientConfig::default()
        };
        AppState::with_api(config, Arc::new(FakeApi::default()))
    }

    #[tokio::test]
    async fn test_refresh_groups_by_author() {
        let state = state(None);
        assert_eq!(state.refresh(None).await.unwrap(), 3);

        let feed = state.feed.lock().unwrap();
        assert_eq!(feed.groups().len(), 2);
        assert_eq!(feed.group(AuthorId(10)).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_event_lands_in_feed() {
        let mut state = state(Some(5));
        state.refresh(None).await.unwrap();

        let staged =
            StagedMedia::from_photo(MediaBlob::captured_photo(Bytes::from_static(b"jpeg"))).unwrap();
        let story = state.upload(staged, None, |_| {}).await.unwrap();

        assert!(state.feed.lock().unwrap().find(story.id).is_none());
        assert_eq!(state.sync_events(), 1);

        let feed = state.feed.lock().unwrap();
        assert_eq!(feed.groups()[0].author_id(), AuthorId(5));
        assert!(feed.find(story.id).is_some());
    }

    #[tokio::test]
    async fn test_actions_require_viewer() {
        let state = state(None);
        state.refresh(None).await.unwrap();

        let err = state.toggle_like(StoryId(1)).await.unwrap_err();
        assert!(matches!(err, StoryError::LikeToggleFailed(_)));
        let err = state.delete_story(StoryId(1)).await.unwrap_err();
        assert!(matches!(err, StoryError::DeleteFailed(_)));
    }

    #[tokio::test]
    async fn test_delete_then_sync_is_idempotent() {
        let mut state = state(Some(10));
        state.refresh(None).await.unwrap();

        state.delete_story(StoryId(1)).await.unwrap();
        assert_eq!(state.sync_events(), 1);
        assert_eq!(state.feed.lock().unwrap().story_count(), 2);
    }

    #[test]
    fn test_watched_callback_marks_feed() {
        let state = state(None);
        let mut watched = state.watched_callback();
        watched(AuthorId(3));
        assert!(state.feed.lock().unwrap().is_watched(AuthorId(3)));
    }

    #[tokio::test]
    async fn test_delete_reaches_open_viewer() {
        let mut state = state(Some(10));
        state.refresh(None).await.unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        state.attach_viewer(tx);

        state.delete_story(StoryId(1)).await.unwrap();
        assert_eq!(state.sync_events(), 1);
        assert!(matches!(
            rx.try_recv(),
            Ok(PlaybackInput::StoryDeleted(StoryId(1)))
        ));

        drop(rx);
        state.delete_story(StoryId(3)).await.unwrap();
        assert_eq!(state.sync_events(), 1);
        assert!(state.viewer_inputs.is_none());
    }
}
