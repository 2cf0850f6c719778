//! Upload pipeline: sends one staged file to the story API while reporting
//! progress, and refuses to start a second upload while one is in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use placestory_shared::{MediaBlob, PlaceId, StoryError, StoryRecord};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::SharedApi;
use crate::events::{emit_event, EventSender, StoryEvent};

/// Progress callback receiving whole percentages in `0..=100`.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Converts bytes handed to the transport into non-decreasing percentages.
///
/// A percentage is only reported when it is strictly greater than the last
/// one reported.
pub struct ProgressTracker {
    total: u64,
    sent: u64,
    last: Option<u8>,
    callback: Option<ProgressFn>,
}

impl ProgressTracker {
    pub fn new(total: u64, callback: Option<ProgressFn>) -> Self {
        Self {
            total,
            sent: 0,
            last: None,
            callback,
        }
    }

    pub fn advance(&mut self, bytes: u64) {
        if self.total == 0 {
            return;
        }
        self.sent = (self.sent + bytes).min(self.total);
        let pct = ((self.sent as f64 / self.total as f64) * 100.0).round() as u8;

        if self.last.map_or(true, |last| pct > last) {
            self.last = Some(pct);
            if let Some(callback) = &self.callback {
                callback(pct);
            }
        }
    }

    pub fn last_reported(&self) -> Option<u8> {
        self.last
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

/// Observable state of the current (or most recent) upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub id: Uuid,
    pub place: Option<PlaceId>,
    pub status: UploadStatus,
    pub progress_percent: u8,
}

/// Releases the single upload slot when the upload future completes or is
/// dropped. A task still unsettled at that point was abandoned mid-request
/// and is marked failed.
struct SlotGuard {
    slot: Arc<AtomicBool>,
    current: Arc<Mutex<Option<UploadTask>>>,
    task_id: Uuid,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(task) = current.as_mut().filter(|t| t.id == self.task_id) {
                if matches!(task.status, UploadStatus::Pending | UploadStatus::InFlight) {
                    warn!(task = %self.task_id, "Upload abandoned before completion");
                    task.status = UploadStatus::Failed;
                    task.progress_percent = 0;
                }
            }
        }
        self.slot.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct UploadPipeline {
    api: SharedApi,
    slot: Arc<AtomicBool>,
    current: Arc<Mutex<Option<UploadTask>>>,
    events: Option<EventSender>,
}

impl UploadPipeline {
    pub fn new(api: SharedApi) -> Self {
        Self {
            api,
            slot: Arc::new(AtomicBool::new(false)),
            current: Arc::new(Mutex::new(None)),
            events: None,
        }
    }

    /// Publish [`StoryEvent::Added`] for every successful upload.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn is_busy(&self) -> bool {
        self.slot.load(Ordering::Acquire)
    }

    /// Snapshot of the current or last upload task.
    pub fn current_task(&self) -> Option<UploadTask> {
        self.current.lock().ok().and_then(|task| task.clone())
    }

    /// Upload `file`, optionally tagged with `place`.
    ///
    /// An empty file is rejected with [`StoryError::CaptureEmpty`] before any
    /// request is made. A second call while an upload is in flight fails
    /// without touching the first.
    pub async fn upload(
        &self,
        file: MediaBlob,
        place: Option<PlaceId>,
        on_progress: impl Fn(u8) + Send + Sync + 'static,
    ) -> Result<StoryRecord, StoryError> {
        if file.is_empty() {
            warn!("Rejected empty capture before upload");
            return Err(StoryError::CaptureEmpty);
        }

        if self
            .slot
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Upload already in flight, rejecting new start");
            return Err(StoryError::upload(None, "An upload is already in progress"));
        }
        let task_id = Uuid::new_v4();
        let _guard = SlotGuard {
            slot: self.slot.clone(),
            current: self.current.clone(),
            task_id,
        };

        self.set_task(UploadTask {
            id: task_id,
            place,
            status: UploadStatus::Pending,
            progress_percent: 0,
        });

        let current = self.current.clone();
        let progress: ProgressFn = Arc::new(move |pct| {
            if let Ok(mut task) = current.lock() {
                if let Some(task) = task.as_mut().filter(|t| t.id == task_id) {
                    task.status = UploadStatus::InFlight;
                    task.progress_percent = pct;
                }
            }
            on_progress(pct);
        });

        info!(task = %task_id, bytes = file.len(), kind = ?file.kind, place = ?place, "Starting upload");
        self.update_task(task_id, |t| t.status = UploadStatus::InFlight);

        match self.api.create_story(&file, place, Some(progress)).await {
            Ok(story) => {
                self.update_task(task_id, |t| {
                    t.status = UploadStatus::Succeeded;
                    t.progress_percent = 100;
                });
                info!(task = %task_id, story_id = %story.id, "Upload finished");
                if let Some(events) = &self.events {
                    emit_event(events, StoryEvent::Added(story.clone()));
                }
                Ok(story)
            }
            Err(e) => {
                self.update_task(task_id, |t| {
                    t.status = UploadStatus::Failed;
                    t.progress_percent = 0;
                });
                error!(task = %task_id, status = ?e.status(), "Upload failed: {}", e);
                Err(e.into_upload_error())
            }
        }
    }

    fn set_task(&self, task: UploadTask) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(task);
        }
    }

    fn update_task(&self, id: Uuid, f: impl FnOnce(&mut UploadTask)) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(task) = current.as_mut().filter(|t| t.id == id) {
                f(task);
                debug!(task = %id, status = ?task.status, progress = task.progress_percent, "Upload task updated");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::StoryApi;
    use crate::error::{ClientError, Result};
    use async_trait::async_trait;
    use bytes::Bytes;
    use placestory_shared::{
        AuthorId, AuthorProfile, LikeId, MediaKind, StoryId, ViewerLike,
    };
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    pub(crate) fn record(id: i64, author: i64) -> StoryRecord {
        StoryRecord {
            id: StoryId(id),
            author: AuthorProfile::new(AuthorId(author)),
            media_url: format!("https://cdn/stories/{id}"),
            media_kind: None,
            created_at: None,
            like_count: 0,
            viewer_like: ViewerLike::NotLiked,
            place: None,
        }
    }

    /// Scripted API: counts calls, optionally blocks uploads until released.
    #[derive(Default)]
    pub(crate) struct FakeApi {
        pub calls: AtomicUsize,
        pub gate: Option<Arc<Notify>>,
        pub unlike_gate: Option<Arc<Notify>>,
        /// Behave like a transport without upload progress events.
        pub no_progress: bool,
        pub fail_with: Mutex<Option<ClientError>>,
        pub next_like: Mutex<Option<LikeId>>,
    }

    impl FakeApi {
        pub fn failing(err: ClientError) -> Self {
            Self {
                fail_with: Mutex::new(Some(err)),
                ..Self::default()
            }
        }

        fn take_failure(&self) -> Result<()> {
            match self.fail_with.lock().unwrap().take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl StoryApi for FakeApi {
        async fn list_stories(&self, _place: Option<PlaceId>) -> Result<Vec<StoryRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.take_failure()?;
            Ok(vec![record(1, 10), record(2, 20), record(3, 10)])
        }

        async fn create_story(
            &self,
            file: &MediaBlob,
            place: Option<PlaceId>,
            progress: Option<ProgressFn>,
        ) -> Result<StoryRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if !self.no_progress {
                let mut tracker = ProgressTracker::new(file.len() as u64, progress);
                for chunk in file.data.chunks(4) {
                    tracker.advance(chunk.len() as u64);
                }
            }
            self.take_failure()?;
            let mut story = record(77, 5);
            story.place = place;
            story.media_kind = Some(file.kind);
            Ok(story)
        }

        async fn delete_story(&self, _id: StoryId) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.take_failure()
        }

        async fn create_like(&self, _story: StoryId, _viewer: AuthorId) -> Result<LikeId> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.take_failure()?;
            let like = *self.next_like.lock().unwrap();
            Ok(like.unwrap_or(LikeId(1)))
        }

        async fn delete_like(&self, _like: LikeId) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.unlike_gate {
                gate.notified().await;
            }
            self.take_failure()
        }
    }

    #[test]
    fn test_progress_tracker_is_monotonic() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut tracker = ProgressTracker::new(
            1000,
            Some(Arc::new(move |pct| sink.lock().unwrap().push(pct))),
        );

        for _ in 0..1000 {
            tracker.advance(1);
        }
        tracker.advance(50);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert_eq!(seen.len(), 101);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_progress_tracker_rounds() {
        let mut tracker = ProgressTracker::new(3, None);
        tracker.advance(1);
        assert_eq!(tracker.last_reported(), Some(33));
        tracker.advance(1);
        assert_eq!(tracker.last_reported(), Some(67));
    }

    #[tokio::test]
    async fn test_empty_capture_rejected_before_network() {
        let api = Arc::new(FakeApi::default());
        let pipeline = UploadPipeline::new(api.clone());

        let err = pipeline
            .upload(MediaBlob::recorded_video(Bytes::new()), None, |_| {})
            .await
            .unwrap_err();

        assert_eq!(err, StoryError::CaptureEmpty);
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
        assert!(pipeline.current_task().is_none());
    }

    #[tokio::test]
    async fn test_successful_upload_emits_added() {
        let api = Arc::new(FakeApi::default());
        let (tx, mut rx) = crate::events::channel();
        let pipeline = UploadPipeline::new(api).with_events(tx);

        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        let story = pipeline
            .upload(
                MediaBlob::captured_photo(Bytes::from_static(b"0123456789abcdef")),
                Some(PlaceId(4)),
                move |pct| sink.lock().unwrap().push(pct),
            )
            .await
            .unwrap();

        assert_eq!(story.place, Some(PlaceId(4)));
        assert_eq!(story.media_kind, Some(MediaKind::Image));
        assert_eq!(*reports.lock().unwrap(), vec![25, 50, 75, 100]);

        let task = pipeline.current_task().unwrap();
        assert_eq!(task.place, Some(PlaceId(4)));
        assert_eq!(task.status, UploadStatus::Succeeded);
        assert_eq!(task.progress_percent, 100);
        assert!(!pipeline.is_busy());

        assert_eq!(rx.recv().await.unwrap(), StoryEvent::Added(story));
    }

    #[tokio::test]
    async fn test_failed_upload_resets_progress() {
        let api = Arc::new(FakeApi::failing(ClientError::MissingId {
            status: 200,
            message: "Upload failed".into(),
        }));
        let pipeline = UploadPipeline::new(api);

        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        let err = pipeline
            .upload(
                MediaBlob::recorded_video(Bytes::from_static(b"webmdata")),
                None,
                move |pct| sink.lock().unwrap().push(pct),
            )
            .await
            .unwrap_err();

        // Progress reached 100 yet the missing id makes it a failure.
        assert_eq!(reports.lock().unwrap().last(), Some(&100));
        assert_eq!(err, StoryError::upload(Some(200), "Upload failed"));

        let task = pipeline.current_task().unwrap();
        assert_eq!(task.status, UploadStatus::Failed);
        assert_eq!(task.progress_percent, 0);
        assert!(!pipeline.is_busy());
    }

    #[tokio::test]
    async fn test_second_upload_rejected_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let api = Arc::new(FakeApi {
            gate: Some(gate.clone()),
            ..FakeApi::default()
        });
        let pipeline = UploadPipeline::new(api.clone());

        let first = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                pipeline
                    .upload(MediaBlob::captured_photo(Bytes::from_static(b"abcd")), None, |_| {})
                    .await
            })
        };

        while !pipeline.is_busy() || api.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let err = pipeline
            .upload(MediaBlob::captured_photo(Bytes::from_static(b"efgh")), None, |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "An upload is already in progress");
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert!(!pipeline.is_busy());

        // The slot is free again once the first upload completes.
        gate.notify_one();
        pipeline
            .upload(MediaBlob::captured_photo(Bytes::from_static(b"ijkl")), None, |_| {})
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_resolves_without_progress_events() {
        let api = Arc::new(FakeApi {
            no_progress: true,
            ..FakeApi::default()
        });
        let pipeline = UploadPipeline::new(api);

        let reports = Arc::new(AtomicUsize::new(0));
        let counter = reports.clone();
        let story = pipeline
            .upload(
                MediaBlob::recorded_video(Bytes::from_static(b"webm")),
                None,
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
            )
            .await
            .unwrap();

        assert_eq!(story.id, StoryId(77));
        assert_eq!(reports.load(Ordering::SeqCst), 0);
        assert_eq!(pipeline.current_task().unwrap().status, UploadStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_abandoned_upload_is_marked_failed() {
        let gate = Arc::new(Notify::new());
        let api = Arc::new(FakeApi {
            gate: Some(gate),
            ..FakeApi::default()
        });
        let pipeline = UploadPipeline::new(api.clone());

        let handle = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                pipeline
                    .upload(MediaBlob::captured_photo(Bytes::from_static(b"abcd")), None, |_| {})
                    .await
            })
        };
        while api.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(pipeline.current_task().unwrap().status, UploadStatus::InFlight);

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        let task = pipeline.current_task().unwrap();
        assert_eq!(task.status, UploadStatus::Failed);
        assert_eq!(task.progress_percent, 0);
        assert!(!pipeline.is_busy());
    }
}
