//! Remote story API.
//!
//! [`StoryApi`] is the seam the upload pipeline and story actions talk to;
//! [`HttpStoryApi`] implements it over the Mini App backend's REST routes.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use placestory_shared::constants::{APP_NAME, UPLOAD_FIELD_PLACE, UPLOAD_FIELD_STORY};
use placestory_shared::{AuthorId, LikeId, MediaBlob, PlaceId, StoryId, StoryRecord};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::upload::{ProgressFn, ProgressTracker};

/// Opaque credential from the identity provider (Telegram init data).
///
/// Attached to every request as-is and never logged.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    fn header_value(&self) -> String {
        format!("tma {}", self.0)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[async_trait]
pub trait StoryApi: Send + Sync {
    async fn list_stories(&self, place: Option<PlaceId>) -> Result<Vec<StoryRecord>>;

    /// Multipart upload of one story. `progress` receives non-decreasing
    /// percentages; it may never be called.
    async fn create_story(
        &self,
        file: &MediaBlob,
        place: Option<PlaceId>,
        progress: Option<ProgressFn>,
    ) -> Result<StoryRecord>;

    async fn delete_story(&self, id: StoryId) -> Result<()>;

    async fn create_like(&self, story: StoryId, viewer: AuthorId) -> Result<LikeId>;

    async fn delete_like(&self, like: LikeId) -> Result<()>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoryList {
    Plain(Vec<StoryRecord>),
    Paged { results: Vec<StoryRecord> },
}

#[derive(Serialize)]
struct LikeRequest {
    story: StoryId,
    bot_client: AuthorId,
}

#[derive(Deserialize)]
struct LikeResponse {
    id: LikeId,
}

pub struct HttpStoryApi {
    http: reqwest::Client,
    base_url: String,
    credential: Option<Credential>,
    upload_chunk_size: usize,
}

impl HttpStoryApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("{APP_NAME}/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            credential: config.init_data.clone().map(Credential::new),
            upload_chunk_size: config.upload_chunk_size,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.credential {
            Some(credential) => builder.header(
                reqwest::header::AUTHORIZATION,
                credential.header_value(),
            ),
            None => builder,
        }
    }

    fn upload_body(&self, data: Bytes, progress: Option<ProgressFn>) -> reqwest::Body {
        let mut tracker = ProgressTracker::new(data.len() as u64, progress);
        let chunks = split_chunks(&data, self.upload_chunk_size);
        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            tracker.advance(chunk.len() as u64);
            Ok::<Bytes, std::io::Error>(chunk)
        }));
        reqwest::Body::wrap_stream(stream)
    }
}

#[async_trait]
impl StoryApi for HttpStoryApi {
    async fn list_stories(&self, place: Option<PlaceId>) -> Result<Vec<StoryRecord>> {
        let mut req = self.request(Method::GET, "story/story");
        if let Some(place) = place {
            req = req.query(&[("place", place.0)]);
        }

        let resp = ensure_success(req.send().await?).await?;
        let list: StoryList = resp
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        let stories = match list {
            StoryList::Plain(stories) | StoryList::Paged { results: stories } => stories,
        };
        debug!(count = stories.len(), place = ?place, "Fetched stories");
        Ok(stories)
    }

    async fn create_story(
        &self,
        file: &MediaBlob,
        place: Option<PlaceId>,
        progress: Option<ProgressFn>,
    ) -> Result<StoryRecord> {
        let part = Part::stream_with_length(
            self.upload_body(file.data.clone(), progress),
            file.data.len() as u64,
        )
        .file_name(file.file_name.clone())
        .mime_str(&file.content_type)?;

        let mut form = Form::new().part(UPLOAD_FIELD_STORY, part);
        if let Some(place) = place {
            form = form.text(UPLOAD_FIELD_PLACE, place.to_string());
        }

        let resp = self
            .request(Method::POST, "story/story/")
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: format!("Upload failed with status {}", status.as_u16()),
            });
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|_| ClientError::InvalidResponse("Invalid response from server".into()))?;

        if body.get("id").map_or(true, |id| id.is_null()) {
            let message = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Upload failed")
                .to_string();
            return Err(ClientError::MissingId {
                status: status.as_u16(),
                message,
            });
        }

        let mut story: StoryRecord = serde_json::from_value(body)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        story.media_kind.get_or_insert(file.kind);

        info!(story_id = %story.id, bytes = file.len(), place = ?place, "Story created");
        Ok(story)
    }

    async fn delete_story(&self, id: StoryId) -> Result<()> {
        let path = format!("story/story/{id}/");
        ensure_success(self.request(Method::DELETE, &path).send().await?).await?;
        info!(story_id = %id, "Story deleted");
        Ok(())
    }

    async fn create_like(&self, story: StoryId, viewer: AuthorId) -> Result<LikeId> {
        let body = LikeRequest {
            story,
            bot_client: viewer,
        };
        let resp = ensure_success(
            self.request(Method::POST, "story/like/")
                .json(&body)
                .send()
                .await?,
        )
        .await?;

        let like: LikeResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        debug!(story_id = %story, like_id = %like.id, "Like created");
        Ok(like.id)
    }

    async fn delete_like(&self, like: LikeId) -> Result<()> {
        let path = format!("story/like/{like}/");
        ensure_success(self.request(Method::DELETE, &path).send().await?).await?;
        debug!(like_id = %like, "Like removed");
        Ok(())
    }
}

/// Turn a non-2xx response into [`ClientError::Api`], preferring the
/// body's `message` field, then the raw body text.
async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or(text);

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

fn split_chunks(data: &Bytes, chunk_size: usize) -> Vec<Bytes> {
    let chunk_size = chunk_size.max(1);
    (0..data.len())
        .step_by(chunk_size)
        .map(|start| data.slice(start..(start + chunk_size).min(data.len())))
        .collect()
}

/// Shared handle used by the pipeline and actions.
pub type SharedApi = Arc<dyn StoryApi>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Multipart, Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::Mutex;

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn api(base_url: String, chunk_size: usize) -> HttpStoryApi {
        let config = ClientConfig {
            api_base_url: base_url,
            init_data: Some("query_id=abc&user=1".into()),
            upload_chunk_size: chunk_size,
            ..ClientConfig::default()
        };
        HttpStoryApi::new(&config).unwrap()
    }

    fn story_json(id: i64, url: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "bot_client": { "id": 7, "username": "dilnoza" },
            "story": url,
            "likes_count": 0,
            "has_user_liked": -1
        })
    }

    #[derive(Debug, Default, Clone)]
    struct Received {
        auth: Option<String>,
        user_agent: Option<String>,
        file_name: Option<String>,
        content_type: Option<String>,
        story_len: usize,
        place: Option<String>,
    }

    async fn upload_handler(
        received: Arc<Mutex<Received>>,
        headers: HeaderMap,
        mut multipart: Multipart,
    ) -> Json<serde_json::Value> {
        let mut seen = Received {
            auth: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            user_agent: headers
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            ..Received::default()
        };
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().map(String::from);
            match name.as_deref() {
                Some("story") => {
                    seen.file_name = field.file_name().map(String::from);
                    seen.content_type = field.content_type().map(String::from);
                    seen.story_len = field.bytes().await.unwrap().len();
                }
                Some("place") => seen.place = Some(field.text().await.unwrap()),
                _ => {}
            }
        }
        *received.lock().unwrap() = seen;
        Json(story_json(99, "https://cdn/s/99"))
    }

    #[tokio::test]
    async fn test_create_story_sends_multipart_and_reports_progress() {
        let received = Arc::new(Mutex::new(Received::default()));
        let sink = received.clone();
        let router = Router::new().route(
            "/story/story/",
            post(move |headers: HeaderMap, multipart: Multipart| {
                upload_handler(sink.clone(), headers, multipart)
            }),
        );
        let api = api(spawn_server(router).await, 1024);

        let reports = Arc::new(Mutex::new(Vec::new()));
        let reports_sink = reports.clone();
        let progress: ProgressFn = Arc::new(move |pct| reports_sink.lock().unwrap().push(pct));

        let file = MediaBlob::recorded_video(Bytes::from(vec![1u8; 10 * 1024]));
        let story = api
            .create_story(&file, Some(PlaceId(12)), Some(progress))
            .await
            .unwrap();

        assert_eq!(story.id, StoryId(99));
        // The URL has no extension; the uploaded kind is carried explicitly.
        assert_eq!(story.media_kind, Some(placestory_shared::MediaKind::Video));

        let seen = received.lock().unwrap().clone();
        assert_eq!(seen.auth.as_deref(), Some("tma query_id=abc&user=1"));
        assert!(seen.user_agent.unwrap().starts_with("Placestory/"));
        assert_eq!(seen.file_name.as_deref(), Some("story.webm"));
        assert_eq!(seen.content_type.as_deref(), Some("video/webm"));
        assert_eq!(seen.story_len, 10 * 1024);
        assert_eq!(seen.place.as_deref(), Some("12"));

        let reports = reports.lock().unwrap();
        assert_eq!(reports.last(), Some(&100));
        assert!(reports.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_create_story_without_id_is_failure() {
        let router = Router::new().route(
            "/story/story/",
            post(|_body: axum::body::Bytes| async {
                Json(serde_json::json!({ "message": "quota exceeded" }))
            }),
        );
        let api = api(spawn_server(router).await, 1024);

        let file = MediaBlob::captured_photo(Bytes::from_static(b"jpeg"));
        let err = api.create_story(&file, None, None).await.unwrap_err();
        assert!(matches!(err, ClientError::MissingId { status: 200, .. }));
        assert_eq!(err.to_string(), "quota exceeded");
    }

    #[tokio::test]
    async fn test_create_story_http_error_status() {
        let router = Router::new().route(
            "/story/story/",
            post(|_body: axum::body::Bytes| async { (StatusCode::PAYLOAD_TOO_LARGE, "too big") }),
        );
        let api = api(spawn_server(router).await, 1024);

        let file = MediaBlob::captured_photo(Bytes::from_static(b"jpeg"));
        let err = api.create_story(&file, None, None).await.unwrap_err();
        assert_eq!(err.status(), Some(413));
        assert_eq!(err.to_string(), "Error 413: Upload failed with status 413");
    }

    #[tokio::test]
    async fn test_list_stories_with_place_filter() {
        let router = Router::new().route(
            "/story/story",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q.get("place").map(String::as_str), Some("3"));
                Json(serde_json::json!([
                    story_json(1, "a.jpg"),
                    story_json(2, "b.mp4"),
                ]))
            }),
        );
        let api = api(spawn_server(router).await, 1024);

        let stories = api.list_stories(Some(PlaceId(3))).await.unwrap();
        assert_eq!(stories.len(), 2);
        assert_eq!(stories[0].kind(), placestory_shared::MediaKind::Image);
    }

    #[tokio::test]
    async fn test_list_stories_accepts_paged_body() {
        let router = Router::new().route(
            "/story/story",
            get(|| async { Json(serde_json::json!({ "results": [story_json(5, "x.png")] })) }),
        );
        let api = api(spawn_server(router).await, 1024);

        let stories = api.list_stories(None).await.unwrap();
        assert_eq!(stories[0].id, StoryId(5));
    }

    #[tokio::test]
    async fn test_like_roundtrip_and_error_message() {
        let router = Router::new()
            .route(
                "/story/like/",
                post(|Json(body): Json<serde_json::Value>| async move {
                    assert_eq!(body["story"], 4);
                    assert_eq!(body["bot_client"], 7);
                    Json(serde_json::json!({ "id": 31 }))
                }),
            )
            .route(
                "/story/like/:id/",
                delete(|Path(id): Path<i64>| async move {
                    if id == 31 {
                        StatusCode::NO_CONTENT
                    } else {
                        StatusCode::NOT_FOUND
                    }
                }),
            );
        let api = api(spawn_server(router).await, 1024);

        let like = api.create_like(StoryId(4), AuthorId(7)).await.unwrap();
        assert_eq!(like, LikeId(31));
        api.delete_like(like).await.unwrap();
        assert_eq!(api.delete_like(LikeId(8)).await.unwrap_err().status(), Some(404));
    }

    #[tokio::test]
    async fn test_delete_story_surfaces_server_message() {
        let router = Router::new().route(
            "/story/story/:id/",
            delete(|| async {
                (
                    StatusCode::FORBIDDEN,
                    Json(serde_json::json!({ "message": "not yours" })),
                )
            }),
        );
        let api = api(spawn_server(router).await, 1024);

        let err = api.delete_story(StoryId(2)).await.unwrap_err();
        assert_eq!(err.to_string(), "Error 403: not yours");
    }

    #[test]
    fn test_split_chunks() {
        let data = Bytes::from_static(b"abcdefg");
        let chunks = split_chunks(&data, 3);
        assert_eq!(
            chunks,
            vec![
                Bytes::from_static(b"abc"),
                Bytes::from_static(b"def"),
                Bytes::from_static(b"g"),
            ]
        );
        assert!(split_chunks(&Bytes::new(), 3).is_empty());
    }

    #[test]
    fn test_credential_is_redacted() {
        let c = Credential::new("secret");
        assert_eq!(format!("{c:?}"), "Credential(<redacted>)");
    }
}
