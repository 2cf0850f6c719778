//! Like and delete actions on a story in the feed.

use placestory_shared::{AuthorId, StoryError, StoryId, StoryRecord, ViewerLike};
use tracing::{debug, error, info, warn};

use crate::api::StoryApi;
use crate::events::{emit_event, EventSender, StoryEvent};
use crate::feed::{SharedFeed, StoryFeed, StoryPatch};

fn with_feed<T>(
    feed: &SharedFeed,
    on_poison: fn(String) -> StoryError,
    f: impl FnOnce(&mut StoryFeed) -> T,
) -> Result<T, StoryError> {
    let mut guard = feed
        .lock()
        .map_err(|e| on_poison(format!("Lock poisoned: {e}")))?;
    Ok(f(&mut guard))
}

/// Flip the viewer's like on `story_id`.
///
/// The feed is updated optimistically before the request: the count moves
/// by one and the state becomes [`ViewerLike::Pending`] (liking) or
/// [`ViewerLike::Unliking`] (unliking). On failure both fields are restored
/// to their values before the attempt. A toggle while either request is in
/// flight is ignored.
pub async fn toggle_like(
    api: &dyn StoryApi,
    feed: &SharedFeed,
    story_id: StoryId,
    viewer: AuthorId,
    events: Option<&EventSender>,
) -> Result<StoryRecord, StoryError> {
    let before = with_feed(feed, StoryError::LikeToggleFailed, |f| f.find(story_id).cloned())?
        .ok_or_else(|| StoryError::LikeToggleFailed(format!("story {story_id} not in feed")))?;

    let optimistic = match before.viewer_like {
        ViewerLike::Pending | ViewerLike::Unliking(_) => {
            debug!(story_id = %story_id, "Like change in flight, ignoring toggle");
            return Ok(before);
        }
        ViewerLike::NotLiked => StoryPatch::likes(before.like_count + 1, ViewerLike::Pending),
        ViewerLike::Liked(like_id) => StoryPatch::likes(
            before.like_count.saturating_sub(1),
            ViewerLike::Unliking(like_id),
        ),
    };
    with_feed(feed, StoryError::LikeToggleFailed, |f| f.update(story_id, &optimistic))?;

    let outcome = match before.viewer_like {
        ViewerLike::Liked(like_id) => api.delete_like(like_id).await.map(|()| None),
        _ => api.create_like(story_id, viewer).await.map(Some),
    };

    let settled = match outcome {
        Ok(Some(like_id)) => StoryPatch {
            like_count: None,
            viewer_like: Some(ViewerLike::Liked(like_id)),
        },
        Ok(None) => StoryPatch {
            like_count: None,
            viewer_like: Some(ViewerLike::NotLiked),
        },
        Err(e) => {
            warn!(story_id = %story_id, "Like toggle failed, rolling back: {}", e);
            let rollback = StoryPatch::likes(before.like_count, before.viewer_like);
            with_feed(feed, StoryError::LikeToggleFailed, |f| f.update(story_id, &rollback))?;
            return Err(StoryError::LikeToggleFailed(e.user_message()));
        }
    };

    let story = with_feed(feed, StoryError::LikeToggleFailed, |f| {
        f.update(story_id, &settled);
        f.find(story_id).cloned()
    })?
    .ok_or_else(|| StoryError::LikeToggleFailed(format!("story {story_id} left the feed")))?;

    debug!(story_id = %story_id, likes = story.like_count, liked = story.viewer_like.is_liked(), "Like toggled");
    if let Some(events) = events {
        emit_event(events, StoryEvent::Updated(story.clone()));
    }
    Ok(story)
}

/// Delete one of the viewer's own stories.
///
/// Nothing in the feed changes unless the server confirms the deletion.
pub async fn delete_story(
    api: &dyn StoryApi,
    feed: &SharedFeed,
    story_id: StoryId,
    viewer: AuthorId,
    events: Option<&EventSender>,
) -> Result<StoryRecord, StoryError> {
    let story = with_feed(feed, StoryError::DeleteFailed, |f| f.find(story_id).cloned())?
        .ok_or_else(|| StoryError::DeleteFailed(format!("story {story_id} not found")))?;

    if story.author_id() != viewer {
        warn!(story_id = %story_id, viewer = %viewer, "Delete refused for non-author");
        return Err(StoryError::DeleteFailed(
            "only the author can delete this story".into(),
        ));
    }

    if let Err(e) = api.delete_story(story_id).await {
        error!(story_id = %story_id, "Failed to delete story: {}", e);
        return Err(StoryError::DeleteFailed(e.user_message()));
    }

    with_feed(feed, StoryError::DeleteFailed, |f| f.remove(story_id))?;
    info!(story_id = %story_id, "Story removed from feed");
    if let Some(events) = events {
        emit_event(events, StoryEvent::Deleted(story_id));
    }
    Ok(story)
}
