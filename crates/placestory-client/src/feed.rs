//! Per-author story aggregation.
//!
//! The feed keeps stories grouped by author in display order and stays
//! consistent as stories are added, patched and removed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use placestory_shared::{AuthorId, StoryGroup, StoryId, StoryRecord, ViewerLike};
use tracing::debug;

use crate::events::{EventReceiver, StoryEvent};

/// Feed shared between the screen and in-flight actions.
pub type SharedFeed = Arc<Mutex<StoryFeed>>;

/// Partial update applied to a story in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoryPatch {
    pub like_count: Option<u64>,
    pub viewer_like: Option<ViewerLike>,
}

impl StoryPatch {
    pub fn likes(like_count: u64, viewer_like: ViewerLike) -> Self {
        Self {
            like_count: Some(like_count),
            viewer_like: Some(viewer_like),
        }
    }

    fn apply(&self, story: &mut StoryRecord) {
        if let Some(count) = self.like_count {
            story.like_count = count;
        }
        if let Some(like) = self.viewer_like {
            story.viewer_like = like;
        }
    }
}

/// Group a flat list by author, keeping the first-seen author order and the
/// input order within each group.
pub fn group_by_author(stories: Vec<StoryRecord>) -> Vec<StoryGroup> {
    let mut groups: Vec<StoryGroup> = Vec::new();
    let mut index: HashMap<AuthorId, usize> = HashMap::new();

    for story in stories {
        match index.get(&story.author_id()) {
            Some(&i) => groups[i].stories.push(story),
            None => {
                index.insert(story.author_id(), groups.len());
                groups.push(StoryGroup {
                    author: story.author.clone(),
                    stories: vec![story],
                });
            }
        }
    }

    groups
}

#[derive(Debug, Default)]
pub struct StoryFeed {
    groups: Vec<StoryGroup>,
    watched: HashSet<AuthorId>,
}

impl StoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_stories(stories: Vec<StoryRecord>) -> Self {
        Self {
            groups: group_by_author(stories),
            watched: HashSet::new(),
        }
    }

    pub fn into_shared(self) -> SharedFeed {
        Arc::new(Mutex::new(self))
    }

    /// Replace the contents with a fresh fetch. Watched authors are kept.
    pub fn replace_all(&mut self, stories: Vec<StoryRecord>) {
        self.groups = group_by_author(stories);
    }

    pub fn groups(&self) -> &[StoryGroup] {
        &self.groups
    }

    pub fn group(&self, author: AuthorId) -> Option<&StoryGroup> {
        self.groups.iter().find(|g| g.author_id() == author)
    }

    pub fn story_count(&self) -> usize {
        self.groups.iter().map(StoryGroup::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn find(&self, id: StoryId) -> Option<&StoryRecord> {
        self.groups
            .iter()
            .flat_map(|g| g.stories.iter())
            .find(|s| s.id == id)
    }

    fn find_mut(&mut self, id: StoryId) -> Option<&mut StoryRecord> {
        self.groups
            .iter_mut()
            .flat_map(|g| g.stories.iter_mut())
            .find(|s| s.id == id)
    }

    /// Prepend to the author's group, or open a new group at the front.
    pub fn insert(&mut self, story: StoryRecord) {
        debug!(story_id = %story.id, author = %story.author_id(), "Inserting story");
        let author = story.author_id();
        match self.groups.iter().position(|g| g.author_id() == author) {
            Some(i) => self.groups[i].stories.insert(0, story),
            None => self.groups.insert(
                0,
                StoryGroup {
                    author: story.author.clone(),
                    stories: vec![story],
                },
            ),
        }
    }

    /// Patch a story in place. Returns false if no story has that id.
    pub fn update(&mut self, id: StoryId, patch: &StoryPatch) -> bool {
        match self.find_mut(id) {
            Some(story) => {
                patch.apply(story);
                true
            }
            None => false,
        }
    }

    /// Replace a story wholesale, keeping its position.
    pub fn replace(&mut self, story: StoryRecord) -> bool {
        match self.find_mut(story.id) {
            Some(slot) => {
                *slot = story;
                true
            }
            None => false,
        }
    }

    /// Remove a story; its group goes too once empty.
    pub fn remove(&mut self, id: StoryId) -> Option<StoryRecord> {
        let group_idx = self
            .groups
            .iter()
            .position(|g| g.stories.iter().any(|s| s.id == id))?;

        let group = &mut self.groups[group_idx];
        let story_idx = group.stories.iter().position(|s| s.id == id)?;
        let removed = group.stories.remove(story_idx);

        if group.stories.is_empty() {
            self.groups.remove(group_idx);
        }

        debug!(story_id = %id, "Removed story");
        Some(removed)
    }

    pub fn mark_watched(&mut self, author: AuthorId) {
        self.watched.insert(author);
    }

    pub fn is_watched(&self, author: AuthorId) -> bool {
        self.watched.contains(&author)
    }

    pub fn apply(&mut self, event: StoryEvent) {
        match event {
            StoryEvent::Added(story) => self.insert(story),
            StoryEvent::Updated(story) => {
                self.replace(story);
            }
            StoryEvent::Deleted(id) => {
                self.remove(id);
            }
        }
    }

    /// Apply every event already queued on `rx`. Returns how many were applied.
    pub fn drain(&mut self, rx: &mut EventReceiver) -> usize {
        let mut applied = 0;
        while let Ok(event) = rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::tests::record;

    fn ids(group: &StoryGroup) -> Vec<i64> {
        group.stories.iter().map(|s| s.id.0).collect()
    }

    fn authors(feed: &StoryFeed) -> Vec<i64> {
        feed.groups().iter().map(|g| g.author_id().0).collect()
    }

    #[test]
    fn test_group_by_author_keeps_first_seen_order() {
        let groups = group_by_author(vec![
            record(1, 20),
            record(2, 10),
            record(3, 20),
            record(4, 30),
            record(5, 10),
        ]);

        let order: Vec<i64> = groups.iter().map(|g| g.author_id().0).collect();
        assert_eq!(order, vec![20, 10, 30]);
        assert_eq!(ids(&groups[0]), vec![1, 3]);
        assert_eq!(ids(&groups[1]), vec![2, 5]);
        assert_eq!(ids(&groups[2]), vec![4]);
    }

    #[test]
    fn test_group_by_author_empty() {
        assert!(group_by_author(Vec::new()).is_empty());
    }

    #[test]
    fn test_insert_known_author_prepends_without_new_group() {
        let mut feed = StoryFeed::from_stories(vec![record(1, 10), record(2, 20)]);
        feed.insert(record(9, 20));

        assert_eq!(authors(&feed), vec![10, 20]);
        assert_eq!(ids(feed.group(AuthorId(20)).unwrap()), vec![9, 2]);
    }

    #[test]
    fn test_insert_new_author_goes_first() {
        let mut feed = StoryFeed::from_stories(vec![record(1, 10)]);
        feed.insert(record(2, 30));
        feed.insert(record(3, 40));

        assert_eq!(authors(&feed), vec![40, 30, 10]);
        assert_eq!(feed.story_count(), 3);
    }

    #[test]
    fn test_update_in_place() {
        let mut feed = StoryFeed::from_stories(vec![record(1, 10), record(2, 10)]);
        let patch = StoryPatch::likes(5, ViewerLike::Liked(placestory_shared::LikeId(3)));
        assert!(feed.update(StoryId(2), &patch));

        let story = feed.find(StoryId(2)).unwrap();
        assert_eq!(story.like_count, 5);
        assert!(story.viewer_like.is_liked());
        assert_eq!(ids(&feed.groups()[0]), vec![1, 2]);

        assert!(!feed.update(StoryId(99), &StoryPatch::default()));
    }

    #[test]
    fn test_removing_every_story_drops_group() {
        let mut feed =
            StoryFeed::from_stories(vec![record(1, 10), record(2, 20), record(3, 10)]);

        assert!(feed.remove(StoryId(1)).is_some());
        assert!(feed.group(AuthorId(10)).is_some());
        assert!(feed.remove(StoryId(3)).is_some());
        assert!(feed.group(AuthorId(10)).is_none());
        assert_eq!(authors(&feed), vec![20]);

        assert!(feed.remove(StoryId(3)).is_none());
    }

    #[test]
    fn test_watched_survives_refresh() {
        let mut feed = StoryFeed::from_stories(vec![record(1, 10)]);
        feed.mark_watched(AuthorId(10));
        feed.replace_all(vec![record(2, 10), record(3, 20)]);

        assert!(feed.is_watched(AuthorId(10)));
        assert!(!feed.is_watched(AuthorId(20)));
        assert_eq!(feed.story_count(), 2);
    }

    #[test]
    fn test_drain_applies_events() {
        let (tx, mut rx) = crate::events::channel();
        let mut feed = StoryFeed::from_stories(vec![record(1, 10), record(2, 20)]);

        let mut liked = record(1, 10);
        liked.like_count = 4;
        tx.send(StoryEvent::Added(record(5, 30))).unwrap();
        tx.send(StoryEvent::Updated(liked)).unwrap();
        tx.send(StoryEvent::Deleted(StoryId(2))).unwrap();

        assert_eq!(feed.drain(&mut rx), 3);
        assert_eq!(authors(&feed), vec![30, 10]);
        assert_eq!(feed.find(StoryId(1)).unwrap().like_count, 4);
        assert_eq!(feed.drain(&mut rx), 0);
    }
}
