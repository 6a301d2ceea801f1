//! In-process repositories.
//!
//! Used when no database url is configured and by the test suites. Ordering,
//! filtering and uniqueness rules match the Postgres adapters.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::application::repos::{
    ContentFilter, ContentRepo, ContentWriteRepo, CreateTagParams, HealthCheck, RepoError,
    SpeakersRepo, SpeakersWriteRepo, TagsRepo, TagsWriteRepo, UpdateTagParams, Window,
};
use crate::domain::drafts::{ContentDraft, SpeakerDraft};
use crate::domain::entities::{ContentRecord, SpeakerRecord, TagRecord};
use crate::domain::types::{ItemKind, SortMode};

#[derive(Default)]
pub struct MemoryRepositories {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    sequences: HashMap<&'static str, i64>,
    tags: BTreeMap<i64, TagRecord>,
    speakers: BTreeMap<i64, SpeakerRecord>,
    content: BTreeMap<(ItemKind, i64), StoredContent>,
}

#[derive(Clone)]
struct StoredContent {
    draft: ContentDraft,
}

impl MemoryState {
    fn next_id(&mut self, table: &'static str) -> i64 {
        let next = self.sequences.entry(table).or_insert(0);
        *next += 1;
        *next
    }

    fn hydrate(&self, id: i64, stored: &StoredContent) -> ContentRecord {
        let mut tags: Vec<TagRecord> = stored
            .draft
            .tag_ids()
            .iter()
            .filter_map(|tag_id| self.tags.get(tag_id).cloned())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags.dedup_by_key(|tag| tag.id);

        let speakers = stored
            .draft
            .speaker_ids()
            .iter()
            .filter_map(|speaker_id| self.speakers.get(speaker_id).cloned())
            .collect();

        stored.draft.clone().into_record(id, tags, speakers)
    }

    fn matching(&self, filter: &ContentFilter) -> Vec<ContentRecord> {
        let mut records: Vec<ContentRecord> = self
            .content
            .iter()
            .filter(|((kind, _), _)| *kind == filter.kind)
            .filter(|(_, stored)| {
                filter
                    .tag_id
                    .is_none_or(|tag_id| stored.draft.tag_ids().contains(&tag_id))
            })
            .map(|((_, id), stored)| self.hydrate(*id, stored))
            .filter(|record| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|needle| record.matches_text(needle, filter.depth))
            })
            .collect();

        records.sort_by(|a, b| listing_order(filter.sort, a, b));
        records
    }

    fn ensure_tag_unique(&self, name: &str, slug: &str, current: Option<i64>) -> Result<(), RepoError> {
        for tag in self.tags.values() {
            if Some(tag.id) == current {
                continue;
            }
            if tag.name == name {
                return Err(RepoError::Duplicate {
                    constraint: "tags_name_key".to_string(),
                });
            }
            if tag.slug == slug {
                return Err(RepoError::Duplicate {
                    constraint: "tags_slug_key".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Descending with missing values last, the way `DESC NULLS LAST` sorts.
fn desc_nulls_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn order_value(record: &ContentRecord) -> Option<i128> {
    match record.position_rank() {
        Some(rank) => Some(i128::from(rank)),
        None => record.timestamp().map(|ts| ts.unix_timestamp_nanos()),
    }
}

fn listing_order(sort: SortMode, a: &ContentRecord, b: &ContentRecord) -> Ordering {
    match sort {
        SortMode::Popular => b
            .tags()
            .len()
            .cmp(&a.tags().len())
            .then_with(|| desc_nulls_last(order_value(a), order_value(b)))
            .then_with(|| b.id().cmp(&a.id())),
        SortMode::Recent if a.kind().ranks_ascending() => order_value(a)
            .cmp(&order_value(b))
            .then_with(|| a.id().cmp(&b.id())),
        SortMode::Recent => desc_nulls_last(order_value(a), order_value(b))
            .then_with(|| b.id().cmp(&a.id())),
    }
}

fn apply_window<T>(items: Vec<T>, window: Option<Window>) -> Vec<T> {
    match window {
        Some(window) => items
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .collect(),
        None => items,
    }
}

#[async_trait]
impl TagsRepo for MemoryRepositories {
    async fn list_tags(&self) -> Result<Vec<TagRecord>, RepoError> {
        let state = self.state.read().await;
        let mut tags: Vec<TagRecord> = state.tags.values().cloned().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(tags)
    }

    async fn find_tag_by_id(&self, id: i64) -> Result<Option<TagRecord>, RepoError> {
        Ok(self.state.read().await.tags.get(&id).cloned())
    }

    async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state.tags.values().find(|tag| tag.slug == slug).cloned())
    }

    async fn find_tag_by_name(&self, name: &str) -> Result<Option<TagRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state.tags.values().find(|tag| tag.name == name).cloned())
    }

    async fn search_tags(&self, needle: &str, limit: u64) -> Result<Vec<TagRecord>, RepoError> {
        let needle = needle.to_lowercase();
        let tags = self.list_tags().await?;
        Ok(tags
            .into_iter()
            .filter(|tag| tag.name.to_lowercase().contains(&needle))
            .take(limit as usize)
            .collect())
    }

    async fn tag_counts(&self, kind: ItemKind) -> Result<HashMap<i64, u64>, RepoError> {
        let state = self.state.read().await;
        let mut counts = HashMap::new();
        for ((item_kind, _), stored) in &state.content {
            if *item_kind != kind {
                continue;
            }
            for tag_id in stored.draft.tag_ids() {
                if state.tags.contains_key(tag_id) {
                    *counts.entry(*tag_id).or_insert(0) += 1;
                }
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl TagsWriteRepo for MemoryRepositories {
    async fn create_tag(&self, params: CreateTagParams) -> Result<TagRecord, RepoError> {
        let mut state = self.state.write().await;
        state.ensure_tag_unique(&params.name, &params.slug, None)?;

        let id = state.next_id("tags");
        let tag = TagRecord {
            id,
            name: params.name,
            slug: params.slug,
            color: params.color,
        };
        state.tags.insert(id, tag.clone());
        Ok(tag)
    }

    async fn update_tag(&self, params: UpdateTagParams) -> Result<TagRecord, RepoError> {
        let mut state = self.state.write().await;
        if !state.tags.contains_key(&params.id) {
            return Err(RepoError::NotFound);
        }
        state.ensure_tag_unique(&params.name, &params.slug, Some(params.id))?;

        let tag = TagRecord {
            id: params.id,
            name: params.name,
            slug: params.slug,
            color: params.color,
        };
        state.tags.insert(params.id, tag.clone());
        Ok(tag)
    }

    async fn delete_tag(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        if state.tags.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }
        for stored in state.content.values_mut() {
            stored.draft = strip_tag(stored.draft.clone(), id);
        }
        Ok(())
    }
}

fn strip_tag(draft: ContentDraft, tag_id: i64) -> ContentDraft {
    let keep = |ids: &mut Vec<i64>| ids.retain(|id| *id != tag_id);
    match draft {
        ContentDraft::Blog(mut d) => {
            keep(&mut d.tag_ids);
            ContentDraft::Blog(d)
        }
        ContentDraft::Project(mut d) => {
            keep(&mut d.tag_ids);
            ContentDraft::Project(d)
        }
        ContentDraft::Event(mut d) => {
            keep(&mut d.tag_ids);
            ContentDraft::Event(d)
        }
        ContentDraft::Roadmap(mut d) => {
            keep(&mut d.tag_ids);
            ContentDraft::Roadmap(d)
        }
        ContentDraft::Team(mut d) => {
            keep(&mut d.tag_ids);
            ContentDraft::Team(d)
        }
    }
}

#[async_trait]
impl ContentRepo for MemoryRepositories {
    async fn count_content(&self, filter: &ContentFilter) -> Result<u64, RepoError> {
        Ok(self.state.read().await.matching(filter).len() as u64)
    }

    async fn list_content(
        &self,
        filter: &ContentFilter,
        window: Option<Window>,
    ) -> Result<Vec<ContentRecord>, RepoError> {
        let records = self.state.read().await.matching(filter);
        Ok(apply_window(records, window))
    }

    async fn find_content(
        &self,
        kind: ItemKind,
        id: i64,
    ) -> Result<Option<ContentRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .content
            .get(&(kind, id))
            .map(|stored| state.hydrate(id, stored)))
    }
}

#[async_trait]
impl ContentWriteRepo for MemoryRepositories {
    async fn create_content(&self, draft: ContentDraft) -> Result<ContentRecord, RepoError> {
        let mut state = self.state.write().await;
        let kind = draft.kind();
        let id = state.next_id(kind.as_str());
        let stored = StoredContent { draft };
        let record = state.hydrate(id, &stored);
        state.content.insert((kind, id), stored);
        Ok(record)
    }

    async fn update_content(
        &self,
        id: i64,
        draft: ContentDraft,
    ) -> Result<ContentRecord, RepoError> {
        let mut state = self.state.write().await;
        let key = (draft.kind(), id);
        if !state.content.contains_key(&key) {
            return Err(RepoError::NotFound);
        }
        let stored = StoredContent { draft };
        let record = state.hydrate(id, &stored);
        state.content.insert(key, stored);
        Ok(record)
    }

    async fn delete_content(&self, kind: ItemKind, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        state
            .content
            .remove(&(kind, id))
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl SpeakersRepo for MemoryRepositories {
    async fn list_speakers(&self) -> Result<Vec<SpeakerRecord>, RepoError> {
        let state = self.state.read().await;
        let mut speakers: Vec<SpeakerRecord> = state.speakers.values().cloned().collect();
        speakers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(speakers)
    }

    async fn find_speaker(&self, id: i64) -> Result<Option<SpeakerRecord>, RepoError> {
        Ok(self.state.read().await.speakers.get(&id).cloned())
    }
}

#[async_trait]
impl SpeakersWriteRepo for MemoryRepositories {
    async fn create_speaker(&self, draft: SpeakerDraft) -> Result<SpeakerRecord, RepoError> {
        let mut state = self.state.write().await;
        let id = state.next_id("speakers");
        let speaker = speaker_record(id, draft);
        state.speakers.insert(id, speaker.clone());
        Ok(speaker)
    }

    async fn update_speaker(
        &self,
        id: i64,
        draft: SpeakerDraft,
    ) -> Result<SpeakerRecord, RepoError> {
        let mut state = self.state.write().await;
        if !state.speakers.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        let speaker = speaker_record(id, draft);
        state.speakers.insert(id, speaker.clone());
        Ok(speaker)
    }

    async fn delete_speaker(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        if state.speakers.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }
        for stored in state.content.values_mut() {
            if let ContentDraft::Event(event) = &mut stored.draft {
                event.speaker_ids.retain(|speaker_id| *speaker_id != id);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl HealthCheck for MemoryRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

fn speaker_record(id: i64, draft: SpeakerDraft) -> SpeakerRecord {
    SpeakerRecord {
        id,
        name: draft.name,
        profile_image: draft.profile_image,
        bio: draft.bio,
        social_link: draft.social_link,
    }
}
