use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;

use crate::application::admin::{AdminError, not_found_as, notify};
use crate::application::repos::{ContentRepo, ContentWriteRepo, SpeakersRepo, TagsRepo};
use crate::cache::{CacheTrigger, ChangeKind};
use crate::domain::drafts::ContentDraft;
use crate::domain::entities::ContentRecord;
use crate::domain::types::ItemKind;

/// Create, replace, patch and delete records of the five content collections.
#[derive(Clone)]
pub struct AdminContentService {
    reader: Arc<dyn ContentRepo>,
    writer: Arc<dyn ContentWriteRepo>,
    tags: Arc<dyn TagsRepo>,
    speakers: Arc<dyn SpeakersRepo>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl AdminContentService {
    pub fn new(
        reader: Arc<dyn ContentRepo>,
        writer: Arc<dyn ContentWriteRepo>,
        tags: Arc<dyn TagsRepo>,
        speakers: Arc<dyn SpeakersRepo>,
    ) -> Self {
        Self {
            reader,
            writer,
            tags,
            speakers,
            cache_trigger: None,
        }
    }

    /// Set the cache trigger for this service (optional).
    pub fn with_cache_trigger_opt(mut self, trigger: Option<Arc<CacheTrigger>>) -> Self {
        self.cache_trigger = trigger;
        self
    }

    pub async fn create(&self, draft: ContentDraft) -> Result<ContentRecord, AdminError> {
        let draft = draft.with_default_dates(OffsetDateTime::now_utc());
        self.check(&draft).await?;

        let record = self.writer.create_content(draft).await?;
        notify(&self.cache_trigger, ChangeKind::Content).await?;
        Ok(record)
    }

    /// Full update: every field comes from `draft`.
    pub async fn replace(
        &self,
        kind: ItemKind,
        id: i64,
        draft: ContentDraft,
    ) -> Result<ContentRecord, AdminError> {
        let existing = self.existing(kind, id).await?;
        let fallback = existing
            .timestamp()
            .unwrap_or_else(OffsetDateTime::now_utc);
        let draft = draft.with_default_dates(fallback);
        self.store(kind, id, draft).await
    }

    /// Partial update: keys present in `patch` replace the stored values.
    pub async fn patch(
        &self,
        kind: ItemKind,
        id: i64,
        patch: Value,
    ) -> Result<ContentRecord, AdminError> {
        if !patch.is_object() {
            return Err(AdminError::validation("body", "expected a JSON object"));
        }

        let existing = self.existing(kind, id).await?;
        let draft = ContentDraft::from(&existing)
            .merge_patch(patch)
            .map_err(|err| AdminError::validation("body", err.to_string()))?;
        self.store(kind, id, draft).await
    }

    pub async fn delete(&self, kind: ItemKind, id: i64) -> Result<(), AdminError> {
        self.writer
            .delete_content(kind, id)
            .await
            .map_err(not_found_as(kind.entity_label()))?;
        notify(&self.cache_trigger, ChangeKind::Content).await
    }

    async fn existing(&self, kind: ItemKind, id: i64) -> Result<ContentRecord, AdminError> {
        self.reader
            .find_content(kind, id)
            .await?
            .ok_or(AdminError::NotFound {
                entity: kind.entity_label(),
            })
    }

    async fn store(
        &self,
        kind: ItemKind,
        id: i64,
        draft: ContentDraft,
    ) -> Result<ContentRecord, AdminError> {
        if draft.kind() != kind {
            return Err(AdminError::validation("body", "draft does not match the collection"));
        }
        self.check(&draft).await?;

        let record = self
            .writer
            .update_content(id, draft)
            .await
            .map_err(not_found_as(kind.entity_label()))?;
        notify(&self.cache_trigger, ChangeKind::Content).await?;
        Ok(record)
    }

    /// Validate fields and make sure every referenced tag and speaker exists.
    async fn check(&self, draft: &ContentDraft) -> Result<(), AdminError> {
        draft.validate()?;

        let tag_ids: BTreeSet<i64> = draft.tag_ids().iter().copied().collect();
        for id in tag_ids {
            if self.tags.find_tag_by_id(id).await?.is_none() {
                return Err(AdminError::UnknownReference {
                    field: "tag_ids",
                    id,
                });
            }
        }

        let speaker_ids: BTreeSet<i64> = draft.speaker_ids().iter().copied().collect();
        for id in speaker_ids {
            if self.speakers.find_speaker(id).await?.is_none() {
                return Err(AdminError::UnknownReference {
                    field: "speaker_ids",
                    id,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::{CacheConfig, MemoryCacheStore, ResponseCache};
    use crate::domain::drafts::BlogPostDraft;
    use crate::infra::memory::MemoryRepositories;

    fn service(repos: &Arc<MemoryRepositories>) -> AdminContentService {
        AdminContentService::new(repos.clone(), repos.clone(), repos.clone(), repos.clone())
    }

    fn blog(title: &str, tag_ids: Vec<i64>) -> ContentDraft {
        ContentDraft::Blog(BlogPostDraft {
            title: title.to_string(),
            summary: "Notes from the lab".into(),
            content: String::new(),
            image_url: String::new(),
            author_name: "Club".into(),
            published_date: None,
            tag_ids,
        })
    }

    #[tokio::test]
    async fn create_fills_the_publish_date() {
        let repos = Arc::new(MemoryRepositories::default());
        let record = service(&repos)
            .create(blog("Soldering 101", Vec::new()))
            .await
            .expect("create");
        assert!(record.timestamp().is_some());
        assert_eq!(record.kind(), ItemKind::Blogs);
    }

    #[tokio::test]
    async fn unknown_tags_are_rejected() {
        let repos = Arc::new(MemoryRepositories::default());
        let err = service(&repos)
            .create(blog("Soldering 101", vec![99]))
            .await
            .expect_err("unknown tag");
        assert!(matches!(
            err,
            AdminError::UnknownReference {
                field: "tag_ids",
                id: 99
            }
        ));
    }

    #[tokio::test]
    async fn patch_merges_into_the_stored_record() {
        let repos = Arc::new(MemoryRepositories::default());
        let service = service(&repos);
        let record = service
            .create(blog("Soldering 101", Vec::new()))
            .await
            .expect("create");

        let patched = service
            .patch(ItemKind::Blogs, record.id(), json!({"title": "Soldering 102"}))
            .await
            .expect("patch");

        match patched {
            ContentRecord::Blog(post) => {
                assert_eq!(post.title, "Soldering 102");
                assert_eq!(post.summary, "Notes from the lab");
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[tokio::test]
    async fn writes_bump_the_cache_generation() {
        let repos = Arc::new(MemoryRepositories::default());
        let config = CacheConfig::default();
        let cache = ResponseCache::new(config.clone(), Arc::new(MemoryCacheStore::new(&config)));
        let service = service(&repos)
            .with_cache_trigger_opt(Some(Arc::new(CacheTrigger::new(cache.clone()))));

        let before = cache.generation().current().await.expect("generation");
        service
            .create(blog("Soldering 101", Vec::new()))
            .await
            .expect("create");
        assert_ne!(cache.generation().current().await.expect("generation"), before);
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let repos = Arc::new(MemoryRepositories::default());
        let err = service(&repos)
            .delete(ItemKind::Events, 7)
            .await
            .expect_err("missing");
        assert!(matches!(err, AdminError::NotFound { entity: "event" }));
    }
}
