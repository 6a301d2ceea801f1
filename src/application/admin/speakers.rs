use std::sync::Arc;

use serde_json::Value;

use crate::application::admin::{AdminError, not_found_as, notify};
use crate::application::repos::{SpeakersRepo, SpeakersWriteRepo};
use crate::cache::{CacheTrigger, ChangeKind};
use crate::domain::drafts::SpeakerDraft;
use crate::domain::entities::SpeakerRecord;

#[derive(Clone)]
pub struct AdminSpeakerService {
    reader: Arc<dyn SpeakersRepo>,
    writer: Arc<dyn SpeakersWriteRepo>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl AdminSpeakerService {
    pub fn new(reader: Arc<dyn SpeakersRepo>, writer: Arc<dyn SpeakersWriteRepo>) -> Self {
        Self {
            reader,
            writer,
            cache_trigger: None,
        }
    }

    /// Set the cache trigger for this service (optional).
    pub fn with_cache_trigger_opt(mut self, trigger: Option<Arc<CacheTrigger>>) -> Self {
        self.cache_trigger = trigger;
        self
    }

    pub async fn create(&self, draft: SpeakerDraft) -> Result<SpeakerRecord, AdminError> {
        draft.validate()?;
        let speaker = self.writer.create_speaker(draft).await?;
        notify(&self.cache_trigger, ChangeKind::Speaker).await?;
        Ok(speaker)
    }

    pub async fn replace(&self, id: i64, draft: SpeakerDraft) -> Result<SpeakerRecord, AdminError> {
        draft.validate()?;
        let speaker = self
            .writer
            .update_speaker(id, draft)
            .await
            .map_err(not_found_as("speaker"))?;
        notify(&self.cache_trigger, ChangeKind::Speaker).await?;
        Ok(speaker)
    }

    pub async fn patch(&self, id: i64, patch: Value) -> Result<SpeakerRecord, AdminError> {
        let Value::Object(changes) = patch else {
            return Err(AdminError::validation("body", "expected a JSON object"));
        };

        let existing = self
            .reader
            .find_speaker(id)
            .await?
            .ok_or(AdminError::NotFound { entity: "speaker" })?;

        let mut merged = serde_json::to_value(SpeakerDraft {
            name: existing.name,
            profile_image: existing.profile_image,
            bio: existing.bio,
            social_link: existing.social_link,
        })
        .map_err(|err| AdminError::validation("body", err.to_string()))?;
        if let Value::Object(target) = &mut merged {
            target.extend(changes);
        }
        let draft: SpeakerDraft = serde_json::from_value(merged)
            .map_err(|err| AdminError::validation("body", err.to_string()))?;

        self.replace(id, draft).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), AdminError> {
        self.writer
            .delete_speaker(id)
            .await
            .map_err(not_found_as("speaker"))?;
        notify(&self.cache_trigger, ChangeKind::Speaker).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::infra::memory::MemoryRepositories;

    fn draft() -> SpeakerDraft {
        SpeakerDraft {
            name: "Linus".into(),
            profile_image: "https://img.example/linus.png".into(),
            bio: "Kernel hacker".into(),
            social_link: None,
        }
    }

    #[tokio::test]
    async fn patch_updates_only_given_fields() {
        let repos = Arc::new(MemoryRepositories::default());
        let service = AdminSpeakerService::new(repos.clone(), repos);
        let speaker = service.create(draft()).await.expect("create");

        let patched = service
            .patch(speaker.id, json!({"social_link": "https://social.example/linus"}))
            .await
            .expect("patch");

        assert_eq!(patched.name, "Linus");
        assert_eq!(
            patched.social_link.as_deref(),
            Some("https://social.example/linus")
        );
    }

    #[tokio::test]
    async fn blank_names_fail_validation() {
        let repos = Arc::new(MemoryRepositories::default());
        let service = AdminSpeakerService::new(repos.clone(), repos);
        let err = service
            .create(SpeakerDraft {
                name: " ".into(),
                ..draft()
            })
            .await
            .expect_err("blank");
        assert!(matches!(err, AdminError::Validation { field: "name", .. }));
    }
}
