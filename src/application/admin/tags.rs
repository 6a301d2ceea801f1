use std::sync::Arc;

use serde::Deserialize;

use crate::application::admin::{AdminError, not_found_as, notify};
use crate::application::repos::{
    CreateTagParams, RepoError, TagsRepo, TagsWriteRepo, UpdateTagParams,
};
use crate::cache::{CacheTrigger, ChangeKind};
use crate::domain::entities::{DEFAULT_TAG_COLOR, TagRecord};
use crate::domain::slug::{UniqueSlugError, unique_tag_slug};

const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct TagInput {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Clone)]
pub struct AdminTagService {
    reader: Arc<dyn TagsRepo>,
    writer: Arc<dyn TagsWriteRepo>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl AdminTagService {
    pub fn new(reader: Arc<dyn TagsRepo>, writer: Arc<dyn TagsWriteRepo>) -> Self {
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

    /// Create a tag. The slug is derived from the name once and never recomputed.
    pub async fn create_tag(&self, input: TagInput) -> Result<TagRecord, AdminError> {
        let name = normalize_name(&input.name)?;
        let color = normalize_color(input.color.as_deref())?;
        self.ensure_name_free(&name, None).await?;

        let reader = self.reader.clone();
        let slug = unique_tag_slug(&name, move |candidate| {
            let reader = reader.clone();
            let candidate = candidate.to_string();
            async move {
                reader
                    .find_tag_by_slug(&candidate)
                    .await
                    .map(|existing| existing.is_none())
            }
        })
        .await
        .map_err(|err| match err {
            UniqueSlugError::Slug(err) => AdminError::validation("slug", err.to_string()),
            UniqueSlugError::Predicate(err) => AdminError::Repo(err),
        })?;

        let tag = self
            .writer
            .create_tag(CreateTagParams { name, slug, color })
            .await
            .map_err(duplicate_name)?;

        notify(&self.cache_trigger, ChangeKind::Tag).await?;
        Ok(tag)
    }

    pub async fn replace_tag(&self, id: i64, input: TagInput) -> Result<TagRecord, AdminError> {
        self.apply(
            id,
            TagPatch {
                name: Some(input.name),
                color: Some(input.color.unwrap_or_else(|| DEFAULT_TAG_COLOR.to_string())),
            },
        )
        .await
    }

    pub async fn patch_tag(&self, id: i64, patch: TagPatch) -> Result<TagRecord, AdminError> {
        self.apply(id, patch).await
    }

    pub async fn delete_tag(&self, id: i64) -> Result<(), AdminError> {
        self.writer
            .delete_tag(id)
            .await
            .map_err(not_found_as("tag"))?;
        notify(&self.cache_trigger, ChangeKind::Tag).await
    }

    async fn apply(&self, id: i64, patch: TagPatch) -> Result<TagRecord, AdminError> {
        let existing = self
            .reader
            .find_tag_by_id(id)
            .await?
            .ok_or(AdminError::NotFound { entity: "tag" })?;

        let name = match patch.name {
            Some(name) => normalize_name(&name)?,
            None => existing.name.clone(),
        };
        let color = match patch.color {
            Some(color) => normalize_color(Some(&color))?,
            None => existing.color.clone(),
        };
        self.ensure_name_free(&name, Some(id)).await?;

        let tag = self
            .writer
            .update_tag(UpdateTagParams {
                id,
                name,
                slug: existing.slug,
                color,
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => AdminError::NotFound { entity: "tag" },
                other => duplicate_name(other),
            })?;

        notify(&self.cache_trigger, ChangeKind::Tag).await?;
        Ok(tag)
    }

    async fn ensure_name_free(&self, name: &str, current: Option<i64>) -> Result<(), AdminError> {
        match self.reader.find_tag_by_name(name).await? {
            Some(existing) if Some(existing.id) != current => {
                Err(AdminError::Duplicate { field: "name" })
            }
            _ => Ok(()),
        }
    }
}

fn duplicate_name(err: RepoError) -> AdminError {
    match err {
        RepoError::Duplicate { .. } => AdminError::Duplicate { field: "name" },
        other => AdminError::Repo(other),
    }
}

fn normalize_name(raw: &str) -> Result<String, AdminError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AdminError::validation("name", "must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AdminError::validation(
            "name",
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    Ok(name.to_string())
}

fn normalize_color(raw: Option<&str>) -> Result<String, AdminError> {
    let Some(color) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(DEFAULT_TAG_COLOR.to_string());
    };

    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].bytes().all(|b| b.is_ascii_hexdigit());
    if !valid {
        return Err(AdminError::validation("color", "expected a #rrggbb hex color"));
    }
    Ok(color.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::MemoryRepositories;

    fn service() -> AdminTagService {
        let repos = Arc::new(MemoryRepositories::default());
        AdminTagService::new(repos.clone(), repos)
    }

    fn input(name: &str) -> TagInput {
        TagInput {
            name: name.to_string(),
            color: None,
        }
    }

    #[tokio::test]
    async fn create_derives_slug_and_default_color() {
        let tag = service()
            .create_tag(input("Raspberry Pi"))
            .await
            .expect("create");
        assert_eq!(tag.slug, "raspberry-pi");
        assert_eq!(tag.color, DEFAULT_TAG_COLOR);
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let service = service();
        service.create_tag(input("Robotics")).await.expect("create");
        let err = service
            .create_tag(input(" Robotics "))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, AdminError::Duplicate { field: "name" }));
    }

    #[tokio::test]
    async fn renaming_keeps_the_slug() {
        let service = service();
        let tag = service.create_tag(input("Drones")).await.expect("create");
        let renamed = service
            .patch_tag(
                tag.id,
                TagPatch {
                    name: Some("UAVs".into()),
                    color: Some("#FF0000".into()),
                },
            )
            .await
            .expect("patch");
        assert_eq!(renamed.name, "UAVs");
        assert_eq!(renamed.slug, "drones");
        assert_eq!(renamed.color, "#ff0000");
    }

    #[tokio::test]
    async fn invalid_input_is_reported_per_field() {
        let service = service();
        let err = service.create_tag(input("   ")).await.expect_err("blank");
        assert!(matches!(err, AdminError::Validation { field: "name", .. }));

        let err = service
            .create_tag(TagInput {
                name: "Rust".into(),
                color: Some("blue".into()),
            })
            .await
            .expect_err("color");
        assert!(matches!(err, AdminError::Validation { field: "color", .. }));
    }

    #[tokio::test]
    async fn deleting_a_missing_tag_is_not_found() {
        let err = service().delete_tag(404).await.expect_err("missing");
        assert!(matches!(err, AdminError::NotFound { entity: "tag" }));
    }
}
