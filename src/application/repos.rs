//! Repository traits describing persistence adapters.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::drafts::{ContentDraft, SpeakerDraft};
use crate::domain::entities::{ContentRecord, SpeakerRecord, TagRecord};
use crate::domain::types::{ItemKind, SearchDepth, SortMode};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Which rows of one collection a listing or count should consider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFilter {
    pub kind: ItemKind,
    pub tag_id: Option<i64>,
    /// Case-insensitive substring, already trimmed. Empty means no text filter.
    pub search: Option<String>,
    pub depth: SearchDepth,
    pub sort: SortMode,
}

impl ContentFilter {
    pub fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            tag_id: None,
            search: None,
            depth: SearchDepth::Summary,
            sort: SortMode::Recent,
        }
    }

    pub fn with_tag(mut self, tag_id: Option<i64>) -> Self {
        self.tag_id = tag_id;
        self
    }

    pub fn with_search(mut self, search: Option<&str>, depth: SearchDepth) -> Self {
        self.search = search
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
            .map(str::to_string);
        self.depth = depth;
        self
    }

    pub fn sorted(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }
}

/// Offset/limit slice of an ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

impl Window {
    pub fn first(limit: u64) -> Self {
        Self { offset: 0, limit }
    }
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    /// Every tag ordered by name.
    async fn list_tags(&self) -> Result<Vec<TagRecord>, RepoError>;
    async fn find_tag_by_id(&self, id: i64) -> Result<Option<TagRecord>, RepoError>;
    async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError>;
    async fn find_tag_by_name(&self, name: &str) -> Result<Option<TagRecord>, RepoError>;
    /// Tags whose name contains `needle` case-insensitively, ordered by name.
    async fn search_tags(&self, needle: &str, limit: u64) -> Result<Vec<TagRecord>, RepoError>;
    /// Number of `kind` items linked to each tag. Tags with no links are absent.
    async fn tag_counts(&self, kind: ItemKind) -> Result<HashMap<i64, u64>, RepoError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTagParams {
    pub name: String,
    pub slug: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTagParams {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub color: String,
}

#[async_trait]
pub trait TagsWriteRepo: Send + Sync {
    async fn create_tag(&self, params: CreateTagParams) -> Result<TagRecord, RepoError>;
    async fn update_tag(&self, params: UpdateTagParams) -> Result<TagRecord, RepoError>;
    async fn delete_tag(&self, id: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait ContentRepo: Send + Sync {
    async fn count_content(&self, filter: &ContentFilter) -> Result<u64, RepoError>;
    /// Records in listing order. `None` returns every match.
    async fn list_content(
        &self,
        filter: &ContentFilter,
        window: Option<Window>,
    ) -> Result<Vec<ContentRecord>, RepoError>;
    async fn find_content(&self, kind: ItemKind, id: i64)
    -> Result<Option<ContentRecord>, RepoError>;
}

#[async_trait]
pub trait ContentWriteRepo: Send + Sync {
    async fn create_content(&self, draft: ContentDraft) -> Result<ContentRecord, RepoError>;
    async fn update_content(&self, id: i64, draft: ContentDraft)
    -> Result<ContentRecord, RepoError>;
    async fn delete_content(&self, kind: ItemKind, id: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait SpeakersRepo: Send + Sync {
    async fn list_speakers(&self) -> Result<Vec<SpeakerRecord>, RepoError>;
    async fn find_speaker(&self, id: i64) -> Result<Option<SpeakerRecord>, RepoError>;
}

#[async_trait]
pub trait SpeakersWriteRepo: Send + Sync {
    async fn create_speaker(&self, draft: SpeakerDraft) -> Result<SpeakerRecord, RepoError>;
    async fn update_speaker(&self, id: i64, draft: SpeakerDraft)
    -> Result<SpeakerRecord, RepoError>;
    async fn delete_speaker(&self, id: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Succeeds when the backend answers a trivial query.
    async fn ping(&self) -> Result<(), RepoError>;
}
