//! Read-side payload builders for the public API.
//!
//! Every builder here is a pure function of its arguments and the repository
//! state; caching is layered on by the HTTP surface.

use std::sync::Arc;

use serde::Serialize;

use crate::application::items::{ItemQuery, ItemQueryBuilder, UnifiedItem};
use crate::application::pagination::{PageParams, Pagination};
use crate::application::repos::{
    ContentFilter, ContentRepo, RepoError, SpeakersRepo, TagsRepo, Window,
};
use crate::application::tag_index::TagIndex;
use crate::domain::entities::{ContentRecord, SpeakerRecord, TagRecord, TagWithCount};
use crate::domain::slug::derive_slug;
use crate::domain::types::{ItemKind, ItemScope, SearchDepth, SortMode};

pub const MIN_SEARCH_LEN: usize = 2;
pub const SEARCH_LIMIT: u64 = 10;
pub const BOOTSTRAP_POPULAR_TAGS: usize = 10;
pub const BOOTSTRAP_RECENT_ITEMS: u64 = 8;
pub const DEFAULT_POPULAR_TAGS: i64 = 10;
pub const MAX_POPULAR_TAGS: i64 = 50;

const SHORT_QUERY_MESSAGE: &str = "Search query must be at least 2 characters";

#[derive(Debug, Clone, Serialize)]
pub struct TagsPayload {
    pub tags: Vec<TagWithCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagDetailPayload {
    pub tag: TagWithCount,
    pub items: Vec<UnifiedItem>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemsPayload {
    pub items: Vec<UnifiedItem>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchPayload {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub blogs: Vec<ContentRecord>,
    pub projects: Vec<ContentRecord>,
    pub team: Vec<ContentRecord>,
    pub events: Vec<ContentRecord>,
    pub roadmaps: Vec<ContentRecord>,
    pub tags: Vec<TagRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapPayload {
    pub tags: Vec<TagWithCount>,
    pub popular_tags: Vec<TagWithCount>,
    pub events: Vec<ContentRecord>,
    pub blogs: Vec<ContentRecord>,
    pub projects: Vec<ContentRecord>,
    pub roadmaps: Vec<ContentRecord>,
    pub team: Vec<ContentRecord>,
}

/// Raw query values for the unified listing, before coercion.
#[derive(Debug, Clone, Default)]
pub struct ItemsRequest<'a> {
    pub scope: ItemScope,
    pub tag: Option<&'a str>,
    pub search: Option<&'a str>,
    pub page: PageParams,
    pub sort: SortMode,
}

#[derive(Clone)]
pub struct Catalog {
    tags: Arc<dyn TagsRepo>,
    content: Arc<dyn ContentRepo>,
    speakers: Arc<dyn SpeakersRepo>,
    index: TagIndex,
}

impl Catalog {
    pub fn new(
        tags: Arc<dyn TagsRepo>,
        content: Arc<dyn ContentRepo>,
        speakers: Arc<dyn SpeakersRepo>,
    ) -> Self {
        let index = TagIndex::new(tags.clone());
        Self {
            tags,
            content,
            speakers,
            index,
        }
    }

    pub async fn tags_list(
        &self,
        include_counts: bool,
        scope: ItemScope,
    ) -> Result<TagsPayload, RepoError> {
        let tags = self.tags.list_tags().await?;
        let counts = if include_counts {
            self.index.tag_counts(scope).await?
        } else {
            Default::default()
        };
        Ok(TagsPayload {
            tags: TagIndex::with_counts(tags, &counts),
        })
    }

    pub async fn tags_popular(&self, limit: usize) -> Result<TagsPayload, RepoError> {
        Ok(TagsPayload {
            tags: self.index.popular(limit).await?,
        })
    }

    /// Resolve a slug, falling back to recomputing slugs from tag names.
    ///
    /// The fallback scans every tag, which only matters for tags whose
    /// stored slug no longer matches their name.
    pub async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError> {
        if let Some(tag) = self.tags.find_tag_by_slug(slug).await? {
            return Ok(Some(tag));
        }

        let tags = self.tags.list_tags().await?;
        Ok(tags
            .into_iter()
            .find(|tag| derive_slug(&tag.name).as_deref() == Some(slug)))
    }

    /// Numeric references are ids; anything else is treated as a slug.
    pub async fn resolve_tag_ref(&self, reference: &str) -> Result<Option<TagRecord>, RepoError> {
        if !reference.is_empty() && reference.bytes().all(|b| b.is_ascii_digit()) {
            return match reference.parse::<i64>() {
                Ok(id) => self.tags.find_tag_by_id(id).await,
                Err(_) => Ok(None),
            };
        }
        self.find_tag_by_slug(reference).await
    }

    /// `None` when no tag resolves from `slug`.
    pub async fn tag_detail(
        &self,
        slug: &str,
        scope: ItemScope,
        page: PageParams,
        sort: SortMode,
    ) -> Result<Option<TagDetailPayload>, RepoError> {
        let Some(tag) = self.find_tag_by_slug(slug).await? else {
            return Ok(None);
        };

        let kind = scope.kind_or(ItemKind::Blogs);
        let counts = self.index.tag_counts(ItemScope::Only(kind)).await?;
        let count = counts.get(&tag.id).copied().unwrap_or(0);

        let query = ItemQuery {
            scope: ItemScope::Only(kind),
            tag_id: Some(tag.id),
            search: None,
            sort,
        };
        let listing = ItemQueryBuilder::new(self.content.as_ref())
            .page(&query, page)
            .await?;

        Ok(Some(TagDetailPayload {
            tag: TagWithCount { tag, count },
            items: listing.items,
            pagination: listing.page.summary(),
        }))
    }

    pub async fn items_list(&self, request: ItemsRequest<'_>) -> Result<ItemsPayload, RepoError> {
        let tag_id = match request.tag.filter(|reference| !reference.is_empty()) {
            Some(reference) => match self.resolve_tag_ref(reference).await? {
                Some(tag) => Some(tag.id),
                None => {
                    return Ok(ItemsPayload {
                        items: Vec::new(),
                        pagination: Pagination {
                            page: request.page.page,
                            per_page: request.page.per_page,
                            total: 0,
                        },
                    });
                }
            },
            None => None,
        };

        let query = ItemQuery {
            scope: request.scope,
            tag_id,
            search: request.search.map(str::trim).map(str::to_string),
            sort: request.sort,
        };
        let listing = ItemQueryBuilder::new(self.content.as_ref())
            .page(&query, request.page)
            .await?;

        Ok(ItemsPayload {
            items: listing.items,
            pagination: listing.page.summary(),
        })
    }

    pub async fn global_search(&self, raw_query: &str) -> Result<SearchPayload, RepoError> {
        let query = raw_query.trim();
        if query.chars().count() < MIN_SEARCH_LEN {
            return Ok(SearchPayload {
                query: query.to_string(),
                error: Some(SHORT_QUERY_MESSAGE.to_string()),
                ..SearchPayload::default()
            });
        }

        let window = Some(Window::first(SEARCH_LIMIT));
        let search = |kind: ItemKind| {
            let filter = ContentFilter::new(kind).with_search(Some(query), SearchDepth::Full);
            let content = self.content.clone();
            async move { content.list_content(&filter, window).await }
        };

        let (blogs, projects, team, events, roadmaps, tags) = futures::try_join!(
            search(ItemKind::Blogs),
            search(ItemKind::Projects),
            search(ItemKind::Team),
            search(ItemKind::Events),
            search(ItemKind::Roadmaps),
            self.tags.search_tags(query, SEARCH_LIMIT),
        )?;

        Ok(SearchPayload {
            query: query.to_string(),
            error: None,
            blogs,
            projects,
            team,
            events,
            roadmaps,
            tags,
        })
    }

    pub async fn bootstrap(&self) -> Result<BootstrapPayload, RepoError> {
        let recent = |kind: ItemKind| {
            let filter = ContentFilter::new(kind);
            let content = self.content.clone();
            async move {
                content
                    .list_content(&filter, Some(Window::first(BOOTSTRAP_RECENT_ITEMS)))
                    .await
            }
        };

        let (tags, popular_tags, events, blogs, projects, roadmaps, team) = futures::try_join!(
            self.tags_list(true, ItemScope::All),
            self.index.popular(BOOTSTRAP_POPULAR_TAGS),
            recent(ItemKind::Events),
            recent(ItemKind::Blogs),
            recent(ItemKind::Projects),
            recent(ItemKind::Roadmaps),
            recent(ItemKind::Team),
        )?;

        Ok(BootstrapPayload {
            tags: tags.tags,
            popular_tags,
            events,
            blogs,
            projects,
            roadmaps,
            team,
        })
    }

    /// A whole collection in its default order.
    pub async fn resource_list(&self, kind: ItemKind) -> Result<Vec<ContentRecord>, RepoError> {
        self.content
            .list_content(&ContentFilter::new(kind), None)
            .await
    }

    pub async fn resource_detail(
        &self,
        kind: ItemKind,
        id: i64,
    ) -> Result<Option<ContentRecord>, RepoError> {
        self.content.find_content(kind, id).await
    }

    pub async fn tag_records(&self) -> Result<Vec<TagRecord>, RepoError> {
        self.tags.list_tags().await
    }

    pub async fn tag_record(&self, id: i64) -> Result<Option<TagRecord>, RepoError> {
        self.tags.find_tag_by_id(id).await
    }

    pub async fn speakers(&self) -> Result<Vec<SpeakerRecord>, RepoError> {
        self.speakers.list_speakers().await
    }

    pub async fn speaker(&self, id: i64) -> Result<Option<SpeakerRecord>, RepoError> {
        self.speakers.find_speaker(id).await
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::application::repos::{ContentWriteRepo, CreateTagParams, TagsWriteRepo};
    use crate::domain::drafts::{BlogPostDraft, ContentDraft};
    use crate::infra::memory::MemoryRepositories;

    fn catalog(repos: &Arc<MemoryRepositories>) -> Catalog {
        Catalog::new(repos.clone(), repos.clone(), repos.clone())
    }

    async fn tag(repos: &MemoryRepositories, name: &str, slug: &str) -> TagRecord {
        repos
            .create_tag(CreateTagParams {
                name: name.to_string(),
                slug: slug.to_string(),
                color: "#7da6ff".to_string(),
            })
            .await
            .expect("tag")
    }

    fn blog(title: &str, tag_ids: Vec<i64>) -> ContentDraft {
        ContentDraft::Blog(BlogPostDraft {
            title: title.to_string(),
            summary: format!("{title} summary"),
            content: String::new(),
            image_url: String::new(),
            author_name: String::new(),
            published_date: Some(datetime!(2024-05-01 12:00 UTC)),
            tag_ids,
        })
    }

    #[tokio::test]
    async fn stale_slugs_resolve_through_the_name() {
        let repos = Arc::new(MemoryRepositories::default());
        let stored = tag(&repos, "Machine Learning", "ml-legacy").await;
        let catalog = catalog(&repos);

        let direct = catalog.find_tag_by_slug("ml-legacy").await.expect("lookup");
        let derived = catalog
            .find_tag_by_slug("machine-learning")
            .await
            .expect("lookup");

        assert_eq!(direct.map(|t| t.id), Some(stored.id));
        assert_eq!(derived.map(|t| t.id), Some(stored.id));
        assert!(catalog.find_tag_by_slug("nope").await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn numeric_references_are_ids() {
        let repos = Arc::new(MemoryRepositories::default());
        let stored = tag(&repos, "Drones", "drones").await;
        let catalog = catalog(&repos);

        let by_id = catalog
            .resolve_tag_ref(&stored.id.to_string())
            .await
            .expect("lookup");
        let by_slug = catalog.resolve_tag_ref("drones").await.expect("lookup");

        assert_eq!(by_id, Some(stored.clone()));
        assert_eq!(by_slug, Some(stored));
        assert!(catalog.resolve_tag_ref("999").await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn short_queries_never_reach_the_repositories() {
        let repos = Arc::new(MemoryRepositories::default());
        repos
            .create_content(blog("a", Vec::new()))
            .await
            .expect("blog");
        let catalog = catalog(&repos);

        let payload = catalog.global_search("  a ").await.expect("search");

        assert_eq!(payload.query, "a");
        assert_eq!(payload.error.as_deref(), Some(SHORT_QUERY_MESSAGE));
        assert!(payload.blogs.is_empty());
    }

    #[tokio::test]
    async fn tag_detail_defaults_to_blogs() {
        let repos = Arc::new(MemoryRepositories::default());
        let stored = tag(&repos, "Rust", "rust").await;
        repos
            .create_content(blog("Ownership", vec![stored.id]))
            .await
            .expect("blog");
        let catalog = catalog(&repos);

        let payload = catalog
            .tag_detail(
                "rust",
                ItemScope::All,
                PageParams::default(),
                SortMode::Recent,
            )
            .await
            .expect("detail")
            .expect("tag exists");

        assert_eq!(payload.tag.count, 1);
        assert_eq!(payload.items.len(), 1);
        assert_eq!(payload.items[0].kind, ItemKind::Blogs);
        assert!(
            catalog
                .tag_detail("missing", ItemScope::All, PageParams::default(), SortMode::Recent)
                .await
                .expect("detail")
                .is_none()
        );
    }

    #[tokio::test]
    async fn bootstrap_limits_recent_items() {
        let repos = Arc::new(MemoryRepositories::default());
        for n in 0..10 {
            repos
                .create_content(blog(&format!("Post {n}"), Vec::new()))
                .await
                .expect("blog");
        }
        let catalog = catalog(&repos);

        let payload = catalog.bootstrap().await.expect("bootstrap");

        assert_eq!(payload.blogs.len() as u64, BOOTSTRAP_RECENT_ITEMS);
        assert!(payload.events.is_empty());
        assert!(payload.popular_tags.is_empty());
    }
}
