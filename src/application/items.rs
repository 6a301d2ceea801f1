//! Filtered listings over the content collections and their uniform projection.

use serde::Serialize;

use crate::application::pagination::{PageParams, ResolvedPage};
use crate::application::repos::{ContentFilter, ContentRepo, RepoError};
use crate::domain::entities::{ContentRecord, TagRecord};
use crate::domain::types::{ItemKind, ItemScope, SearchDepth, SortMode};

/// The shape every collection is flattened into for mixed listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedItem {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub title: String,
    pub summary: String,
    pub image_url: String,
    pub tags: Vec<TagRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

impl From<&ContentRecord> for UnifiedItem {
    fn from(record: &ContentRecord) -> Self {
        let base = |id: i64, title: &str, summary: &str, image_url: &str| UnifiedItem {
            id,
            kind: record.kind(),
            title: title.to_string(),
            summary: summary.to_string(),
            image_url: image_url.to_string(),
            tags: record.tags().to_vec(),
            role: None,
            icon_name: None,
            emoji: None,
        };

        match record {
            ContentRecord::Blog(r) => base(r.id, &r.title, &r.summary, &r.image_url),
            ContentRecord::Project(r) => base(r.id, &r.title, &r.description, &r.image_url),
            ContentRecord::Event(r) => base(r.id, &r.title, &r.summary, &r.image_url),
            ContentRecord::Roadmap(r) => UnifiedItem {
                icon_name: Some(r.icon_name.clone()),
                emoji: Some(r.icon_name.clone()),
                ..base(r.id, &r.title, &r.description, "")
            },
            ContentRecord::Team(r) => UnifiedItem {
                role: Some(r.role.clone()),
                ..base(r.id, &r.name, &r.bio, &r.photo_url)
            },
        }
    }
}

/// Parameters of a listing after query-string coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    pub scope: ItemScope,
    pub tag_id: Option<i64>,
    pub search: Option<String>,
    pub sort: SortMode,
}

impl ItemQuery {
    pub fn filter_for(&self, kind: ItemKind) -> ContentFilter {
        ContentFilter::new(kind)
            .with_tag(self.tag_id)
            .with_search(self.search.as_deref(), SearchDepth::Summary)
            .sorted(self.sort)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemPage {
    pub items: Vec<UnifiedItem>,
    pub page: ResolvedPage,
}

/// Sort key placing team members first by ascending rank, then dated items newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum RecencyKey {
    Dated(i128),
    Ranked(i64),
}

fn recency_key(record: &ContentRecord) -> RecencyKey {
    match record.position_rank() {
        Some(rank) => RecencyKey::Ranked(-i64::from(rank)),
        None => RecencyKey::Dated(
            record
                .timestamp()
                .map_or(0, |ts| ts.unix_timestamp_nanos()),
        ),
    }
}

/// Order a mixed-kind result the way the combined recent listing presents it.
pub fn sort_union_by_recency(records: &mut [ContentRecord]) {
    records.sort_by(|a, b| recency_key(b).cmp(&recency_key(a)));
}

#[derive(Clone)]
pub struct ItemQueryBuilder<'a> {
    content: &'a dyn ContentRepo,
}

impl<'a> ItemQueryBuilder<'a> {
    pub fn new(content: &'a dyn ContentRepo) -> Self {
        Self { content }
    }

    /// Every record matching `query`, in listing order.
    pub async fn collect(&self, query: &ItemQuery) -> Result<Vec<ContentRecord>, RepoError> {
        let mut records = Vec::new();
        for kind in query.scope.kinds() {
            let filter = query.filter_for(kind);
            records.extend(self.content.list_content(&filter, None).await?);
        }

        if query.scope == ItemScope::All && query.sort == SortMode::Recent {
            sort_union_by_recency(&mut records);
        }
        Ok(records)
    }

    /// One page of projected items.
    pub async fn page(
        &self,
        query: &ItemQuery,
        params: PageParams,
    ) -> Result<ItemPage, RepoError> {
        match query.scope {
            ItemScope::Only(kind) => {
                let filter = query.filter_for(kind);
                let total = self.content.count_content(&filter).await?;
                let page = params.resolve(total);
                let records = self
                    .content
                    .list_content(&filter, Some(page.window()))
                    .await?;
                Ok(ItemPage {
                    items: records.iter().map(UnifiedItem::from).collect(),
                    page,
                })
            }
            ItemScope::All => {
                let records = self.collect(query).await?;
                let page = params.resolve(records.len() as u64);
                let items = page
                    .slice(records)
                    .iter()
                    .map(UnifiedItem::from)
                    .collect();
                Ok(ItemPage { items, page })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::entities::{
        BlogPostRecord, EventRecord, RoadmapRecord, TeamMemberRecord,
    };
    use crate::domain::types::EventMode;

    fn blog(id: i64, published: Option<time::OffsetDateTime>) -> ContentRecord {
        ContentRecord::Blog(BlogPostRecord {
            id,
            title: format!("Post {id}"),
            summary: "summary".into(),
            content: String::new(),
            image_url: "https://img.example/post.png".into(),
            author_name: String::new(),
            published_date: published,
            tags: Vec::new(),
        })
    }

    fn event(id: i64, date: time::OffsetDateTime) -> ContentRecord {
        ContentRecord::Event(EventRecord {
            id,
            title: format!("Event {id}"),
            summary: "meetup".into(),
            content: String::new(),
            image_url: String::new(),
            author_name: String::new(),
            event_date: date,
            speakers: Vec::new(),
            requires_registration: true,
            registration_link: None,
            mode: EventMode::Physical,
            location_address: String::new(),
            meeting_link: String::new(),
            tech_tags: Vec::new(),
            gallery_images: Vec::new(),
            resources: Vec::new(),
            tags: Vec::new(),
        })
    }

    fn member(id: i64, rank: i32) -> ContentRecord {
        ContentRecord::Team(TeamMemberRecord {
            id,
            name: format!("Member {id}"),
            role: "Lead".into(),
            photo_url: "https://img.example/me.png".into(),
            bio: "bio".into(),
            skills: String::new(),
            position_rank: rank,
            github_url: String::new(),
            linkedin_url: String::new(),
            instagram_url: String::new(),
            twitter_url: String::new(),
            website_url: String::new(),
            tags: Vec::new(),
        })
    }

    #[test]
    fn roadmap_projection_has_icon_and_empty_image() {
        let record = ContentRecord::Roadmap(RoadmapRecord {
            id: 3,
            icon_name: "🚀".into(),
            title: "Launch".into(),
            description: "Plan".into(),
            content: String::new(),
            author_name: String::new(),
            published_date: None,
            tags: Vec::new(),
        });
        let value = serde_json::to_value(UnifiedItem::from(&record)).expect("serialize");
        assert_eq!(value["type"], "roadmaps");
        assert_eq!(value["image_url"], "");
        assert_eq!(value["icon_name"], "🚀");
        assert_eq!(value["emoji"], "🚀");
        assert!(value.get("role").is_none());
    }

    #[test]
    fn team_projection_uses_name_bio_and_photo() {
        let item = UnifiedItem::from(&member(4, 2));
        assert_eq!(item.title, "Member 4");
        assert_eq!(item.summary, "bio");
        assert_eq!(item.image_url, "https://img.example/me.png");
        assert_eq!(item.role.as_deref(), Some("Lead"));
    }

    #[test]
    fn union_puts_ranked_members_first_then_newest() {
        let mut records = vec![
            blog(1, Some(datetime!(2024-01-01 0:00 UTC))),
            blog(2, None),
            event(3, datetime!(2024-06-01 0:00 UTC)),
            member(4, 5),
            member(5, 1),
        ];
        sort_union_by_recency(&mut records);
        let order: Vec<(ItemKind, i64)> = records.iter().map(|r| (r.kind(), r.id())).collect();
        assert_eq!(
            order,
            vec![
                (ItemKind::Team, 5),
                (ItemKind::Team, 4),
                (ItemKind::Events, 3),
                (ItemKind::Blogs, 1),
                (ItemKind::Blogs, 2),
            ]
        );
    }
}
