use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder, Transaction, types::Json};
use time::OffsetDateTime;

use crate::{
    application::repos::{ContentFilter, ContentRepo, ContentWriteRepo, RepoError, Window},
    domain::{
        drafts::ContentDraft,
        entities::{
            BlogPostRecord, ContentRecord, EventGalleryImage, EventRecord, EventResource,
            EventTechTag, ProjectRecord, RoadmapRecord, SpeakerRecord, TagRecord,
            TeamMemberRecord,
        },
        types::{EventMode, ItemKind, SortMode},
    },
};

use super::util::contains_pattern;
use super::{Collection, PostgresRepositories, map_sqlx_error};

const BLOG_COLUMNS: &str =
    "c.id, c.title, c.summary, c.content, c.image_url, c.author_name, c.published_date";
const PROJECT_COLUMNS: &str =
    "c.id, c.title, c.description, c.content, c.image_url, c.author_name, c.published_date";
const ROADMAP_COLUMNS: &str =
    "c.id, c.icon_name, c.title, c.description, c.content, c.author_name, c.published_date";
const TEAM_COLUMNS: &str = "c.id, c.name, c.role, c.photo_url, c.bio, c.skills, \
    c.position_rank, c.github_url, c.linkedin_url, c.instagram_url, c.twitter_url, c.website_url";
const EVENT_COLUMNS: &str = "c.id, c.title, c.summary, c.content, c.image_url, c.author_name, \
    c.event_date, c.requires_registration, c.registration_link, c.mode, c.location_address, \
    c.meeting_link, c.tech_tags, c.gallery_images, c.resources";

#[derive(sqlx::FromRow)]
struct BlogPostRow {
    id: i64,
    title: String,
    summary: String,
    content: String,
    image_url: String,
    author_name: String,
    published_date: Option<OffsetDateTime>,
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: i64,
    title: String,
    description: String,
    content: String,
    image_url: String,
    author_name: String,
    published_date: Option<OffsetDateTime>,
}

#[derive(sqlx::FromRow)]
struct RoadmapRow {
    id: i64,
    icon_name: String,
    title: String,
    description: String,
    content: String,
    author_name: String,
    published_date: Option<OffsetDateTime>,
}

#[derive(sqlx::FromRow)]
struct TeamMemberRow {
    id: i64,
    name: String,
    role: String,
    photo_url: String,
    bio: String,
    skills: String,
    position_rank: i32,
    github_url: String,
    linkedin_url: String,
    instagram_url: String,
    twitter_url: String,
    website_url: String,
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: i64,
    title: String,
    summary: String,
    content: String,
    image_url: String,
    author_name: String,
    event_date: OffsetDateTime,
    requires_registration: bool,
    registration_link: Option<String>,
    mode: String,
    location_address: String,
    meeting_link: String,
    tech_tags: Json<Vec<EventTechTag>>,
    gallery_images: Json<Vec<EventGalleryImage>>,
    resources: Json<Vec<EventResource>>,
}

#[derive(sqlx::FromRow)]
struct LinkedTagRow {
    item_id: i64,
    id: i64,
    name: String,
    slug: String,
    color: String,
}

#[derive(sqlx::FromRow)]
struct LinkedSpeakerRow {
    event_id: i64,
    id: i64,
    name: String,
    profile_image: String,
    bio: String,
    social_link: Option<String>,
}

impl From<BlogPostRow> for ContentRecord {
    fn from(row: BlogPostRow) -> Self {
        ContentRecord::Blog(BlogPostRecord {
            id: row.id,
            title: row.title,
            summary: row.summary,
            content: row.content,
            image_url: row.image_url,
            author_name: row.author_name,
            published_date: row.published_date,
            tags: Vec::new(),
        })
    }
}

impl From<ProjectRow> for ContentRecord {
    fn from(row: ProjectRow) -> Self {
        ContentRecord::Project(ProjectRecord {
            id: row.id,
            title: row.title,
            description: row.description,
            content: row.content,
            image_url: row.image_url,
            author_name: row.author_name,
            published_date: row.published_date,
            tags: Vec::new(),
        })
    }
}

impl From<RoadmapRow> for ContentRecord {
    fn from(row: RoadmapRow) -> Self {
        ContentRecord::Roadmap(RoadmapRecord {
            id: row.id,
            icon_name: row.icon_name,
            title: row.title,
            description: row.description,
            content: row.content,
            author_name: row.author_name,
            published_date: row.published_date,
            tags: Vec::new(),
        })
    }
}

impl From<TeamMemberRow> for ContentRecord {
    fn from(row: TeamMemberRow) -> Self {
        ContentRecord::Team(TeamMemberRecord {
            id: row.id,
            name: row.name,
            role: row.role,
            photo_url: row.photo_url,
            bio: row.bio,
            skills: row.skills,
            position_rank: row.position_rank,
            github_url: row.github_url,
            linkedin_url: row.linkedin_url,
            instagram_url: row.instagram_url,
            twitter_url: row.twitter_url,
            website_url: row.website_url,
            tags: Vec::new(),
        })
    }
}

impl TryFrom<EventRow> for ContentRecord {
    type Error = RepoError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let mode = EventMode::parse(&row.mode).ok_or_else(|| RepoError::Integrity {
            message: format!("unknown event mode `{}`", row.mode),
        })?;

        Ok(ContentRecord::Event(EventRecord {
            id: row.id,
            title: row.title,
            summary: row.summary,
            content: row.content,
            image_url: row.image_url,
            author_name: row.author_name,
            event_date: row.event_date,
            speakers: Vec::new(),
            requires_registration: row.requires_registration,
            registration_link: row.registration_link,
            mode,
            location_address: row.location_address,
            meeting_link: row.meeting_link,
            tech_tags: row.tech_tags.0,
            gallery_images: row.gallery_images.0,
            resources: row.resources.0,
            tags: Vec::new(),
        }))
    }
}

fn columns(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Blogs => BLOG_COLUMNS,
        ItemKind::Projects => PROJECT_COLUMNS,
        ItemKind::Events => EVENT_COLUMNS,
        ItemKind::Roadmaps => ROADMAP_COLUMNS,
        ItemKind::Team => TEAM_COLUMNS,
    }
}

impl PostgresRepositories {
    fn apply_content_filter(
        qb: &mut QueryBuilder<'_, Postgres>,
        collection: Collection,
        filter: &ContentFilter,
    ) {
        if let Some(tag_id) = filter.tag_id {
            qb.push(" AND EXISTS (SELECT 1 FROM ");
            qb.push(collection.tag_links);
            qb.push(" l WHERE l.item_id = c.id AND l.tag_id = ");
            qb.push_bind(tag_id);
            qb.push(")");
        }

        if let Some(search) = filter.search.as_deref() {
            let pattern = contains_pattern(search);
            qb.push(" AND (");
            for (index, column) in filter
                .kind
                .search_columns(filter.depth)
                .iter()
                .enumerate()
            {
                if index > 0 {
                    qb.push(" OR ");
                }
                qb.push("c.");
                qb.push(*column);
                qb.push(" ILIKE ");
                qb.push_bind(pattern.clone());
            }
            qb.push(")");
        }
    }

    fn push_content_order(
        qb: &mut QueryBuilder<'_, Postgres>,
        collection: Collection,
        kind: ItemKind,
        sort: SortMode,
    ) {
        match sort {
            SortMode::Popular => {
                qb.push(" ORDER BY (SELECT COUNT(*) FROM ");
                qb.push(collection.tag_links);
                qb.push(" l WHERE l.item_id = c.id) DESC, c.");
                qb.push(collection.order_column);
                qb.push(" DESC NULLS LAST, c.id DESC");
            }
            SortMode::Recent if kind.ranks_ascending() => {
                qb.push(" ORDER BY c.");
                qb.push(collection.order_column);
                qb.push(" ASC, c.id ASC");
            }
            SortMode::Recent => {
                qb.push(" ORDER BY c.");
                qb.push(collection.order_column);
                qb.push(" DESC NULLS LAST, c.id DESC");
            }
        }
    }

    async fn fetch_records(
        &self,
        kind: ItemKind,
        mut qb: QueryBuilder<'_, Postgres>,
    ) -> Result<Vec<ContentRecord>, RepoError> {
        let pool = self.pool();
        let mut records: Vec<ContentRecord> = match kind {
            ItemKind::Blogs => qb
                .build_query_as::<BlogPostRow>()
                .fetch_all(pool)
                .await
                .map_err(map_sqlx_error)?
                .into_iter()
                .map(ContentRecord::from)
                .collect(),
            ItemKind::Projects => qb
                .build_query_as::<ProjectRow>()
                .fetch_all(pool)
                .await
                .map_err(map_sqlx_error)?
                .into_iter()
                .map(ContentRecord::from)
                .collect(),
            ItemKind::Roadmaps => qb
                .build_query_as::<RoadmapRow>()
                .fetch_all(pool)
                .await
                .map_err(map_sqlx_error)?
                .into_iter()
                .map(ContentRecord::from)
                .collect(),
            ItemKind::Team => qb
                .build_query_as::<TeamMemberRow>()
                .fetch_all(pool)
                .await
                .map_err(map_sqlx_error)?
                .into_iter()
                .map(ContentRecord::from)
                .collect(),
            ItemKind::Events => qb
                .build_query_as::<EventRow>()
                .fetch_all(pool)
                .await
                .map_err(map_sqlx_error)?
                .into_iter()
                .map(ContentRecord::try_from)
                .collect::<Result<Vec<_>, _>>()?,
        };

        self.attach_links(kind, &mut records).await?;
        Ok(records)
    }

    /// Fill tags (by name) and, for events, speakers (by link position).
    async fn attach_links(
        &self,
        kind: ItemKind,
        records: &mut [ContentRecord],
    ) -> Result<(), RepoError> {
        if records.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = records.iter().map(ContentRecord::id).collect();

        let sql = format!(
            "SELECT l.item_id, t.id, t.name, t.slug, t.color \
             FROM {} l INNER JOIN tags t ON t.id = l.tag_id \
             WHERE l.item_id = ANY($1) \
             ORDER BY t.name ASC, t.id ASC",
            Collection::of(kind).tag_links
        );
        let tag_rows = sqlx::query_as::<_, LinkedTagRow>(&sql)
            .bind(&ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut tags: HashMap<i64, Vec<TagRecord>> = HashMap::new();
        for row in tag_rows {
            tags.entry(row.item_id).or_default().push(TagRecord {
                id: row.id,
                name: row.name,
                slug: row.slug,
                color: row.color,
            });
        }

        let mut speakers: HashMap<i64, Vec<SpeakerRecord>> = HashMap::new();
        if kind == ItemKind::Events {
            let speaker_rows = sqlx::query_as::<_, LinkedSpeakerRow>(
                r#"
                SELECT es.event_id, s.id, s.name, s.profile_image, s.bio, s.social_link
                FROM event_speakers es
                INNER JOIN speakers s ON s.id = es.speaker_id
                WHERE es.event_id = ANY($1)
                ORDER BY es.position ASC, s.id ASC
                "#,
            )
            .bind(&ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

            for row in speaker_rows {
                speakers.entry(row.event_id).or_default().push(SpeakerRecord {
                    id: row.id,
                    name: row.name,
                    profile_image: row.profile_image,
                    bio: row.bio,
                    social_link: row.social_link,
                });
            }
        }

        for record in records.iter_mut() {
            let id = record.id();
            *record.tags_mut() = tags.remove(&id).unwrap_or_default();
            if let ContentRecord::Event(event) = record {
                event.speakers = speakers.remove(&id).unwrap_or_default();
            }
        }
        Ok(())
    }

    async fn insert_row(
        tx: &mut Transaction<'_, Postgres>,
        draft: &ContentDraft,
    ) -> Result<i64, RepoError> {
        let query = match draft {
            ContentDraft::Blog(d) => sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO blog_posts (title, summary, content, image_url, author_name, published_date)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id
                "#,
            )
            .bind(&d.title)
            .bind(&d.summary)
            .bind(&d.content)
            .bind(&d.image_url)
            .bind(&d.author_name)
            .bind(d.published_date),
            ContentDraft::Project(d) => sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO projects (title, description, content, image_url, author_name, published_date)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id
                "#,
            )
            .bind(&d.title)
            .bind(&d.description)
            .bind(&d.content)
            .bind(&d.image_url)
            .bind(&d.author_name)
            .bind(d.published_date),
            ContentDraft::Roadmap(d) => sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO roadmaps (icon_name, title, description, content, author_name, published_date)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id
                "#,
            )
            .bind(&d.icon_name)
            .bind(&d.title)
            .bind(&d.description)
            .bind(&d.content)
            .bind(&d.author_name)
            .bind(d.published_date),
            ContentDraft::Team(d) => sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO team_members (
                    name, role, photo_url, bio, skills, position_rank,
                    github_url, linkedin_url, instagram_url, twitter_url, website_url
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING id
                "#,
            )
            .bind(&d.name)
            .bind(&d.role)
            .bind(&d.photo_url)
            .bind(&d.bio)
            .bind(&d.skills)
            .bind(d.position_rank)
            .bind(&d.github_url)
            .bind(&d.linkedin_url)
            .bind(&d.instagram_url)
            .bind(&d.twitter_url)
            .bind(&d.website_url),
            ContentDraft::Event(d) => sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO events (
                    title, summary, content, image_url, author_name, event_date,
                    requires_registration, registration_link, mode, location_address,
                    meeting_link, tech_tags, gallery_images, resources
                )
                VALUES ($1, $2, $3, $4, $5, COALESCE($6, now()), $7, $8, $9, $10, $11, $12, $13, $14)
                RETURNING id
                "#,
            )
            .bind(&d.title)
            .bind(&d.summary)
            .bind(&d.content)
            .bind(&d.image_url)
            .bind(&d.author_name)
            .bind(d.event_date)
            .bind(d.requires_registration)
            .bind(&d.registration_link)
            .bind(d.mode.as_str())
            .bind(&d.location_address)
            .bind(&d.meeting_link)
            .bind(Json(&d.tech_tags))
            .bind(Json(&d.gallery_images))
            .bind(Json(&d.resources)),
        };

        query.fetch_one(&mut **tx).await.map_err(map_sqlx_error)
    }

    async fn update_row(
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        draft: &ContentDraft,
    ) -> Result<bool, RepoError> {
        let query = match draft {
            ContentDraft::Blog(d) => sqlx::query(
                r#"
                UPDATE blog_posts
                SET title = $2, summary = $3, content = $4, image_url = $5,
                    author_name = $6, published_date = $7
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(&d.title)
            .bind(&d.summary)
            .bind(&d.content)
            .bind(&d.image_url)
            .bind(&d.author_name)
            .bind(d.published_date),
            ContentDraft::Project(d) => sqlx::query(
                r#"
                UPDATE projects
                SET title = $2, description = $3, content = $4, image_url = $5,
                    author_name = $6, published_date = $7
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(&d.title)
            .bind(&d.description)
            .bind(&d.content)
            .bind(&d.image_url)
            .bind(&d.author_name)
            .bind(d.published_date),
            ContentDraft::Roadmap(d) => sqlx::query(
                r#"
                UPDATE roadmaps
                SET icon_name = $2, title = $3, description = $4, content = $5,
                    author_name = $6, published_date = $7
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(&d.icon_name)
            .bind(&d.title)
            .bind(&d.description)
            .bind(&d.content)
            .bind(&d.author_name)
            .bind(d.published_date),
            ContentDraft::Team(d) => sqlx::query(
                r#"
                UPDATE team_members
                SET name = $2, role = $3, photo_url = $4, bio = $5, skills = $6,
                    position_rank = $7, github_url = $8, linkedin_url = $9,
                    instagram_url = $10, twitter_url = $11, website_url = $12
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(&d.name)
            .bind(&d.role)
            .bind(&d.photo_url)
            .bind(&d.bio)
            .bind(&d.skills)
            .bind(d.position_rank)
            .bind(&d.github_url)
            .bind(&d.linkedin_url)
            .bind(&d.instagram_url)
            .bind(&d.twitter_url)
            .bind(&d.website_url),
            ContentDraft::Event(d) => sqlx::query(
                r#"
                UPDATE events
                SET title = $2, summary = $3, content = $4, image_url = $5,
                    author_name = $6, event_date = COALESCE($7, event_date),
                    requires_registration = $8, registration_link = $9, mode = $10,
                    location_address = $11, meeting_link = $12, tech_tags = $13,
                    gallery_images = $14, resources = $15
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(&d.title)
            .bind(&d.summary)
            .bind(&d.content)
            .bind(&d.image_url)
            .bind(&d.author_name)
            .bind(d.event_date)
            .bind(d.requires_registration)
            .bind(&d.registration_link)
            .bind(d.mode.as_str())
            .bind(&d.location_address)
            .bind(&d.meeting_link)
            .bind(Json(&d.tech_tags))
            .bind(Json(&d.gallery_images))
            .bind(Json(&d.resources)),
        };

        let result = query.execute(&mut **tx).await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    /// Rewrite the tag links (and event speaker links) of one record.
    async fn replace_links(
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        draft: &ContentDraft,
    ) -> Result<(), RepoError> {
        let collection = Collection::of(draft.kind());

        sqlx::query(&format!(
            "DELETE FROM {} WHERE item_id = $1",
            collection.tag_links
        ))
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        let mut tag_ids = draft.tag_ids().to_vec();
        tag_ids.sort_unstable();
        tag_ids.dedup();
        if !tag_ids.is_empty() {
            let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO ");
            qb.push(collection.tag_links);
            qb.push(" (item_id, tag_id) ");
            qb.push_values(tag_ids, |mut row, tag_id| {
                row.push_bind(id).push_bind(tag_id);
            });
            qb.build()
                .execute(&mut **tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        if let ContentDraft::Event(event) = draft {
            sqlx::query("DELETE FROM event_speakers WHERE event_id = $1")
                .bind(id)
                .execute(&mut **tx)
                .await
                .map_err(map_sqlx_error)?;

            let mut seen = Vec::with_capacity(event.speaker_ids.len());
            for speaker_id in &event.speaker_ids {
                if !seen.contains(speaker_id) {
                    seen.push(*speaker_id);
                }
            }
            if !seen.is_empty() {
                let mut qb = QueryBuilder::<Postgres>::new(
                    "INSERT INTO event_speakers (event_id, speaker_id, position) ",
                );
                qb.push_values(seen.into_iter().enumerate(), |mut row, (position, speaker_id)| {
                    row.push_bind(id)
                        .push_bind(speaker_id)
                        .push_bind(i32::try_from(position).unwrap_or(i32::MAX));
                });
                qb.build()
                    .execute(&mut **tx)
                    .await
                    .map_err(map_sqlx_error)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ContentRepo for PostgresRepositories {
    async fn count_content(&self, filter: &ContentFilter) -> Result<u64, RepoError> {
        let collection = Collection::of(filter.kind);
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM ");
        qb.push(collection.table);
        qb.push(" c WHERE 1=1 ");
        Self::apply_content_filter(&mut qb, collection, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_content(
        &self,
        filter: &ContentFilter,
        window: Option<Window>,
    ) -> Result<Vec<ContentRecord>, RepoError> {
        let collection = Collection::of(filter.kind);
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(columns(filter.kind));
        qb.push(" FROM ");
        qb.push(collection.table);
        qb.push(" c WHERE 1=1 ");
        Self::apply_content_filter(&mut qb, collection, filter);
        Self::push_content_order(&mut qb, collection, filter.kind, filter.sort);

        if let Some(window) = window {
            qb.push(" LIMIT ");
            qb.push_bind(i64::try_from(window.limit).unwrap_or(i64::MAX));
            qb.push(" OFFSET ");
            qb.push_bind(i64::try_from(window.offset).unwrap_or(i64::MAX));
        }

        self.fetch_records(filter.kind, qb).await
    }

    async fn find_content(
        &self,
        kind: ItemKind,
        id: i64,
    ) -> Result<Option<ContentRecord>, RepoError> {
        let collection = Collection::of(kind);
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(columns(kind));
        qb.push(" FROM ");
        qb.push(collection.table);
        qb.push(" c WHERE c.id = ");
        qb.push_bind(id);

        Ok(self.fetch_records(kind, qb).await?.into_iter().next())
    }
}

#[async_trait]
impl ContentWriteRepo for PostgresRepositories {
    async fn create_content(&self, draft: ContentDraft) -> Result<ContentRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let id = Self::insert_row(&mut tx, &draft).await?;
        Self::replace_links(&mut tx, id, &draft).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        self.find_content(draft.kind(), id)
            .await?
            .ok_or(RepoError::NotFound)
    }

    async fn update_content(
        &self,
        id: i64,
        draft: ContentDraft,
    ) -> Result<ContentRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        if !Self::update_row(&mut tx, id, &draft).await? {
            return Err(RepoError::NotFound);
        }
        Self::replace_links(&mut tx, id, &draft).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        self.find_content(draft.kind(), id)
            .await?
            .ok_or(RepoError::NotFound)
    }

    async fn delete_content(&self, kind: ItemKind, id: i64) -> Result<(), RepoError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", Collection::of(kind).table);
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
