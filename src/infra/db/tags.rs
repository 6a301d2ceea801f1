use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    application::repos::{CreateTagParams, RepoError, TagsRepo, TagsWriteRepo, UpdateTagParams},
    domain::{entities::TagRecord, types::ItemKind},
};

use super::util::contains_pattern;
use super::{Collection, PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
pub(super) struct TagRow {
    pub(super) id: i64,
    pub(super) name: String,
    pub(super) slug: String,
    pub(super) color: String,
}

impl From<TagRow> for TagRecord {
    fn from(row: TagRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            color: row.color,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TagCountRow {
    tag_id: i64,
    count: i64,
}

#[async_trait]
impl TagsRepo for PostgresRepositories {
    async fn list_tags(&self) -> Result<Vec<TagRecord>, RepoError> {
        let rows = sqlx::query_as::<_, TagRow>(
            "SELECT id, name, slug, color FROM tags ORDER BY name ASC, id ASC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TagRecord::from).collect())
    }

    async fn find_tag_by_id(&self, id: i64) -> Result<Option<TagRecord>, RepoError> {
        let row = sqlx::query_as::<_, TagRow>(
            "SELECT id, name, slug, color FROM tags WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TagRecord::from))
    }

    async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError> {
        let row = sqlx::query_as::<_, TagRow>(
            "SELECT id, name, slug, color FROM tags WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TagRecord::from))
    }

    async fn find_tag_by_name(&self, name: &str) -> Result<Option<TagRecord>, RepoError> {
        let row = sqlx::query_as::<_, TagRow>(
            "SELECT id, name, slug, color FROM tags WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TagRecord::from))
    }

    async fn search_tags(&self, needle: &str, limit: u64) -> Result<Vec<TagRecord>, RepoError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, TagRow>(
            r#"
            SELECT id, name, slug, color
            FROM tags
            WHERE name ILIKE $1
            ORDER BY name ASC, id ASC
            LIMIT $2
            "#,
        )
        .bind(contains_pattern(needle))
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TagRecord::from).collect())
    }

    async fn tag_counts(&self, kind: ItemKind) -> Result<HashMap<i64, u64>, RepoError> {
        let sql = format!(
            "SELECT tag_id, COUNT(*) AS count FROM {} GROUP BY tag_id",
            Collection::of(kind).tag_links
        );
        let rows = sqlx::query_as::<_, TagCountRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| Ok((row.tag_id, Self::convert_count(row.count)?)))
            .collect()
    }
}

#[async_trait]
impl TagsWriteRepo for PostgresRepositories {
    async fn create_tag(&self, params: CreateTagParams) -> Result<TagRecord, RepoError> {
        let row = sqlx::query_as::<_, TagRow>(
            r#"
            INSERT INTO tags (name, slug, color)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, color
            "#,
        )
        .bind(&params.name)
        .bind(&params.slug)
        .bind(&params.color)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_tag(&self, params: UpdateTagParams) -> Result<TagRecord, RepoError> {
        let row = sqlx::query_as::<_, TagRow>(
            r#"
            UPDATE tags
            SET name = $2, slug = $3, color = $4
            WHERE id = $1
            RETURNING id, name, slug, color
            "#,
        )
        .bind(params.id)
        .bind(&params.name)
        .bind(&params.slug)
        .bind(&params.color)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(TagRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_tag(&self, id: i64) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
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
