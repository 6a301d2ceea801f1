use async_trait::async_trait;

use crate::{
    application::repos::{RepoError, SpeakersRepo, SpeakersWriteRepo},
    domain::{drafts::SpeakerDraft, entities::SpeakerRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
pub(super) struct SpeakerRow {
    pub(super) id: i64,
    pub(super) name: String,
    pub(super) profile_image: String,
    pub(super) bio: String,
    pub(super) social_link: Option<String>,
}

impl From<SpeakerRow> for SpeakerRecord {
    fn from(row: SpeakerRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            profile_image: row.profile_image,
            bio: row.bio,
            social_link: row.social_link,
        }
    }
}

#[async_trait]
impl SpeakersRepo for PostgresRepositories {
    async fn list_speakers(&self) -> Result<Vec<SpeakerRecord>, RepoError> {
        let rows = sqlx::query_as::<_, SpeakerRow>(
            "SELECT id, name, profile_image, bio, social_link FROM speakers ORDER BY name ASC, id ASC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(SpeakerRecord::from).collect())
    }

    async fn find_speaker(&self, id: i64) -> Result<Option<SpeakerRecord>, RepoError> {
        let row = sqlx::query_as::<_, SpeakerRow>(
            "SELECT id, name, profile_image, bio, social_link FROM speakers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(SpeakerRecord::from))
    }
}

#[async_trait]
impl SpeakersWriteRepo for PostgresRepositories {
    async fn create_speaker(&self, draft: SpeakerDraft) -> Result<SpeakerRecord, RepoError> {
        let row = sqlx::query_as::<_, SpeakerRow>(
            r#"
            INSERT INTO speakers (name, profile_image, bio, social_link)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, profile_image, bio, social_link
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.profile_image)
        .bind(&draft.bio)
        .bind(&draft.social_link)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_speaker(
        &self,
        id: i64,
        draft: SpeakerDraft,
    ) -> Result<SpeakerRecord, RepoError> {
        let row = sqlx::query_as::<_, SpeakerRow>(
            r#"
            UPDATE speakers
            SET name = $2, profile_image = $3, bio = $4, social_link = $5
            WHERE id = $1
            RETURNING id, name, profile_image, bio, social_link
            "#,
        )
        .bind(id)
        .bind(&draft.name)
        .bind(&draft.profile_image)
        .bind(&draft.bio)
        .bind(&draft.social_link)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(SpeakerRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_speaker(&self, id: i64) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM speakers WHERE id = $1")
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
