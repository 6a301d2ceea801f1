//! Postgres-backed repository implementations.

mod cache_store;
mod content;
mod speakers;
mod tags;
mod util;

pub use cache_store::PostgresCacheStore;
pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    Postgres, Transaction,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::{HealthCheck, RepoError};
use crate::domain::types::ItemKind;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}

#[async_trait]
impl HealthCheck for PostgresRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}

/// Table layout of one content collection.
#[derive(Debug, Clone, Copy)]
struct Collection {
    table: &'static str,
    tag_links: &'static str,
    /// Column listings are ordered by, newest (or lowest rank) first.
    order_column: &'static str,
}

impl Collection {
    fn of(kind: ItemKind) -> Self {
        match kind {
            ItemKind::Blogs => Self {
                table: "blog_posts",
                tag_links: "blog_post_tags",
                order_column: "published_date",
            },
            ItemKind::Projects => Self {
                table: "projects",
                tag_links: "project_tags",
                order_column: "published_date",
            },
            ItemKind::Events => Self {
                table: "events",
                tag_links: "event_tags",
                order_column: "event_date",
            },
            ItemKind::Roadmaps => Self {
                table: "roadmaps",
                tag_links: "roadmap_tags",
                order_column: "published_date",
            },
            ItemKind::Team => Self {
                table: "team_members",
                tag_links: "team_member_tags",
                order_column: "position_rank",
            },
        }
    }
}
