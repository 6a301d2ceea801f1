mod admin;
mod error;
mod middleware;
mod public;

pub use error::{ApiError, codes};
pub use middleware::RequestContext;
pub use public::BuildError;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{MethodRouter, get},
};

use crate::application::{
    admin::{AdminContentService, AdminSpeakerService, AdminTagService},
    auth::AdminAuthenticator,
    catalog::Catalog,
    repos::{
        ContentRepo, ContentWriteRepo, HealthCheck, SpeakersRepo, SpeakersWriteRepo, TagsRepo,
        TagsWriteRepo,
    },
};
use crate::cache::{CacheTrigger, ResponseCache};
use crate::domain::drafts::{
    BlogPostDraft, EventDraft, KindedDraft, ProjectDraft, RoadmapDraft, TeamMemberDraft,
};

use middleware::{log_responses, require_admin, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub catalog: Catalog,
    pub cache: ResponseCache,
    pub tags: Arc<AdminTagService>,
    pub content: Arc<AdminContentService>,
    pub speakers: Arc<AdminSpeakerService>,
    pub auth: Arc<AdminAuthenticator>,
    pub health: Arc<dyn HealthCheck>,
}

impl HttpState {
    /// Wire the read catalog and the admin services over one repository backend.
    pub fn new<R>(repos: Arc<R>, cache: ResponseCache, auth: AdminAuthenticator) -> Self
    where
        R: TagsRepo
            + TagsWriteRepo
            + ContentRepo
            + ContentWriteRepo
            + SpeakersRepo
            + SpeakersWriteRepo
            + HealthCheck
            + 'static,
    {
        let tags_repo: Arc<dyn TagsRepo> = repos.clone();
        let content_repo: Arc<dyn ContentRepo> = repos.clone();
        let speakers_repo: Arc<dyn SpeakersRepo> = repos.clone();
        let trigger = Some(Arc::new(CacheTrigger::new(cache.clone())));

        let catalog = Catalog::new(
            tags_repo.clone(),
            content_repo.clone(),
            speakers_repo.clone(),
        );
        let tags = AdminTagService::new(tags_repo.clone(), repos.clone())
            .with_cache_trigger_opt(trigger.clone());
        let content =
            AdminContentService::new(content_repo, repos.clone(), tags_repo, speakers_repo.clone())
                .with_cache_trigger_opt(trigger.clone());
        let speakers = AdminSpeakerService::new(speakers_repo, repos.clone())
            .with_cache_trigger_opt(trigger);

        Self {
            catalog,
            cache,
            tags: Arc::new(tags),
            content: Arc::new(content),
            speakers: Arc::new(speakers),
            auth: Arc::new(auth),
            health: repos,
        }
    }
}

fn content_collection<D: KindedDraft>() -> MethodRouter<HttpState> {
    get(public::content_list::<D>).post(admin::create_content::<D>)
}

fn content_member<D: KindedDraft>() -> MethodRouter<HttpState> {
    get(public::content_detail::<D>)
        .put(admin::replace_content::<D>)
        .patch(admin::patch_content::<D>)
        .delete(admin::delete_content::<D>)
}

pub fn build_router(state: HttpState) -> Router {
    let api = Router::new()
        .route("/tags/", get(public::tags_list))
        .route("/tags/popular/", get(public::tags_popular))
        .route("/tags/{slug}/", get(public::tag_detail))
        .route("/items/", get(public::items_list))
        .route("/search/", get(public::search))
        .route("/bootstrap/", get(public::bootstrap))
        .route("/projects/", content_collection::<ProjectDraft>())
        .route("/projects/{id}/", content_member::<ProjectDraft>())
        .route("/blog/", content_collection::<BlogPostDraft>())
        .route("/blog/{id}/", content_member::<BlogPostDraft>())
        .route("/events/", content_collection::<EventDraft>())
        .route("/events/{id}/", content_member::<EventDraft>())
        .route("/roadmaps/", content_collection::<RoadmapDraft>())
        .route("/roadmaps/{id}/", content_member::<RoadmapDraft>())
        .route("/team/", content_collection::<TeamMemberDraft>())
        .route("/team/{id}/", content_member::<TeamMemberDraft>())
        .route(
            "/tags-admin/",
            get(public::tag_records).post(admin::create_tag),
        )
        .route(
            "/tags-admin/{id}/",
            get(public::tag_record)
                .put(admin::replace_tag)
                .patch(admin::patch_tag)
                .delete(admin::delete_tag),
        )
        .route(
            "/speakers/",
            get(public::speakers).post(admin::create_speaker),
        )
        .route(
            "/speakers/{id}/",
            get(public::speaker)
                .put(admin::replace_speaker)
                .patch(admin::patch_speaker)
                .delete(admin::delete_speaker),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ));

    Router::new()
        .nest("/api", api)
        .route("/health", get(public::health))
        .route("/ping", get(public::ping))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
        .with_state(state)
}
