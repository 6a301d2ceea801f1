//! Read endpoints. Every JSON read is served through the response cache,
//! keyed by its full path and query string.

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;

use axum::{
    Json,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, Uri, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::{
    application::{
        catalog::{Catalog, DEFAULT_POPULAR_TAGS, ItemsRequest, MAX_POPULAR_TAGS},
        error::ErrorReport,
        pagination::{PageParams, parse_clamped, parse_flag},
        repos::RepoError,
    },
    cache::CachedPayload,
    domain::{
        drafts::KindedDraft,
        types::{ItemScope, SortMode},
    },
};

use super::HttpState;
use super::error::ApiError;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Query string as key/value pairs where a repeated key keeps its last value.
///
/// Never rejects: an undecodable query string reads as empty, and each
/// handler coerces what it finds to its defaults.
#[derive(Debug, Default, Clone)]
pub struct QueryArgs(HashMap<String, String>);

impl QueryArgs {
    pub fn from_uri(uri: &Uri) -> Self {
        let pairs = Query::<Vec<(String, String)>>::try_from_uri(uri)
            .map(|Query(pairs)| pairs)
            .unwrap_or_default();
        Self(pairs.into_iter().collect())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn page(&self) -> PageParams {
        PageParams::from_query(self.get("page"), self.get("per_page"))
    }

    fn scope(&self) -> ItemScope {
        ItemScope::from_query(self.get("type"))
    }

    fn sort(&self) -> SortMode {
        SortMode::from_query(self.get("sort"))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for QueryArgs {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_uri(&parts.uri))
    }
}

fn encode<T: Serialize>(value: &T) -> Result<CachedPayload, BuildError> {
    Ok(CachedPayload::ok(serde_json::to_value(value)?))
}

fn not_found_payload() -> CachedPayload {
    CachedPayload::with_status(
        StatusCode::NOT_FOUND.as_u16(),
        json!({ "detail": "Not found." }),
    )
}

/// Serve `build`'s payload for this request through the response cache.
async fn cached<F, Fut>(
    state: &HttpState,
    namespace: &'static str,
    uri: &Uri,
    build: F,
) -> Result<Response, ApiError>
where
    F: FnOnce(Catalog) -> Fut + Send + 'static,
    Fut: Future<Output = Result<CachedPayload, BuildError>> + Send + 'static,
{
    let catalog = state.catalog.clone();
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    let payload = state
        .cache
        .get_or_build(namespace, path, move || build(catalog))
        .await?;

    let status = StatusCode::from_u16(payload.status).unwrap_or(StatusCode::OK);
    let mut response = (status, Json(payload.body)).into_response();
    if status == StatusCode::NOT_FOUND {
        ErrorReport::from_message("infra::http::public", status, format!("{path} not found"))
            .attach(&mut response);
    }
    Ok(response)
}

pub async fn tags_list(
    State(state): State<HttpState>,
    uri: Uri,
    query: QueryArgs,
) -> Result<Response, ApiError> {
    let include_counts = parse_flag(query.get("include_counts"));
    let scope = query.scope();

    cached(&state, "tags", &uri, move |catalog| async move {
        encode(&catalog.tags_list(include_counts, scope).await?)
    })
    .await
}

pub async fn tags_popular(
    State(state): State<HttpState>,
    uri: Uri,
    query: QueryArgs,
) -> Result<Response, ApiError> {
    let limit = parse_clamped(
        query.get("limit"),
        DEFAULT_POPULAR_TAGS,
        1,
        Some(MAX_POPULAR_TAGS),
    );
    let limit = usize::try_from(limit).unwrap_or(1);

    cached(&state, "tags_popular", &uri, move |catalog| async move {
        encode(&catalog.tags_popular(limit).await?)
    })
    .await
}

pub async fn tag_detail(
    State(state): State<HttpState>,
    uri: Uri,
    Path(slug): Path<String>,
    query: QueryArgs,
) -> Result<Response, ApiError> {
    let scope = query.scope();
    let page = query.page();
    let sort = query.sort();

    cached(&state, "tag_detail", &uri, move |catalog| async move {
        match catalog.tag_detail(&slug, scope, page, sort).await? {
            Some(payload) => encode(&payload),
            None => Ok(not_found_payload()),
        }
    })
    .await
}

pub async fn items_list(
    State(state): State<HttpState>,
    uri: Uri,
    query: QueryArgs,
) -> Result<Response, ApiError> {
    let scope = query.scope();
    let page = query.page();
    let sort = query.sort();
    let tag = query.get("tag").map(str::to_string);
    let search = query.get("q").map(str::to_string);

    cached(&state, "items", &uri, move |catalog| async move {
        let request = ItemsRequest {
            scope,
            tag: tag.as_deref().map(str::trim),
            search: search.as_deref(),
            page,
            sort,
        };
        encode(&catalog.items_list(request).await?)
    })
    .await
}

pub async fn search(
    State(state): State<HttpState>,
    uri: Uri,
    query: QueryArgs,
) -> Result<Response, ApiError> {
    let raw = query.get("q").unwrap_or_default().to_string();

    cached(&state, "search", &uri, move |catalog| async move {
        encode(&catalog.global_search(&raw).await?)
    })
    .await
}

pub async fn bootstrap(State(state): State<HttpState>, uri: Uri) -> Result<Response, ApiError> {
    cached(&state, "bootstrap", &uri, |catalog| async move {
        encode(&catalog.bootstrap().await?)
    })
    .await
}

pub async fn content_list<D: KindedDraft>(
    State(state): State<HttpState>,
    uri: Uri,
) -> Result<Response, ApiError> {
    cached(&state, D::KIND.as_str(), &uri, |catalog| async move {
        encode(&catalog.resource_list(D::KIND).await?)
    })
    .await
}

pub async fn content_detail<D: KindedDraft>(
    State(state): State<HttpState>,
    uri: Uri,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    cached(&state, D::KIND.as_str(), &uri, move |catalog| async move {
        match catalog.resource_detail(D::KIND, id).await? {
            Some(record) => encode(&record),
            None => Ok(not_found_payload()),
        }
    })
    .await
}

pub async fn tag_records(State(state): State<HttpState>, uri: Uri) -> Result<Response, ApiError> {
    cached(&state, "tags_admin", &uri, |catalog| async move {
        encode(&catalog.tag_records().await?)
    })
    .await
}

pub async fn tag_record(
    State(state): State<HttpState>,
    uri: Uri,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    cached(&state, "tags_admin", &uri, move |catalog| async move {
        match catalog.tag_record(id).await? {
            Some(tag) => encode(&tag),
            None => Ok(not_found_payload()),
        }
    })
    .await
}

pub async fn speakers(State(state): State<HttpState>, uri: Uri) -> Result<Response, ApiError> {
    cached(&state, "speakers", &uri, |catalog| async move {
        encode(&catalog.speakers().await?)
    })
    .await
}

pub async fn speaker(
    State(state): State<HttpState>,
    uri: Uri,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    cached(&state, "speakers", &uri, move |catalog| async move {
        match catalog.speaker(id).await? {
            Some(speaker) => encode(&speaker),
            None => Ok(not_found_payload()),
        }
    })
    .await
}

pub async fn health(State(state): State<HttpState>) -> Response {
    match state.health.ping().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

pub async fn ping() -> &'static str {
    "pong"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(uri: &str) -> QueryArgs {
        QueryArgs::from_uri(&uri.parse::<Uri>().expect("uri"))
    }

    #[test]
    fn repeated_keys_keep_the_last_value() {
        let query = args("/api/items/?page=1&page=2&q=ab&q=cd");
        assert_eq!(query.get("page"), Some("2"));
        assert_eq!(query.get("q"), Some("cd"));
        assert_eq!(query.page().page, 2);
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let query = args("/api/items/?per_page=5&per_page=x&type=gadgets&sort=");
        assert_eq!(query.page(), PageParams::default());
        assert_eq!(query.scope(), ItemScope::All);
        assert_eq!(query.sort(), SortMode::Recent);
        assert_eq!(args("/api/items/").get("page"), None);
    }
}
