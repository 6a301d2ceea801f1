//! Write endpoints. Only reachable with a valid admin token; see
//! [`super::middleware::require_admin`].

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::application::admin::tags::{TagInput, TagPatch};
use crate::domain::drafts::{KindedDraft, SpeakerDraft};

use super::HttpState;
use super::error::ApiError;

fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|err| ApiError::bad_request("Invalid request body", Some(err.to_string())))
}

pub async fn create_content<D: KindedDraft>(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let draft: D = decode(&body)?;
    let record = state.content.create(draft.into()).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn replace_content<D: KindedDraft>(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let draft: D = decode(&body)?;
    let record = state.content.replace(D::KIND, id, draft.into()).await?;
    Ok(Json(record))
}

pub async fn patch_content<D: KindedDraft>(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let patch: Value = decode(&body)?;
    let record = state.content.patch(D::KIND, id, patch).await?;
    Ok(Json(record))
}

pub async fn delete_content<D: KindedDraft>(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.content.delete(D::KIND, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_tag(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let input: TagInput = decode(&body)?;
    let tag = state.tags.create_tag(input).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

pub async fn replace_tag(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let input: TagInput = decode(&body)?;
    let tag = state.tags.replace_tag(id, input).await?;
    Ok(Json(tag))
}

pub async fn patch_tag(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let patch: TagPatch = decode(&body)?;
    let tag = state.tags.patch_tag(id, patch).await?;
    Ok(Json(tag))
}

pub async fn delete_tag(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.tags.delete_tag(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_speaker(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let draft: SpeakerDraft = decode(&body)?;
    let speaker = state.speakers.create(draft).await?;
    Ok((StatusCode::CREATED, Json(speaker)))
}

pub async fn replace_speaker(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let draft: SpeakerDraft = decode(&body)?;
    let speaker = state.speakers.replace(id, draft).await?;
    Ok(Json(speaker))
}

pub async fn patch_speaker(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let patch: Value = decode(&body)?;
    let speaker = state.speakers.patch(id, patch).await?;
    Ok(Json(speaker))
}

pub async fn delete_speaker(
    State(state): State<HttpState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.speakers.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
