//! Application services for the administrative surface.
//!
//! Every successful write ends with a call to the cache trigger, so cached
//! reads never outlive the data they were built from.

use std::sync::Arc;

use thiserror::Error;

use crate::application::repos::RepoError;
use crate::cache::{CacheError, CacheTrigger, ChangeKind};
use crate::domain::error::DomainError;

pub mod content;
pub mod speakers;
pub mod tags;

pub use content::AdminContentService;
pub use speakers::AdminSpeakerService;
pub use tags::AdminTagService;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("validation failed for `{field}`: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("a record with this `{field}` already exists")]
    Duplicate { field: &'static str },
    #[error("`{field}` references unknown id {id}")]
    UnknownReference { field: &'static str, id: i64 },
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl AdminError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<DomainError> for AdminError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { field, message } => Self::Validation { field, message },
        }
    }
}

/// Map a repository miss onto the entity the caller was writing.
pub(crate) fn not_found_as(entity: &'static str) -> impl Fn(RepoError) -> AdminError {
    move |err| match err {
        RepoError::NotFound => AdminError::NotFound { entity },
        other => AdminError::Repo(other),
    }
}

pub(crate) async fn notify(
    trigger: &Option<Arc<CacheTrigger>>,
    change: ChangeKind,
) -> Result<(), AdminError> {
    if let Some(trigger) = trigger {
        trigger.content_changed(change).await?;
    }
    Ok(())
}
