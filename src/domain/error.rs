use thiserror::Error;

/// A draft that cannot be persisted as written.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed for `{field}`: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
}

impl DomainError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}
