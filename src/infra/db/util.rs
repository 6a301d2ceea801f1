use sqlx::error::ErrorKind;

use crate::application::repos::RepoError;

const QUERY_CANCELED: &str = "57014";

/// Translate driver errors into the repository vocabulary.
///
/// Unique violations keep their constraint name so the admin layer can tell
/// a name clash from a slug clash.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => {
            let message = db.message().to_string();
            match db.kind() {
                ErrorKind::UniqueViolation => RepoError::Duplicate {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                },
                ErrorKind::ForeignKeyViolation => RepoError::InvalidInput { message },
                ErrorKind::NotNullViolation | ErrorKind::CheckViolation => {
                    RepoError::Integrity { message }
                }
                _ if db.code().as_deref() == Some(QUERY_CANCELED) => RepoError::Timeout,
                _ => RepoError::Persistence(message),
            }
        }
        other => RepoError::from_persistence(other),
    }
}

/// `ILIKE` pattern matching `needle` anywhere, with wildcards in `needle` escaped.
pub(super) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
