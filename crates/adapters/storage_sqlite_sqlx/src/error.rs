//! Storage-specific error type wrapping sqlx errors.

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to serialize or deserialize a stored JSON value.
    #[error("JSON serialization error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StorageError> for rfremote_domain::error::StorageError {
    fn from(err: StorageError) -> Self {
        Self::new(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::error::Error as _;

    #[test]
    fn should_keep_source_when_converting_to_domain_error() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: rfremote_domain::error::StorageError = StorageError::from(json_err).into();
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "JSON serialization error");
    }
}
