//! Storage-specific error type wrapping sqlx errors.

use kisslight_domain::error::HubError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StorageError> for HubError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn should_box_into_storage_variant_keeping_source() {
        let err = HubError::from(StorageError::from(sqlx::Error::RowNotFound));
        assert!(matches!(err, HubError::Storage(_)));
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "database error");
    }
}
