use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A row held a status value no enum variant matches.
    #[error("Corrupt row: {0}")]
    Decode(#[from] domain::UnknownStatus),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
