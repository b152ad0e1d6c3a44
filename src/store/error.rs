use sqlx::error::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid ticker: {0:?}")]
    InvalidTicker(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Busy/locked database, pool exhaustion and I/O hiccups are worth another try.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(e) => match e {
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
                // SQLITE_BUSY, SQLITE_LOCKED and their extended codes
                sqlx::Error::Database(db) => {
                    matches!(db.code().as_deref(), Some("5" | "6" | "261" | "262" | "517"))
                }
                _ => false,
            },
            _ => false,
        }
    }

    pub fn is_constraint_violation(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(db)) => matches!(
                db.kind(),
                ErrorKind::UniqueViolation
                    | ErrorKind::CheckViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::ForeignKeyViolation
            ),
            _ => false,
        }
    }
}
