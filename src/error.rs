use crate::database::BoxError;
use crate::dialect::DialectError;

/// Invalid [`StoreOptions`](crate::store::StoreOptions).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("table name is required")]
    MissingTableName,

    #[error("invalid table name '{0}': only letters, digits and underscores are allowed")]
    InvalidTableName(String),

    #[error("database handle is required")]
    MissingDatabase,

    #[error("driver kind was not given and the database handle does not report one")]
    UndeterminedDriver,
}

/// Error returned by [`Store`](crate::store::Store) operations.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("log store: {0}")]
    Config(#[from] ConfigError),

    /// Statement generation or execution failed.
    #[error("log store: database error: {0}")]
    Database(#[source] BoxError),
}

impl From<DialectError> for StoreError {
    fn from(err: DialectError) -> Self {
        StoreError::Database(Box::new(err))
    }
}

impl StoreError {
    pub fn is_config(&self) -> bool {
        matches!(self, StoreError::Config(_))
    }
}
