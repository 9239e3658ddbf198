use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::error::Error;
use std::sync::Arc;

/// Error type returned by [`Database`] implementations.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// A value bound to a statement placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(text) => Some(text),
            SqlValue::Timestamp(_) => None,
        }
    }
}

/// Connection (or pool) the store executes its statements through.
///
/// The store only ever issues `CREATE TABLE` DDL and single-row
/// `INSERT` statements. Implementations decide how concurrent calls are
/// handled; a pooled handle is expected to cope with them internally.
#[async_trait]
pub trait Database: Send + Sync {
    /// Name of the driver behind this handle, if it can tell.
    ///
    /// Used by the store to pick a SQL dialect when no driver kind is
    /// configured explicitly. See [`DriverKind::from_name`] for the
    /// recognized spellings.
    ///
    /// [`DriverKind::from_name`]: crate::driver::DriverKind::from_name
    fn driver_name(&self) -> Option<&str> {
        None
    }

    /// Execute `sql` with `params` bound to its placeholders in order.
    ///
    /// **Returns**
    /// - `Ok(n)` with the number of rows affected.
    /// - `Err(..)` for any driver failure (connectivity, constraint
    ///   violation, syntax). The store reports it to its caller as is.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, BoxError>;
}

#[async_trait]
impl<T: Database + ?Sized> Database for Arc<T> {
    fn driver_name(&self) -> Option<&str> {
        (**self).driver_name()
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, BoxError> {
        (**self).execute(sql, params).await
    }
}
